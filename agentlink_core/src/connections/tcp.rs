use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::connector::{Connector, ConnectorFactory, LinkEvent};
use super::errors::ConnectionError;
use crate::storage::Endpoint;

/// Plain TCP link. Incoming bytes belong to the application protocol and are
/// discarded; only the peer hanging up is reported.
pub struct TcpConnector {
    host: String,
    port: u16,
    ssl: bool,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpConnector {
    pub fn new(host: String, port: u16, ssl: bool, connect_timeout: Duration) -> Self {
        Self {
            host,
            port,
            ssl,
            connect_timeout,
            stream: None,
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.ssl {
            return Err(ConnectionError::Unsupported(format!(
                "{} requires TLS; register a TLS-capable ConnectorFactory",
                self.addr()
            )));
        }
        let addr = self.addr();
        info!("Connecting to {}", addr);
        let stream = timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(addr.clone()))??;
        stream.set_nodelay(true)?;
        info!("TCP connection to {} established", addr);
        self.stream = Some(stream);
        Ok(())
    }

    async fn next_event(&mut self) -> Result<LinkEvent, ConnectionError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ConnectionError::Other("Not connected".into()))?;
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await? {
                0 => return Ok(LinkEvent::Closed),
                n => debug!("Discarding {} bytes from {}:{}", n, self.host, self.port),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }
}

/// Hands out [`TcpConnector`]s with a shared connect timeout.
#[derive(Debug, Clone)]
pub struct TcpConnectorFactory {
    connect_timeout: Duration,
}

impl TcpConnectorFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl ConnectorFactory for TcpConnectorFactory {
    fn create(&self, endpoint: &Endpoint) -> Box<dyn Connector> {
        Box::new(TcpConnector::new(
            endpoint.host.clone(),
            endpoint.port,
            endpoint.ssl,
            self.connect_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reports_closed_when_peer_hangs_up() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let mut connector =
            TcpConnector::new("127.0.0.1".into(), port, false, Duration::from_secs(1));
        connector.connect().await?;

        let (mut peer, _) = listener.accept().await?;
        peer.write_all(b"ignored").await?;
        drop(peer);

        let event = timeout(Duration::from_secs(1), connector.next_event()).await??;
        assert_eq!(event, LinkEvent::Closed);
        connector.disconnect().await.ok();
        Ok(())
    }

    #[tokio::test]
    async fn ssl_endpoints_are_rejected() {
        let mut connector =
            TcpConnector::new("127.0.0.1".into(), 1, true, Duration::from_secs(1));
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Unsupported(_)));
    }
}
