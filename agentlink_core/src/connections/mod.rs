pub mod connector;
pub mod errors;
pub mod tcp;

pub use connector::{Connector, ConnectorFactory, LinkEvent};
pub use errors::ConnectionError;
pub use tcp::{TcpConnector, TcpConnectorFactory};
