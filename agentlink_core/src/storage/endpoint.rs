use std::fmt;

use serde::{Deserialize, Serialize};

/// Registry-assigned endpoint identifier. The first endpoint gets `1`.
pub type EndpointId = u32;

/// Connection state of one endpoint, as last reported by its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Offline,
    Connecting,
    /// Connected with an open session.
    Active,
    /// Connected, no open session.
    Online,
}

impl Status {
    pub fn is_connected(self) -> bool {
        matches!(self, Status::Active | Status::Online)
    }

    pub fn has_open_session(self) -> bool {
        matches!(self, Status::Active)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Offline => "OFFLINE",
            Status::Connecting => "CONNECTING",
            Status::Active => "ACTIVE",
            Status::Online => "ONLINE",
        };
        f.write_str(s)
    }
}

/// A registered remote endpoint.
///
/// JSON on disk looks like:
/// `{ "id":1, "name":"lab", "host":"10.0.0.1", "port":31415, "ssl":true, "enabled":false }`
///
/// `status` is runtime state only and never hits the disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_truststore_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_truststore_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip)]
    pub status: Status,
}

impl Endpoint {
    /// `host:port`, used in notices and log lines.
    pub fn connection_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Everything needed to register an endpoint. The registry assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEndpoint {
    /// Leave `None` to have a unique name generated.
    pub name: Option<String>,
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub ssl_truststore_path: Option<String>,
    pub ssl_truststore_password: Option<String>,
    pub password: Option<String>,
}

impl NewEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub(crate) fn into_endpoint(self, id: EndpointId, name: String) -> Endpoint {
        Endpoint {
            id,
            name,
            host: self.host,
            port: self.port,
            ssl: self.ssl,
            ssl_truststore_path: self.ssl_truststore_path,
            ssl_truststore_password: self.ssl_truststore_password,
            password: self.password,
            enabled: false,
            status: Status::Offline,
        }
    }
}
