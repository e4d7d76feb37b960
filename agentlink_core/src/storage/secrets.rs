use std::io;

use keyring::Entry;

use super::endpoint::{Endpoint, EndpointId};

/// Keeps endpoint passwords in the OS keyring instead of the JSON files.
///
/// Entries live under `service` with the user `endpoint-<id>-<field>`.
#[derive(Debug, Clone)]
pub struct KeyringSecrets {
    service: String,
}

impl Default for KeyringSecrets {
    fn default() -> Self {
        Self::new("agentlink")
    }
}

impl KeyringSecrets {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, id: EndpointId, field: &str) -> io::Result<Entry> {
        Entry::new(&self.service, &format!("endpoint-{id}-{field}")).map_err(io::Error::other)
    }

    fn put(&self, id: EndpointId, field: &str, secret: Option<&str>) -> io::Result<()> {
        match secret {
            Some(secret) => self
                .entry(id, field)?
                .set_password(secret)
                .map_err(io::Error::other),
            None => self.forget(id, field),
        }
    }

    fn get(&self, id: EndpointId, field: &str) -> io::Result<Option<String>> {
        match self.entry(id, field)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    fn forget(&self, id: EndpointId, field: &str) -> io::Result<()> {
        match self.entry(id, field)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    /// Moves both passwords into the keyring and returns the copy to write to disk.
    pub(crate) fn strip(&self, endpoint: &Endpoint) -> io::Result<Endpoint> {
        self.put(endpoint.id, "password", endpoint.password.as_deref())?;
        self.put(
            endpoint.id,
            "truststore",
            endpoint.ssl_truststore_password.as_deref(),
        )?;
        let mut on_disk = endpoint.clone();
        on_disk.password = None;
        on_disk.ssl_truststore_password = None;
        Ok(on_disk)
    }

    /// Fills passwords back in after loading from disk.
    pub(crate) fn restore(&self, endpoint: &mut Endpoint) -> io::Result<()> {
        if endpoint.password.is_none() {
            endpoint.password = self.get(endpoint.id, "password")?;
        }
        if endpoint.ssl_truststore_password.is_none() {
            endpoint.ssl_truststore_password = self.get(endpoint.id, "truststore")?;
        }
        Ok(())
    }

    pub(crate) fn delete(&self, id: EndpointId) -> io::Result<()> {
        self.forget(id, "password")?;
        self.forget(id, "truststore")
    }
}
