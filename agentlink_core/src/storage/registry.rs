use std::io;

use log::{debug, info};
use thiserror::Error;
use uuid::Uuid;

use super::endpoint::{Endpoint, EndpointId, NewEndpoint, Status};
use super::store::EndpointStore;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no endpoint with id {0}")]
    NotFound(EndpointId),
    #[error("an endpoint named '{0}' already exists")]
    DuplicateName(String),
    #[error("endpoint storage failed: {0}")]
    Storage(#[from] io::Error),
}

/// The set of known endpoints, in insertion order.
///
/// Mutations that touch persisted fields are written through to the store
/// before they become visible in memory.
pub struct EndpointRegistry {
    endpoints: Vec<Endpoint>,
    next_id: EndpointId,
    store: Option<Box<dyn EndpointStore>>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl EndpointRegistry {
    /// A registry that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self {
            endpoints: Vec::new(),
            next_id: 1,
            store: None,
        }
    }

    /// Loads every persisted endpoint. Status always starts out `OFFLINE`.
    pub fn open(store: Box<dyn EndpointStore>) -> Result<Self, RegistryError> {
        let mut endpoints = store.load()?;
        for endpoint in &mut endpoints {
            endpoint.status = Status::Offline;
        }
        let next_id = endpoints.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        info!("Opened endpoint registry with {} endpoint(s).", endpoints.len());
        Ok(Self {
            endpoints,
            next_id,
            store: Some(store),
        })
    }

    /// Registers an endpoint and returns its id.
    pub fn add(&mut self, new: NewEndpoint) -> Result<EndpointId, RegistryError> {
        let name = match new.name.clone() {
            Some(name) => name,
            None => format!("endpoint-{}", Uuid::new_v4()),
        };
        if self.endpoints.iter().any(|e| e.name == name) {
            return Err(RegistryError::DuplicateName(name));
        }

        let id = self.next_id;
        let endpoint = new.into_endpoint(id, name);
        if let Some(store) = &self.store {
            store.save(&endpoint)?;
        }
        debug!(
            "Registered endpoint {} '{}' ({})",
            id,
            endpoint.name,
            endpoint.connection_string()
        );
        self.endpoints.push(endpoint);
        self.next_id += 1;
        Ok(id)
    }

    pub fn all(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn get(&self, id: EndpointId) -> Result<&Endpoint, RegistryError> {
        self.endpoints
            .iter()
            .find(|e| e.id == id)
            .ok_or(RegistryError::NotFound(id))
    }

    /// Mutable access for runtime-only fields such as `status`.
    pub fn get_mut(&mut self, id: EndpointId) -> Result<&mut Endpoint, RegistryError> {
        self.endpoints
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(RegistryError::NotFound(id))
    }

    /// Flips `enabled` and persists it. Memory is left untouched if the write fails.
    pub fn set_enabled(&mut self, id: EndpointId, enabled: bool) -> Result<(), RegistryError> {
        let current = self.get(id)?;
        if current.enabled == enabled {
            return Ok(());
        }
        if let Some(store) = &self.store {
            let mut updated = current.clone();
            updated.enabled = enabled;
            store.save(&updated)?;
        }
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn remove(&mut self, id: EndpointId) -> Result<Endpoint, RegistryError> {
        let index = self
            .endpoints
            .iter()
            .position(|e| e.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        if let Some(store) = &self.store {
            store.delete(id)?;
        }
        Ok(self.endpoints.remove(index))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
