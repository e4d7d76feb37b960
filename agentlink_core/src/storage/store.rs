use std::{fs, io, path::PathBuf};

use directories::ProjectDirs;
use log::{debug, warn};
use serde_json::Error as SerdeError;

use super::endpoint::{Endpoint, EndpointId};
use super::secrets::KeyringSecrets;

/// Persistence backend behind the [`EndpointRegistry`](super::registry::EndpointRegistry).
pub trait EndpointStore: Send {
    fn load(&self) -> io::Result<Vec<Endpoint>>;
    /// Create or overwrite one record.
    fn save(&self, endpoint: &Endpoint) -> io::Result<()>;
    /// `Ok(true)` if removed, `Ok(false)` if it didn't exist.
    fn delete(&self, id: EndpointId) -> io::Result<bool>;
}

/// One pretty-printed JSON file per endpoint.
#[derive(Debug, Clone)]
pub struct JsonEndpointStore {
    dir: PathBuf,
    secrets: Option<KeyringSecrets>,
}

impl JsonEndpointStore {
    /// `~/.config/agentlink/endpoints` on Linux, `%APPDATA%\agentlink\endpoints` on Windows, etc.
    pub fn new() -> io::Result<Self> {
        let proj = ProjectDirs::from("", "", "agentlink")
            .ok_or_else(|| io::Error::other("Unable to locate config dir"))?;
        Self::at(proj.config_dir().join("endpoints"))
    }

    pub fn at(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, secrets: None })
    }

    /// Keep passwords in the OS keyring rather than in the JSON files.
    pub fn with_keyring(mut self, secrets: KeyringSecrets) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn file_for(&self, id: EndpointId) -> PathBuf {
        self.dir.join(format!("endpoint-{id}.json"))
    }
}

impl EndpointStore for JsonEndpointStore {
    /// Returns every stored endpoint ordered by id (malformed files are skipped).
    fn load(&self) -> io::Result<Vec<Endpoint>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match fs::File::open(&path)
                .and_then(|f| serde_json::from_reader::<_, Endpoint>(f).map_err(SerdeError::into))
            {
                Ok(mut endpoint) => {
                    if let Some(secrets) = &self.secrets {
                        secrets.restore(&mut endpoint)?;
                    }
                    out.push(endpoint);
                }
                Err(e) => warn!("Could not read {:?}: {e}", path),
            }
        }
        out.sort_by_key(|e| e.id);
        debug!("Loaded {} endpoint(s) from {:?}", out.len(), self.dir);
        Ok(out)
    }

    fn save(&self, endpoint: &Endpoint) -> io::Result<()> {
        let on_disk = match &self.secrets {
            Some(secrets) => secrets.strip(endpoint)?,
            None => endpoint.clone(),
        };
        let file = fs::File::create(self.file_for(endpoint.id))?;
        serde_json::to_writer_pretty(file, &on_disk).map_err(SerdeError::into)
    }

    fn delete(&self, id: EndpointId) -> io::Result<bool> {
        if let Some(secrets) = &self.secrets {
            secrets.delete(id)?;
        }
        match fs::remove_file(self.file_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
