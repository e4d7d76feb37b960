pub mod endpoint;
pub mod registry;
pub mod secrets;
pub mod store;

pub use endpoint::{Endpoint, EndpointId, NewEndpoint, Status};
pub use registry::{EndpointRegistry, RegistryError};
pub use secrets::KeyringSecrets;
pub use store::{EndpointStore, JsonEndpointStore};
