pub mod broadcast;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod handle;
pub mod protocol;
pub mod supervisor;
