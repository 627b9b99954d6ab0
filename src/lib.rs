// Agent admin client - library root

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod routes;
pub mod storage;
pub mod url_input;

pub use auth::{AppDescriptor, CredentialSet, CredentialStore};
pub use error::{ClientError, Result};
pub use http_client::{ApiClient, FilePart, Payload};
pub use routes::{AuthClass, Route};
