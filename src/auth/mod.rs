// Authentication module
// Config bootstrap, session credential store and token refresh

mod bootstrap;
mod refresh;
mod store;
mod types;

pub use bootstrap::parse_app_descriptor;
pub use refresh::refresh_session;
pub use store::{CredentialStore, REFRESH_TOKEN_KEY, TOKEN_KEY, WS_TOKEN_KEY};
pub use types::{
    token_preview, with_token_prefix, AppDescriptor, CredentialSet, LoginResponse,
    RefreshResponse, TOKEN_PREFIX,
};
