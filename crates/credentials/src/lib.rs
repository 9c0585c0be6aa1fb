mod credential;
mod manager;

pub use credential::{AuthenticatedCredential, Credential, CredentialError, OperatorType};
pub use manager::CredentialManager;
