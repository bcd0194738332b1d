pub mod credential_resolver;

pub use credential_resolver::{CredentialResolver, TokenScope};
