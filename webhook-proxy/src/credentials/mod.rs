//! Per-request stream credentials.
//!
//! A listener must present the secret issued for its request id before it
//! may open a stream. Credentials expire after a fixed lifetime and are
//! revoked once their payload has been delivered.

mod secret;
mod store;

pub use secret::generate_secret;
pub use store::{
    AuthError, Credential, CredentialError, CredentialStore, DEFAULT_CREDENTIAL_TTL,
    SECRET_BYTES,
};
