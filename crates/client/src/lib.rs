//! Typed client for the Stringr record service.
//!
//! [`backend`] talks to the service, [`auth`] owns the signed-in identity and
//! keeps it across restarts, [`config`] decides which deployment to use.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod overview;
pub mod store;

pub use auth::{AuthSession, AuthState, TokenValidity};
pub use backend::{AuthResponse, Backend, Collection};
pub use error::ClientError;
pub use store::{AuthStore, FileAuthStore, MemoryAuthStore, StoredAuth};
