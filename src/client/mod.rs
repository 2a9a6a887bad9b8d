// File: ./src/client/mod.rs
pub mod auth;
pub mod cert;
pub mod core;

pub use crate::client::auth::TokenHandle;
pub use crate::client::core::ApiClient;
