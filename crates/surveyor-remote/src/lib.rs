//! HTTP implementations of the surveyor backends
//!
//! - [`InferenceClient`]: multipart uploads to the AI service
//! - [`RestClient`]: PostgREST-style access to the hosted tables
//! - [`AuthClient`]: password sign-in against the hosted auth endpoint
//!
//! All three are built from one [`RemoteConfig`].

pub mod auth;
pub mod config;
pub mod inference;
pub mod rest;

mod error;
mod progress;

pub use auth::AuthClient;
pub use config::{RemoteConfig, RemoteConfigError, DEFAULT_API_URL};
pub use inference::InferenceClient;
pub use rest::RestClient;
