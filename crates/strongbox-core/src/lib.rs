//! # strongbox-core
//!
//! Core types, configuration, and utilities for Strongbox.
//!
//! This crate provides shared functionality used by the vault crate:
//!
//! - **Configuration**: Loading, validation, and persistence of the vault config
//! - **Types**: Accessibility levels shared by config and vault
//! - **Secrets**: Zeroizing buffers for secret material
//! - **Utilities**: Path resolution and environment handling

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;
pub mod types;

// Re-exports for convenience
pub use config::VaultConfig;
pub use error::ConfigError;
pub use secret::{SecretBytes, SecretString};
pub use types::*;
