//! # vdlp Common Library
//!
//! Shared code for the voice data-pool proof crates:
//! - Error taxonomy
//! - Layered configuration (TOML, environment, CLI)
//! - Database initialization and row models

pub mod config;
pub mod db;
pub mod error;

pub use config::ProofConfig;
pub use error::{Error, Result};
