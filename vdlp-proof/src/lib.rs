//! vdlp-proof library interface
//!
//! Proof of contribution for a voice data pool: decides whether one audio
//! submission is acceptable (contributor in good standing, not a duplicate,
//! authentic, good enough) and scores it.
//!
//! Exposed as a library so integration tests can drive the orchestrator with
//! scripted collaborators.

pub mod collaborators;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use models::{ProofRecord, Submission};
pub use services::{Collaborators, ProofOrchestrator};
