//! Proof pipeline services

pub mod orchestrator;
pub mod ownership;
pub mod scoring;
pub mod uniqueness;

pub use orchestrator::{Collaborators, ProofOrchestrator};
pub use ownership::OwnershipEvaluator;
pub use scoring::{Assessment, Signals};
pub use uniqueness::{DuplicateReason, UniquenessEngine, UniquenessVerdict};
