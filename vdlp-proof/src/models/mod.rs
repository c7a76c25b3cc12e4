pub mod proof_record;
pub mod submission;

pub use proof_record::{ProofRecord, RESULTS_FILE};
pub use submission::Submission;
