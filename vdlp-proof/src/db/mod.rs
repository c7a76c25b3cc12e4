//! Corpus and identity stores
//!
//! Schema creation lives in `vdlp_common::db`; these modules hold the
//! queries the proof pipeline runs against it.

pub mod fingerprints;
pub mod identities;
