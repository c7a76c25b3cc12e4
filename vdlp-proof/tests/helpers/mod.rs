//! Test Helper Utilities
//!
//! Shared utilities for vdlp-proof integration tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod db_utils;
pub mod fakes;

pub use audio_generator::generate_test_wav;
pub use db_utils::{count_rows, create_test_db, inject_insert_failure, set_violations};
pub use fakes::{
    fingerprint, FirstWordComparator, FixedAuthenticity, FixedQuality, ScriptedExtractor,
    SlowAuthenticity, SlowQuality,
};
