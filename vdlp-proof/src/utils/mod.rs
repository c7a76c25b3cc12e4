//! Utility modules for vdlp-proof

pub mod archive;
pub mod audio_decoder;
pub mod db_retry;
pub mod pool_monitor;

pub use archive::extract_archives;
pub use audio_decoder::{decode_audio_file, peak_normalize, DecodedAudio};
pub use db_retry::retry_on_lock;
pub use pool_monitor::{begin_immediate, MonitoredTransaction};
