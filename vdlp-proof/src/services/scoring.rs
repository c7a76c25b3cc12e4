//! Validity and score aggregation
//!
//! Pure functions over the four signals. Uniqueness and authenticity are
//! hard gates only: they decide `valid` but carry no weight in `score`, so a
//! rejected duplicate still reports how good the recording itself was.

/// Weight of the quality signal in `score`
pub const QUALITY_WEIGHT: f64 = 0.6;
/// Weight of the ownership signal in `score`
pub const OWNERSHIP_WEIGHT: f64 = 0.4;

/// Per-submission signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub ownership: u8,
    pub uniqueness: u8,
    pub authenticity: u8,
    /// [0,1]
    pub quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub valid: bool,
    pub score: f64,
}

/// Binary authenticity signal: strictly above the threshold is real
pub fn authenticity_signal(probability_real: f64, threshold: f64) -> u8 {
    u8::from(probability_real > threshold)
}

pub fn is_valid(signals: &Signals, quality_gate: f64) -> bool {
    signals.ownership == 1
        && signals.uniqueness == 1
        && signals.authenticity == 1
        && signals.quality > quality_gate
}

pub fn score(signals: &Signals) -> f64 {
    QUALITY_WEIGHT * signals.quality + OWNERSHIP_WEIGHT * f64::from(signals.ownership)
}

pub fn assess(signals: &Signals, quality_gate: f64) -> Assessment {
    Assessment {
        valid: is_valid(signals, quality_gate),
        score: score(signals),
    }
}
