use crate::error::SummaryError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    /// Arithmetic mean in milliseconds.
    pub mean_ms: f64,
}

/// Reduces successful round-trip times to a count and a mean.
///
/// An empty sequence has no mean and is rejected rather than reported as zero.
pub fn summarize(durations: &[Duration]) -> Result<Summary, SummaryError> {
    let millis = durations
        .iter()
        .map(|d| d.as_secs_f64() * 1_000.0)
        .collect::<Vec<_>>();
    summarize_millis(&millis)
}

pub fn summarize_millis(millis: &[f64]) -> Result<Summary, SummaryError> {
    if millis.is_empty() {
        return Err(SummaryError::Empty);
    }
    let count = millis.len();
    let sum: f64 = millis.iter().sum();
    Ok(Summary {
        count,
        mean_ms: sum / count as f64,
    })
}
