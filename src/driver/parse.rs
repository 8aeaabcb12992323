use anyhow::{Context, Result};

/// Parse one trial's output: whitespace-separated floats, newlines included.
/// An empty or whitespace-only input parses to an empty row; the caller
/// decides whether that is acceptable.
pub fn parse_samples(text: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, token)| {
            token
                .parse::<f64>()
                .with_context(|| format!("sample {index}: invalid number {token:?}"))
        })
        .collect()
}
