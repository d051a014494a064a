//! Payload validation and output normalization.

use serde_json::{Value, json};
use thiserror::Error;

/// A request or response body that is not well-formed JSON.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload cannot be empty")]
    Empty,

    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Check that `input` is a non-empty JSON document.
pub fn validate_input(input: &[u8]) -> Result<(), PayloadError> {
    if input.is_empty() {
        return Err(PayloadError::Empty);
    }
    serde_json::from_slice::<Value>(input)?;
    Ok(())
}

/// Normalize raw tool output into structured JSON.
///
/// Output that already parses as JSON is returned byte for byte. Anything
/// else is trimmed and wrapped as a single text content item.
pub fn validate_and_format_output(output: Vec<u8>) -> serde_json::Result<Vec<u8>> {
    if validate_input(&output).is_ok() {
        return Ok(output);
    }

    let text = String::from_utf8_lossy(&output);
    serde_json::to_vec(&json!({
        "content": [
            {
                "type": "text",
                "text": text.trim(),
            }
        ]
    }))
}
