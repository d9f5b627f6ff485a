use thiserror::Error;

/// Reasons a learner-supplied number is refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// Field was blank.
    #[error("no value entered")]
    Empty,
    /// Text is not a number.
    #[error("not a number: {0:?}")]
    NotANumber(String),
    /// NaN or infinite.
    #[error("value must be finite, got {0}")]
    NotFinite(f64),
}

/// Accepts only finite values.
pub fn require_finite(value: f64) -> Result<f64, InputError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InputError::NotFinite(value))
    }
}

/// Parses a coordinate typed into a free-text field.
pub fn parse_coordinate(text: &str) -> Result<f64, InputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| InputError::NotANumber(trimmed.to_string()))?;
    require_finite(value)
}
