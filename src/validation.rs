//! Validation of the upload payload.

use serde::Serialize;
use serde_json::Value;

pub const REQUIRED_MESSAGE: &str = "The image base64 is required.";
pub const NOT_A_STRING_MESSAGE: &str = "The image base64 should be a valid string.";

/// Outcome of validating one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates the `imageBase64` field of an upload request.
///
/// Each rule is checked independently, so one value can fail both. The
/// validator never errors: every input yields a [`ValidationResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadValidator;

impl UploadValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, value: &Value) -> ValidationResult {
        let mut errors = Vec::new();

        if is_empty(value) {
            errors.push(REQUIRED_MESSAGE.to_string());
        }
        if !value.is_string() {
            errors.push(NOT_A_STRING_MESSAGE.to_string());
        }

        ValidationResult {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Null, false, zero, `""` and empty collections count as empty. Every
/// non-empty string is present, including `"0"`.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
