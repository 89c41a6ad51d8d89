//! Field-level input checks shared by reservation and checkout requests.

use crate::error::ValidationError;

/// Trims `value` and rejects it if nothing is left.
pub fn non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn email(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let invalid = || ValidationError::new("email", format!("'{trimmed}' is not a valid address"));

    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(trimmed.to_string())
}

/// Phone numbers carry 7 to 15 digits; `+`, `-`, parentheses and spaces are allowed.
pub fn phone(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("phone", "must not be empty"));
    }

    let mut digits = 0;
    for c in trimmed.chars() {
        match c {
            '0'..='9' => digits += 1,
            '+' | '-' | '(' | ')' | ' ' => {}
            other => {
                return Err(ValidationError::new(
                    "phone",
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }

    if !(7..=15).contains(&digits) {
        return Err(ValidationError::new("phone", "must contain 7 to 15 digits"));
    }

    Ok(trimmed.to_string())
}

/// Normalizes an optional free-text field: blank becomes `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
