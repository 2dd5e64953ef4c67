use std::fmt;

use crate::domain::NewTransaction;

pub const TRANSACTION_ID_MAX_LEN: usize = 255;
pub const ACCOUNT_MAX_LEN: usize = 255;
pub const CURRENCY_MAX_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_no_control_chars(field: &'static str, value: &str) -> ValidationResult {
    if value.chars().any(char::is_control) {
        return Err(ValidationError::new(
            field,
            "must not contain control characters",
        ));
    }

    Ok(())
}

/// The identifier is the primary key, so it gets the strictest checks.
pub fn validate_transaction_id(transaction_id: &str) -> ValidationResult {
    validate_required("transaction_id", transaction_id)?;
    validate_max_len("transaction_id", transaction_id, TRANSACTION_ID_MAX_LEN)?;
    validate_no_control_chars("transaction_id", transaction_id)?;

    Ok(())
}

/// Structural checks on an incoming notification.
///
/// Accounts, amount and currency are opaque to this service: only their
/// presence and size are checked, never their business meaning.
pub fn validate_notification(notification: &NewTransaction) -> ValidationResult {
    validate_transaction_id(&notification.transaction_id)?;
    validate_max_len("source_account", &notification.source_account, ACCOUNT_MAX_LEN)?;
    validate_max_len(
        "destination_account",
        &notification.destination_account,
        ACCOUNT_MAX_LEN,
    )?;
    validate_max_len("currency", &notification.currency, CURRENCY_MAX_LEN)?;

    Ok(())
}
