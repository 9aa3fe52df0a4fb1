use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{resource} with id {id} not found")]
    NotFound { resource: String, id: String },

    #[error("Persistence failure during {operation} (HTTP {status}): {message}")]
    Persistence {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(
        "Insufficient balance on financial instrument {instrument}: available {available}, requested {requested}"
    )]
    InsufficientBalance {
        instrument: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Consignment is missing required section '{section}'")]
    IncompleteAggregate { section: String },

    #[error("{resource} {id} was modified concurrently")]
    Conflict { resource: String, id: String },

    #[error("Session expired, authentication required")]
    SessionExpired,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration: {field}")]
    MissingConfig { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidation { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Persistence,
    Ledger,
    Aggregate,
    Authentication,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DeskError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            // 網路層失敗一律視為持久化錯誤
            Self::Persistence { .. } | Self::Http(_) | Self::Conflict { .. } => {
                ErrorCategory::Persistence
            }
            Self::InsufficientBalance { .. } => ErrorCategory::Ledger,
            Self::IncompleteAggregate { .. } => ErrorCategory::Aggregate,
            Self::SessionExpired => ErrorCategory::Authentication,
            Self::Config { .. }
            | Self::InvalidConfigValue { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigValidation { .. } => ErrorCategory::Configuration,
            Self::Serialization(_) | Self::Io(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::Aggregate => ErrorSeverity::Low,
            ErrorCategory::Persistence | ErrorCategory::Authentication => ErrorSeverity::Medium,
            ErrorCategory::NotFound | ErrorCategory::Ledger | ErrorCategory::Configuration => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::Validation { field, .. } => format!("Correct '{}' and submit again", field),
            Self::NotFound { resource, .. } => {
                format!("Check that the {} still exists on the backend", resource)
            }
            Self::Persistence { .. } | Self::Http(_) => {
                "Check backend availability and resubmit; nothing was applied".to_string()
            }
            Self::InsufficientBalance { instrument, .. } => format!(
                "Lower the requested amount or choose another instrument than {}",
                instrument
            ),
            Self::IncompleteAggregate { section } => {
                format!("Complete the '{}' step before generating the invoice", section)
            }
            Self::Conflict { .. } => "Reload the consignment and reapply the change".to_string(),
            Self::SessionExpired => "Log in again and pass the new token".to_string(),
            Self::Config { .. }
            | Self::InvalidConfigValue { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigValidation { .. } => {
                "Review the configuration file and command line options".to_string()
            }
            Self::Serialization(_) => "The backend returned an unexpected payload".to_string(),
            Self::Io(_) => "Check file permissions and paths".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Validation { field, message } => format!("Invalid {}: {}", field, message),
            Self::NotFound { resource, id } => format!("{} #{} does not exist", resource, id),
            Self::Persistence { operation, status, .. } => {
                format!("Saving failed ({} returned HTTP {})", operation, status)
            }
            Self::Http(_) => "Could not reach the backend".to_string(),
            Self::InsufficientBalance {
                instrument,
                available,
                requested,
            } => format!(
                "Financial instrument {} has only {} left, {} requested",
                instrument, available, requested
            ),
            Self::IncompleteAggregate { section } => {
                format!("The consignment has no {} yet", section)
            }
            Self::SessionExpired => "Your session has expired".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_balance_names_instrument() {
        let err = DeskError::InsufficientBalance {
            instrument: "LC-7".to_string(),
            available: dec!(10),
            requested: dec!(25),
        };

        assert!(err.to_string().contains("LC-7"));
        assert!(err.user_friendly_message().contains("LC-7"));
        assert_eq!(err.category(), ErrorCategory::Ledger);
    }

    #[test]
    fn test_persistence_category_covers_conflict() {
        let err = DeskError::Conflict {
            resource: "consignment".to_string(),
            id: "3".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Persistence);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_incomplete_aggregate_message() {
        let err = DeskError::IncompleteAggregate {
            section: "recoveryDone".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Consignment is missing required section 'recoveryDone'"
        );
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }
}
