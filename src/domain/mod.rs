use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    MissingStack { stack_id: Uuid },
    InvalidPageLimit { limit: usize, max: usize },
    NonFiniteValue,
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingStack { .. } => "not_found",
            Self::InvalidPageLimit { .. } | Self::NonFiniteValue => "validation_error",
        }
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingStack { stack_id } => write!(f, "stack not found: {stack_id}"),
            Self::InvalidPageLimit { limit, max } => {
                write!(f, "invalid limit: {limit} (must be at most {max})")
            }
            Self::NonFiniteValue => write!(f, "stack values must be finite numbers"),
        }
    }
}

impl std::error::Error for DomainError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stack {
    pub id: Uuid,
    pub content: Vec<f64>,
    pub created_at: DateTime<Utc>,
}

pub fn validate_page_limit(limit: usize, max: usize) -> Result<(), DomainError> {
    if limit > max {
        return Err(DomainError::InvalidPageLimit { limit, max });
    }
    Ok(())
}

pub fn validate_content(content: &[f64]) -> Result<(), DomainError> {
    if content.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(DomainError::NonFiniteValue)
    }
}
