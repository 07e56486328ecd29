use thiserror::Error;

use crate::config::ConfigError;
use crate::reconcile::FetchError;
use crate::tracker::TrackerError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

/// Failure as presented to a chat user. Carries the request id so a reply can
/// be matched with the server logs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => {
                "Pitch-Slot ID not found. Try listing all available bookings again"
            }
            Self::ServiceUnavailable { .. } => {
                "The booking site could not be reached. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Tracker(error) => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ApplicationError::Fetch(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Configuration(error) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
        }
    }
}
