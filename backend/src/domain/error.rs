//! Domain-level error types.
//!
//! These errors are transport agnostic. Whatever boundary drives the
//! orchestrator maps them to user-facing messages through
//! [`crate::domain::OutcomeMessages`] or its own envelope.

use serde::{Deserialize, Serialize};

use super::UserId;
use super::extraction::{ExtractionError, FieldLocation};

/// Stable machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The portal rejected the user's credentials.
    AuthFailed,
    /// The portal returned a page other than the grades page.
    WrongGradesPage,
    /// A required field on the grades page was blank.
    EmptyField,
    /// The grades page was not clean UTF-8 text.
    NonUtf8,
    /// Discipline names and tables did not line up.
    MisalignedDisciplines,
    /// The user already has stored credentials.
    AlreadyAuthorized,
    /// The user has no stored credentials.
    NotAuthorized,
    /// A stored password could not be decrypted.
    Decryption,
    /// A persistence collaborator failed.
    Store,
    /// The network or the portal failed, or a deadline ran out.
    Transport,
}

impl ErrorKind {
    /// Whether the kind signals that the portal's page layout changed.
    ///
    /// These failures are not user-correctable and belong in front of an
    /// operator rather than in a retry loop.
    pub fn is_format_mismatch(self) -> bool {
        matches!(
            self,
            Self::EmptyField | Self::NonUtf8 | Self::MisalignedDisciplines
        )
    }
}

/// Failure of an orchestrator operation.
///
/// # Examples
/// ```
/// use tracking_bars::domain::{Error, ErrorKind, UserId};
///
/// let err = Error::NotAuthorized { user_id: UserId::new(7) };
/// assert_eq!(err.kind(), ErrorKind::NotAuthorized);
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The portal refused the credentials. The message is the portal's own.
    #[error("authorization failed: {message}")]
    AuthFailed {
        /// Portal-provided detail.
        message: String,
    },
    /// The portal served something other than the grades page.
    #[error("portal did not return the grades page")]
    WrongGradesPage,
    /// A required field was blank after cleaning.
    #[error("grades page has an empty {location}")]
    EmptyField {
        /// Position of the offending field.
        location: FieldLocation,
    },
    /// The grades page was not clean UTF-8 text.
    #[error("grades page is not valid UTF-8: {reason}")]
    NonUtf8 {
        /// What was wrong with the text.
        reason: String,
    },
    /// Name blocks and table bodies differ in count.
    #[error("grades page has {tables} discipline tables but {names} discipline names")]
    MisalignedDisciplines {
        /// Number of table bodies.
        tables: usize,
        /// Number of name blocks.
        names: usize,
    },
    /// The user is already authorized.
    #[error("user {user_id} is already authorized")]
    AlreadyAuthorized {
        /// User the request was made for.
        user_id: UserId,
    },
    /// The user has no stored credentials.
    #[error("user {user_id} is not authorized")]
    NotAuthorized {
        /// User the request was made for.
        user_id: UserId,
    },
    /// The stored password could not be decrypted, usually after a key
    /// rotation.
    #[error("stored credentials could not be decrypted: {message}")]
    Decryption {
        /// Cipher detail.
        message: String,
    },
    /// A store collaborator failed.
    #[error("store failure: {message}")]
    Store {
        /// Adapter detail.
        message: String,
    },
    /// Network or portal failure, including exceeded deadlines.
    #[error("transport failure: {message}")]
    Transport {
        /// Adapter detail.
        message: String,
    },
}

impl Error {
    /// Category of the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailed { .. } => ErrorKind::AuthFailed,
            Self::WrongGradesPage => ErrorKind::WrongGradesPage,
            Self::EmptyField { .. } => ErrorKind::EmptyField,
            Self::NonUtf8 { .. } => ErrorKind::NonUtf8,
            Self::MisalignedDisciplines { .. } => ErrorKind::MisalignedDisciplines,
            Self::AlreadyAuthorized { .. } => ErrorKind::AlreadyAuthorized,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::Decryption { .. } => ErrorKind::Decryption,
            Self::Store { .. } => ErrorKind::Store,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Whether an outer caller may retry the operation.
    ///
    /// The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::WrongGradesPage | ErrorKind::Store | ErrorKind::Transport
        )
    }

    /// Build a [`Error::Store`] from any displayable cause.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Build a [`Error::Transport`] from any displayable cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

impl From<ExtractionError> for Error {
    fn from(value: ExtractionError) -> Self {
        match value {
            ExtractionError::WrongGradesPage => Self::WrongGradesPage,
            ExtractionError::EmptyField { location } => Self::EmptyField { location },
            ExtractionError::NonUtf8 { reason } => Self::NonUtf8 { reason },
            ExtractionError::MisalignedDisciplines { tables, names } => {
                Self::MisalignedDisciplines { tables, names }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::WrongGradesPage, true)]
    #[case(Error::transport("reset by peer"), true)]
    #[case(Error::store("pool exhausted"), true)]
    #[case(Error::AuthFailed { message: "bad password".into() }, false)]
    #[case(Error::NonUtf8 { reason: "garbled".into() }, false)]
    #[case(Error::AlreadyAuthorized { user_id: UserId::new(1) }, false)]
    #[case(Error::Decryption { message: "tag mismatch".into() }, false)]
    fn retryability_follows_kind(#[case] error: Error, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[rstest]
    #[case(ErrorKind::EmptyField, true)]
    #[case(ErrorKind::NonUtf8, true)]
    #[case(ErrorKind::MisalignedDisciplines, true)]
    #[case(ErrorKind::WrongGradesPage, false)]
    #[case(ErrorKind::AuthFailed, false)]
    fn format_mismatch_kinds(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_format_mismatch(), expected);
    }

    #[test]
    fn extraction_errors_keep_positional_detail() {
        let location = FieldLocation::ControlEventName { table: 2, row: 5 };
        let error = Error::from(ExtractionError::EmptyField { location });
        assert_eq!(error, Error::EmptyField { location });
        assert_eq!(
            error.to_string(),
            "grades page has an empty control event name (table 2, row 5)"
        );
    }

    #[test]
    fn kind_serialises_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::AlreadyAuthorized).expect("serialises");
        assert_eq!(json, "\"already_authorized\"");
    }
}
