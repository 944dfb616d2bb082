//! Final human-readable outcomes for orchestrator operations.
//!
//! The orchestrator returns typed results. Boundaries that talk to users
//! turn those into text with [`OutcomeMessages`] and deliver it through an
//! [`OutcomeNotifier`] via [`OutcomeReporter`].

use std::sync::Arc;

use tracing::{error, warn};

use crate::domain::ports::OutcomeNotifier;
use crate::domain::{Error, ErrorKind, ProgressTable, UserId};

/// Operation an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// First login and grade fetch.
    Authorize,
    /// Removal of stored credentials and grades.
    Logout,
    /// Re-fetch of the grades of an authorized user.
    Refresh,
}

/// User-facing texts, one per outcome.
///
/// Every field can be overridden; [`Default`] provides English texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeMessages {
    /// Authorize succeeded.
    pub authorized: String,
    /// Logout succeeded.
    pub logged_out: String,
    /// Refresh succeeded.
    pub refreshed: String,
    /// The operation succeeded but the portal still showed no grades.
    pub not_provided: String,
    /// The portal rejected the credentials.
    pub auth_failed: String,
    /// Authorize for a user that is already authorized.
    pub already_authorized: String,
    /// Refresh or read for a user that never authorized.
    pub not_authorized: String,
    /// The portal served a different page than expected.
    pub wrong_grades_page: String,
    /// The grades page layout is no longer understood.
    pub format_mismatch: String,
    /// Stored credentials are unusable and the user must log in again.
    pub decryption: String,
    /// Infrastructure failure; trying again later may help.
    pub unavailable: String,
}

impl Default for OutcomeMessages {
    fn default() -> Self {
        Self {
            authorized: "You are logged in. Your grades have been loaded.".to_owned(),
            logged_out: "You are logged out. Your stored data has been removed.".to_owned(),
            refreshed: "Your grades have been updated.".to_owned(),
            not_provided: "The portal has not published your grades yet.".to_owned(),
            auth_failed: "The portal rejected your username or password.".to_owned(),
            already_authorized: "You are already logged in.".to_owned(),
            not_authorized: "You are not logged in yet.".to_owned(),
            wrong_grades_page: "The portal did not return your grades. Please try again."
                .to_owned(),
            format_mismatch: "The portal's grades page has changed and cannot be read right now."
                .to_owned(),
            decryption: "Your saved login can no longer be used. Please log out and log in again."
                .to_owned(),
            unavailable: "The service is temporarily unavailable. Please try again later."
                .to_owned(),
        }
    }
}

impl OutcomeMessages {
    /// Text for a successful `operation`.
    pub fn success(&self, operation: Operation) -> &str {
        match operation {
            Operation::Authorize => &self.authorized,
            Operation::Logout => &self.logged_out,
            Operation::Refresh => &self.refreshed,
        }
    }

    /// Text for a failure of kind `kind`.
    pub fn failure(&self, kind: ErrorKind) -> &str {
        match kind {
            ErrorKind::AuthFailed => &self.auth_failed,
            ErrorKind::AlreadyAuthorized => &self.already_authorized,
            ErrorKind::NotAuthorized => &self.not_authorized,
            ErrorKind::WrongGradesPage => &self.wrong_grades_page,
            ErrorKind::EmptyField | ErrorKind::NonUtf8 | ErrorKind::MisalignedDisciplines => {
                &self.format_mismatch
            }
            ErrorKind::Decryption => &self.decryption,
            ErrorKind::Store | ErrorKind::Transport => &self.unavailable,
        }
    }

    /// Text for the result of `operation`.
    ///
    /// # Examples
    /// ```
    /// use tracking_bars::domain::{Error, OutcomeMessages, Operation, UserId};
    ///
    /// let messages = OutcomeMessages::default();
    /// let result: Result<(), Error> = Err(Error::AlreadyAuthorized { user_id: UserId::new(1) });
    /// assert_eq!(messages.describe(Operation::Authorize, &result), "You are already logged in.");
    /// ```
    pub fn describe<T>(&self, operation: Operation, result: &Result<T, Error>) -> &str {
        match result {
            Ok(_) => self.success(operation),
            Err(err) => self.failure(err.kind()),
        }
    }
}

/// Delivers outcome texts to users.
#[derive(Clone)]
pub struct OutcomeReporter {
    notifier: Arc<dyn OutcomeNotifier>,
    messages: Arc<OutcomeMessages>,
}

impl OutcomeReporter {
    /// Pair `notifier` with the texts to send.
    pub fn new(notifier: Arc<dyn OutcomeNotifier>, messages: OutcomeMessages) -> Self {
        Self {
            notifier,
            messages: Arc::new(messages),
        }
    }

    /// Tell `user_id` how `operation` ended.
    ///
    /// A successful Authorize or Refresh appends the rendered table. A table
    /// that is still empty gets the `not_provided` text instead.
    /// Delivery failures are logged and swallowed; the operation's own
    /// result is what callers act on.
    pub async fn report(
        &self,
        user_id: UserId,
        operation: Operation,
        result: &Result<Option<ProgressTable>, Error>,
    ) {
        if let Some(err) = result
            .as_ref()
            .err()
            .filter(|err| err.kind().is_format_mismatch())
        {
            error!(
                user_id = %user_id,
                operation = ?operation,
                error = %err,
                "grades page format changed; operator attention needed"
            );
        }

        let text = match result {
            Ok(Some(table)) if table.is_fetched() => {
                format!("{}\n\n{table}", self.messages.success(operation))
            }
            Ok(Some(_)) => self.messages.not_provided.clone(),
            _ => self.messages.describe(operation, result).to_owned(),
        };

        if let Err(err) = self.notifier.notify(user_id, &text).await {
            warn!(
                user_id = %user_id,
                operation = ?operation,
                error = %err,
                "outcome delivery failed"
            );
        }
    }
}
