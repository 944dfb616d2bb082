//! Grade tracking against the BARS student portal.
//!
//! The library logs in to the portal on a user's behalf, extracts the grades
//! page into a [`domain::ProgressTable`], and keeps the user's credentials
//! encrypted so later refreshes need no password.

pub mod domain;
pub mod outbound;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
