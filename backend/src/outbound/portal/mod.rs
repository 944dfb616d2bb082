//! Portal session adapter backed by reqwest.

mod cookies;
mod http_session;
mod login_form;

pub use self::http_session::{PortalHttpSession, PortalHttpSessionFactory};
