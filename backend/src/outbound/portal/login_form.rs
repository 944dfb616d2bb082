//! Reading the portal's login form.
//!
//! The registration page carries one form with a password input. Its hidden
//! inputs (the anti-forgery token among them) are posted back unchanged
//! alongside the username and password.

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

const DEFAULT_USERNAME_FIELD: &str = "UserName";
const DEFAULT_PASSWORD_FIELD: &str = "Password";

fn selector(cell: &'static OnceLock<Selector>, css: &'static str) -> &'static Selector {
    cell.get_or_init(|| {
        Selector::parse(css)
            .unwrap_or_else(|error| panic!("selector `{css}` failed to compile: {error}"))
    })
}

fn form() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, "form")
}

fn input() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, "input[name]")
}

fn password_input() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, r#"input[type="password"]"#)
}

fn validation_summary() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, ".validation-summary-errors, .field-validation-error")
}

/// What to post to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoginForm {
    /// Absolute URL the form posts to.
    pub action: Url,
    /// Hidden inputs to echo back, in document order.
    pub hidden: Vec<(String, String)>,
    /// Name of the username input.
    pub username_field: String,
    /// Name of the password input.
    pub password_field: String,
}

impl LoginForm {
    /// Locate the login form in `body`, served from `page_url`.
    ///
    /// Returns `None` when the page has no form with a password input.
    pub(crate) fn parse(body: &str, page_url: &Url) -> Option<Self> {
        let document = Html::parse_document(body);
        let login = document
            .select(form())
            .find(|candidate| candidate.select(password_input()).next().is_some())?;

        let action = login
            .value()
            .attr("action")
            .map(str::trim)
            .filter(|action| !action.is_empty())
            .and_then(|action| page_url.join(action).ok())
            .unwrap_or_else(|| page_url.clone());

        let mut hidden = Vec::new();
        let mut username_field = None;
        let mut password_field = None;
        for field in login.select(input()) {
            let Some(name) = field.value().attr("name") else {
                continue;
            };
            match input_type(field).as_str() {
                "hidden" => hidden.push((
                    name.to_owned(),
                    field.value().attr("value").unwrap_or_default().to_owned(),
                )),
                "password" => {
                    password_field.get_or_insert_with(|| name.to_owned());
                }
                "text" | "email" => {
                    username_field.get_or_insert_with(|| name.to_owned());
                }
                _ => {}
            }
        }

        Some(Self {
            action,
            hidden,
            username_field: username_field.unwrap_or_else(|| DEFAULT_USERNAME_FIELD.to_owned()),
            password_field: password_field.unwrap_or_else(|| DEFAULT_PASSWORD_FIELD.to_owned()),
        })
    }

    /// URL-encoded request body carrying the credentials.
    pub(crate) fn encode(&self, username: &str, password: &str) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.hidden {
            serializer.append_pair(name, value);
        }
        serializer.append_pair(&self.username_field, username);
        serializer.append_pair(&self.password_field, password);
        serializer.finish()
    }
}

fn input_type(field: ElementRef<'_>) -> String {
    field
        .value()
        .attr("type")
        .unwrap_or("text")
        .trim()
        .to_ascii_lowercase()
}

/// Whether `body` still asks for a password.
pub(crate) fn asks_for_password(body: &str) -> bool {
    Html::parse_document(body)
        .select(password_input())
        .next()
        .is_some()
}

/// Validation text the portal rendered next to the login form, if any.
pub(crate) fn rejection_message(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let text = document
        .select(validation_summary())
        .flat_map(|element| element.text())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}
