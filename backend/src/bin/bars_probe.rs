//! Log in to the portal once, extract the grades page and print it as JSON.
//!
//! Nothing is persisted. Operators run this to check whether the portal's
//! login flow or grades page layout has changed.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::num::NonZeroUsize;

use clap::Parser;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;
use zeroize::Zeroizing;

use tracking_bars::domain::{BarsCredentials, SessionPool, UserId, extract_progress_table};
use tracking_bars::outbound::PortalHttpSessionFactory;
use tracking_bars::settings::PortalSettings;

/// `bars-probe` command arguments.
#[derive(Clone, Parser)]
#[command(
    name = "bars-probe",
    about = "Fetch and extract one user's grades page without storing anything",
    version
)]
struct CliArgs {
    /// Portal login name.
    #[arg(long, value_name = "name")]
    username: String,
    /// Portal password. Prefer the environment variable over the flag.
    #[arg(long, env = "BARS_PROBE_PASSWORD", hide_env_values = true)]
    password: String,
}

fn main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %error, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let password = Zeroizing::new(args.password);
    let credentials = BarsCredentials::try_new(UserId::new(0), &args.username, &password)
        .map_err(io::Error::other)?;

    let config = PortalSettings::load_from_iter([OsString::from("bars-probe")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?
        .validate()
        .map_err(|error| io::Error::other(format!("invalid settings: {error}")))?;
    info!(
        key_fingerprint = %config.encryption_key.fingerprint(),
        login_url = %config.registration_page_url,
        grades_url = %config.grades_page_url,
        "probe configured"
    );

    let factory = PortalHttpSessionFactory::new(
        config.registration_page_url.clone(),
        config.request_timeout,
    )
    .map_err(|error| io::Error::other(format!("create HTTP client: {error}")))?;
    let sessions = SessionPool::from_factory(&factory, NonZeroUsize::MIN)
        .map_err(|error| io::Error::other(format!("create portal session: {error}")))?;
    let page = fetch_grades_page(&sessions, &credentials, &config.grades_page_url).await?;

    let table = extract_progress_table(credentials.user_id(), &page)
        .map_err(|error| io::Error::other(format!("extraction failed: {error}")))?;
    info!(disciplines = table.disciplines().len(), "grades page extracted");

    let rendered = serde_json::to_string_pretty(&table).map_err(io::Error::other)?;
    writeln!(io::stdout().lock(), "{rendered}")
}

/// Log in and fetch the grades page through a pooled session.
///
/// The session is reset when its guard drops, whichever step fails.
async fn fetch_grades_page(
    sessions: &SessionPool,
    credentials: &BarsCredentials,
    grades_url: &Url,
) -> io::Result<Vec<u8>> {
    let mut session = sessions
        .checkout()
        .await
        .map_err(|error| io::Error::other(format!("checkout failed: {error}")))?;
    session
        .login(credentials.username(), credentials.password())
        .await
        .map_err(|error| io::Error::other(format!("login failed: {error}")))?;
    session
        .fetch(grades_url)
        .await
        .map_err(|error| io::Error::other(format!("fetch failed: {error}")))
}
