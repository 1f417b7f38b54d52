use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, warn};

use wpmbot::app_dirs::AppDirs;
use wpmbot::profile::ProfileStore;
use wpmbot::timing::TypingBudget;
use wpmbot::webdriver::WebDriverPage;
use wpmbot::run_session;

/// paced browser typing bot
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Drives a typing-practice site through login, cookie consent, and option selection, then types the page's prompt at a target words-per-minute until the time budget runs out. Site selectors come from a per-origin profile store."
)]
struct Cli {
    /// target page url (must have an entry in the profile store)
    url: String,

    /// target words per minute
    #[clap(short, long, default_value_t = 60.0)]
    wpm: f64,

    /// seconds to keep typing
    #[clap(short, long, default_value_t = 60.0)]
    secs: f64,

    /// browser to request from the webdriver endpoint
    #[clap(short, long, value_enum, default_value_t = SupportedBrowser::Chrome)]
    browser: SupportedBrowser,

    /// webdriver endpoint to connect to
    #[clap(long, default_value = "http://localhost:4444")]
    webdriver: String,

    /// login email, used together with --password
    #[clap(long)]
    email: Option<String>,

    /// login password, used together with --email
    #[clap(long)]
    password: Option<String>,

    /// site option to select, as OPTION=VALUE (repeatable)
    #[clap(short = 'c', long = "set", value_name = "OPTION=VALUE")]
    set: Vec<String>,

    /// profile store document to load instead of the default location
    #[clap(long)]
    profiles: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
enum SupportedBrowser {
    Chrome,
    Firefox,
}

impl SupportedBrowser {
    fn as_capability(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl Cli {
    fn credentials(&self) -> Option<BTreeMap<String, String>> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(BTreeMap::from([
                ("email".to_string(), email.clone()),
                ("password".to_string(), password.clone()),
            ])),
            _ => None,
        }
    }

    fn selections(&self) -> Result<Option<BTreeMap<String, String>>, String> {
        if self.set.is_empty() {
            return Ok(None);
        }
        let mut selections = BTreeMap::new();
        for pair in &self.set {
            let (option, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("invalid --set '{pair}', expected OPTION=VALUE"))?;
            selections.insert(option.to_string(), value.to_string());
        }
        Ok(Some(selections))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wpmbot=info".parse()?),
        )
        .init();

    let budget = TypingBudget::new(cli.wpm, cli.secs)?;
    let selections = cli.selections()?;
    let credentials = cli.credentials();
    if cli.email.is_some() != cli.password.is_some() {
        warn!("only one of --email/--password given, ignoring credentials");
    }

    let store_path = cli
        .profiles
        .clone()
        .or_else(AppDirs::profile_store_path)
        .ok_or("no profile store location could be resolved")?;
    let store = ProfileStore::load(&store_path)?;
    let profile = store.resolve(&cli.url)?.clone();

    info!(url = %cli.url, browser = %cli.browser, endpoint = %cli.webdriver, "connecting");
    let page = WebDriverPage::connect(&cli.webdriver, &cli.browser.as_capability())?;

    let summary = run_session(profile, &cli.url, page, budget, credentials, selections)?;
    info!(
        chars_sent = summary.chars_sent,
        chars_dropped = summary.chars_dropped,
        passes = summary.passes,
        "session complete"
    );
    Ok(())
}
