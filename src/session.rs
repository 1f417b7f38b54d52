use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::page::{InteractivePage, PageElement, PageError};
use crate::profile::{LoginSection, Profile, Selector};
use crate::timing::TypingBudget;
use crate::typist::{self, TypingSummary, TypistError};

/// One step of the fixed sequential pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Navigate,
    Authenticate,
    Consent,
    Configure,
    Type,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation failed: {0}")]
    Navigation(#[source] PageError),
    #[error("authentication failed: {0}")]
    Authentication(#[source] PageError),
    #[error("no credential value supplied for login field '{field}'")]
    MissingCredential { field: String },
    #[error("typing stage failed: {0}")]
    Typing(#[from] TypistError),
}

/// Settle pauses between stage actions. The defaults match what real pages
/// need; tests shorten them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePauses {
    /// After loading the login page.
    pub login_settle: Duration,
    /// After clicking the login submit button.
    pub submit_settle: Duration,
    /// Between configuration option clicks.
    pub config_settle: Duration,
    /// Bounded wait for the cookie-consent button.
    pub consent_wait: Duration,
}

impl Default for StagePauses {
    fn default() -> Self {
        Self {
            login_settle: Duration::from_millis(500),
            submit_settle: Duration::from_secs(2),
            config_settle: Duration::from_millis(100),
            consent_wait: Duration::from_secs(5),
        }
    }
}

impl StagePauses {
    /// All-zero pauses, for tests that script the page anyway.
    pub fn none() -> Self {
        Self {
            login_settle: Duration::ZERO,
            submit_settle: Duration::ZERO,
            config_settle: Duration::ZERO,
            consent_wait: Duration::ZERO,
        }
    }
}

/// One run of the stage pipeline against one page: navigate, authenticate,
/// accept consent, apply configuration, then type until the budget's
/// deadline. Owns the page exclusively and tears it down when done.
pub struct Session<P: InteractivePage> {
    page: P,
    profile: Profile,
    url: String,
    budget: TypingBudget,
    credentials: Option<BTreeMap<String, String>>,
    selections: Option<BTreeMap<String, String>>,
    pauses: StagePauses,
}

impl<P: InteractivePage> Session<P> {
    pub fn new(profile: Profile, url: &str, page: P, budget: TypingBudget) -> Self {
        Self {
            page,
            profile,
            url: url.to_string(),
            budget,
            credentials: None,
            selections: None,
            pauses: StagePauses::default(),
        }
    }

    /// Credential-field name (lowercase) -> value. Never persisted.
    pub fn with_credentials(mut self, credentials: BTreeMap<String, String>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Option name -> desired value; validated lazily against the
    /// profile's config section.
    pub fn with_selections(mut self, selections: BTreeMap<String, String>) -> Self {
        self.selections = Some(selections);
        self
    }

    pub fn with_pauses(mut self, pauses: StagePauses) -> Self {
        self.pauses = pauses;
        self
    }

    /// Execute the stage pipeline. Stages run strictly in order; each one
    /// decides internally whether to act or skip. Authentication and
    /// navigation faults are fatal, consent and configuration faults are
    /// logged and the pipeline continues.
    pub fn run(mut self) -> Result<TypingSummary, SessionError> {
        let result = self.execute();
        if let Err(err) = self.page.quit() {
            warn!(error = %err, "page teardown failed");
        }
        result
    }

    fn execute(&mut self) -> Result<TypingSummary, SessionError> {
        self.goto_target()?;
        self.authenticate()?;
        self.accept_consent();
        self.apply_config();
        self.drive_typing()
    }

    fn goto_target(&mut self) -> Result<(), SessionError> {
        let here = self.page.current_url().map_err(SessionError::Navigation)?;
        if here != self.url {
            info!(stage = %Stage::Navigate, url = %self.url, "loading target page");
            self.page
                .navigate(&self.url)
                .map_err(SessionError::Navigation)?;
        }
        Ok(())
    }

    fn authenticate(&mut self) -> Result<(), SessionError> {
        let (login, creds) = match (self.profile.login.clone(), self.credentials.clone()) {
            (Some(login), Some(creds)) => (login, creds),
            _ => {
                warn!(stage = %Stage::Authenticate, "login section or credentials missing, skipping sign-in");
                return Ok(());
            }
        };
        info!(
            stage = %Stage::Authenticate,
            user = creds.get("email").map(String::as_str).unwrap_or("<unknown>"),
            "signing in"
        );
        let result = self.sign_in(&login, &creds);
        if let Err(err) = &result {
            // A failed login invalidates the rest of the session; log with
            // context, then re-raise.
            error!(stage = %Stage::Authenticate, error = %err, "sign-in failed");
        }
        result
    }

    fn sign_in(
        &mut self,
        login: &LoginSection,
        creds: &BTreeMap<String, String>,
    ) -> Result<(), SessionError> {
        self.page
            .navigate(&login.url)
            .map_err(SessionError::Authentication)?;
        thread::sleep(self.pauses.login_settle);

        for (field, xpath) in &login.xpath.form {
            let value = creds
                .get(&field.to_lowercase())
                .ok_or_else(|| SessionError::MissingCredential {
                    field: field.clone(),
                })?;
            let selector = Selector::Xpath(xpath.clone());
            let input = self
                .page
                .locate(&selector)
                .map_err(SessionError::Authentication)?;
            input.send_keys(value).map_err(SessionError::Authentication)?;
        }

        let submit = login.xpath.submit_selector();
        self.page
            .locate(&submit)
            .and_then(|button| button.click())
            .map_err(SessionError::Authentication)?;
        thread::sleep(self.pauses.submit_settle);

        let here = self.page.current_url().map_err(SessionError::Authentication)?;
        if here != self.url {
            self.page
                .navigate(&self.url)
                .map_err(SessionError::Authentication)?;
        }
        info!(stage = %Stage::Authenticate, "signed in");
        Ok(())
    }

    fn accept_consent(&mut self) {
        let Some(consent) = self.profile.cookies.clone() else {
            warn!(stage = %Stage::Consent, "cookies section missing, skipping consent banner");
            return;
        };
        let selector = consent.selector();
        info!(stage = %Stage::Consent, "accepting cookie banner");
        match self
            .page
            .wait_for_presence(&selector, self.pauses.consent_wait)
            .and_then(|button| button.click())
        {
            Ok(()) => info!(stage = %Stage::Consent, "cookie banner accepted"),
            // Cosmetic for the remaining stages; keep going.
            Err(err) => warn!(
                stage = %Stage::Consent,
                selector = %selector,
                error = %err,
                "cookie banner not accepted"
            ),
        }
    }

    fn apply_config(&mut self) {
        let (config, selections) = match (self.profile.config.clone(), self.selections.clone()) {
            (Some(config), Some(selections)) => (config, selections),
            _ => {
                warn!(stage = %Stage::Configure, "config section or selections missing, skipping configuration");
                return;
            }
        };
        info!(stage = %Stage::Configure, "applying configuration");
        for (option, value) in &selections {
            let option_key = option.to_lowercase();
            // Options the profile does not know are silently skipped.
            let Some(values) = config.get(&option_key) else {
                continue;
            };
            match values.get(value) {
                None => warn!(
                    stage = %Stage::Configure,
                    option = %option,
                    value = %value,
                    "no selector for requested value"
                ),
                Some(xpath) => {
                    let selector = Selector::Xpath(xpath.clone());
                    // Best-effort per option: one failure must not abort
                    // the rest.
                    if let Err(err) = self
                        .page
                        .locate(&selector)
                        .and_then(|button| button.click())
                    {
                        warn!(
                            stage = %Stage::Configure,
                            option = %option,
                            selector = %selector,
                            error = %err,
                            "option not applied"
                        );
                    }
                }
            }
            thread::sleep(self.pauses.config_settle);
        }
    }

    fn drive_typing(&mut self) -> Result<TypingSummary, SessionError> {
        let here = self.page.current_url().map_err(SessionError::Navigation)?;
        if here != self.url {
            self.page
                .navigate(&self.url)
                .map_err(SessionError::Navigation)?;
        }

        let Some(field) = self.profile.typing_field.clone() else {
            warn!(stage = %Stage::Type, "typing-field section missing, skipping typing");
            return Ok(TypingSummary::default());
        };

        let interval = self.budget.char_interval();
        let deadline = self.budget.deadline(Instant::now());
        info!(
            stage = %Stage::Type,
            wpm = self.budget.wpm(),
            secs = self.budget.secs(),
            ?interval,
            "typing until deadline"
        );
        let summary = typist::drive(&mut self.page, &field, deadline, interval)?;
        info!(
            stage = %Stage::Type,
            chars_sent = summary.chars_sent,
            chars_dropped = summary.chars_dropped,
            passes = summary.passes,
            "deadline reached"
        );
        Ok(summary)
    }
}

/// The one-call surface: run the full stage pipeline against `page` and
/// return the typing summary, or the first fatal error.
pub fn run_session<P: InteractivePage>(
    profile: Profile,
    url: &str,
    page: P,
    budget: TypingBudget,
    credentials: Option<BTreeMap<String, String>>,
    selections: Option<BTreeMap<String, String>>,
) -> Result<TypingSummary, SessionError> {
    let mut session = Session::new(profile, url, page, budget);
    if let Some(credentials) = credentials {
        session = session.with_credentials(credentials);
    }
    if let Some(selections) = selections {
        session = session.with_selections(selections);
    }
    session.run()
}
