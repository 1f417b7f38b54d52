use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// An element address on the page. The addressing scheme is fixed per
/// profile entry: consent buttons, login inputs and config options are
/// XPath, the prompt-words element is CSS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Xpath(String),
    Css(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Xpath(s) => write!(f, "xpath {s}"),
            Selector::Css(s) => write!(f, "css {s}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile store {path} could not be read: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("profile store is not valid yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("target url '{url}' is not parseable: {source}")]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("target url '{url}' has no host")]
    NoHost { url: String },
    #[error("no profile entry for origin {origin}")]
    NotFound { origin: String },
}

/// Declarative description of the selectors needed to drive one site
/// through the stage pipeline. All sections are optional; a stage whose
/// section is missing skips with a warning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub cookies: Option<ConsentSection>,
    #[serde(default)]
    pub login: Option<LoginSection>,
    #[serde(default)]
    pub config: Option<BTreeMap<String, BTreeMap<String, String>>>,
    #[serde(default, rename = "typing-field")]
    pub typing_field: Option<TypingField>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsentSection {
    pub xpath: String,
}

impl ConsentSection {
    pub fn selector(&self) -> Selector {
        Selector::Xpath(self.xpath.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginSection {
    pub url: String,
    pub xpath: LoginSelectors,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginSelectors {
    /// credential-field name (email, password, ...) -> input selector
    pub form: BTreeMap<String, String>,
    pub submit: String,
}

impl LoginSelectors {
    pub fn submit_selector(&self) -> Selector {
        Selector::Xpath(self.submit.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypingField {
    pub path: TypingFieldPath,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypingFieldPath {
    pub input: String,
    pub words: String,
}

impl TypingField {
    pub fn input_selector(&self) -> Selector {
        Selector::Xpath(self.path.input.clone())
    }

    pub fn words_selector(&self) -> Selector {
        Selector::Css(self.path.words.clone())
    }
}

/// Scheme + host (+ explicit port) with the path discarded and a trailing
/// slash appended; this is the profile store's lookup key.
pub fn normalize_origin(url: &str) -> Result<String, ProfileError> {
    let parsed = Url::parse(url).map_err(|source| ProfileError::BadUrl {
        url: url.to_string(),
        source,
    })?;
    let host = parsed.host_str().ok_or_else(|| ProfileError::NoHost {
        url: url.to_string(),
    })?;
    Ok(match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    })
}

/// Origin-keyed collection of profiles, loaded once from a YAML document
/// and read-only for the rest of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileStore {
    entries: BTreeMap<String, Profile>,
}

impl ProfileStore {
    pub fn from_yaml(text: &str) -> Result<Self, ProfileError> {
        Ok(Self {
            entries: serde_yaml::from_str(text)?,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Pure lookup by the normalized origin of `url`; no network access.
    pub fn resolve(&self, url: &str) -> Result<&Profile, ProfileError> {
        let origin = normalize_origin(url)?;
        self.entries
            .get(&origin)
            .ok_or(ProfileError::NotFound { origin })
    }
}
