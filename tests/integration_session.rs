// End-to-end stage pipeline scenarios against a scripted page, driven
// through the public run_session/Session surface only.

use std::collections::BTreeMap;
use std::time::Duration;

use assert_matches::assert_matches;

use wpmbot::page::ScriptedPage;
use wpmbot::profile::{Profile, ProfileStore, Selector};
use wpmbot::{run_session, Session, SessionError, StagePauses, TypingBudget};

const TARGET: &str = "https://play.example.com/";

fn profile(yaml: &str) -> Profile {
    let store = ProfileStore::from_yaml(yaml).unwrap();
    store.resolve(TARGET).unwrap().clone()
}

/// The scenario from the original deployment: a consent-only profile with a
/// 2-second budget at 60 WPM. Consent is accepted exactly once, login and
/// configuration are skipped, and at most 10 characters fit the budget at
/// the resulting 0.2s interval.
#[test]
fn cookies_only_profile_end_to_end() {
    let profile = profile(
        r##"
"https://play.example.com/":
  cookies:
    xpath: "//button[@id='accept']"
  typing-field:
    path:
      input: "//input[@id='typer']"
      words: "#words"
"##,
    );
    let page = ScriptedPage::new(TARGET);
    let probe = page.clone();
    page.script_text(&Selector::Css("#words".into()), &["aaaaaaaaaaaaaaaaaaaa"]);

    let budget = TypingBudget::new(60.0, 2.0).unwrap();
    assert_eq!(budget.char_interval(), Duration::from_secs_f64(0.2));

    let creds = BTreeMap::from([
        ("email".to_string(), "a@b.c".to_string()),
        ("password".to_string(), "hunter2".to_string()),
    ]);
    let selections = BTreeMap::from([("language".to_string(), "english".to_string())]);
    let summary = run_session(
        profile,
        TARGET,
        page,
        budget,
        Some(creds),
        Some(selections),
    )
    .unwrap();

    // consent accepted exactly once
    assert_eq!(probe.clicks(), vec!["xpath //button[@id='accept']"]);
    // no login page visited, no form filled beyond the typed prompt
    assert!(probe.navigations().is_empty());
    // at most 10 characters fit into 2 seconds at 0.2s per character
    assert!(summary.chars_sent <= 10, "sent {}", summary.chars_sent);
    assert!(summary.chars_sent >= 8, "sent {}", summary.chars_sent);
    assert_eq!(probe.sent().len(), summary.chars_sent);
}

#[test]
fn authentication_failure_propagates_unmodified() {
    let profile = profile(
        r##"
"https://play.example.com/":
  login:
    url: "https://play.example.com/login"
    xpath:
      form:
        email: "//input[@id='email']"
        password: "//input[@id='password']"
      submit: "//button[@type='submit']"
  typing-field:
    path:
      input: "//input[@id='typer']"
      words: "#words"
"##,
    );
    let page = ScriptedPage::new(TARGET);
    let probe = page.clone();
    page.fail_clicks_on(&Selector::Xpath("//button[@type='submit']".into()));

    let creds = BTreeMap::from([
        ("email".to_string(), "a@b.c".to_string()),
        ("password".to_string(), "hunter2".to_string()),
    ]);
    let budget = TypingBudget::new(60.0, 1.0).unwrap();
    let err = Session::new(profile, TARGET, page, budget)
        .with_credentials(creds)
        .with_pauses(StagePauses::none())
        .run()
        .unwrap_err();

    assert_matches!(err, SessionError::Authentication(_));
    // the pipeline stopped before typing anything into the prompt field
    assert_eq!(probe.sent(), "a@b.chunter2");
}

#[test]
fn unknown_config_option_does_not_fail_the_run() {
    let profile = profile(
        r#"
"https://play.example.com/":
  config:
    language:
      english: "//li[@data-lang='en']"
"#,
    );
    let page = ScriptedPage::new(TARGET);
    let probe = page.clone();

    let selections = BTreeMap::from([
        ("language".to_string(), "english".to_string()),
        ("keyboard".to_string(), "qwerty".to_string()),
    ]);
    let budget = TypingBudget::new(120.0, 1.0).unwrap();
    Session::new(profile, TARGET, page, budget)
        .with_selections(selections)
        .with_pauses(StagePauses::none())
        .run()
        .unwrap();

    assert_eq!(probe.clicks(), vec!["xpath //li[@data-lang='en']"]);
}

#[test]
fn profile_resolution_failure_prevents_any_session() {
    let store = ProfileStore::from_yaml(
        r#"
"https://play.example.com/":
  cookies:
    xpath: "//button[@id='accept']"
"#,
    )
    .unwrap();
    assert_matches!(
        store.resolve("https://elsewhere.example.com/"),
        Err(wpmbot::ProfileError::NotFound { .. })
    );
}
