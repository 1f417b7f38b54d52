use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

use crate::profile::Selector;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("no element matched {selector}")]
    NotFound { selector: String },
    #[error("element {selector} did not appear within {timeout:?}")]
    PresenceTimeout { selector: String, timeout: Duration },
    #[error("transient input failure: {0}")]
    TransientInput(String),
    #[error("webdriver failure: {0}")]
    Backend(String),
}

impl PageError {
    /// Transient faults are worth skipping past; everything else ends the
    /// session.
    pub fn is_transient(&self) -> bool {
        matches!(self, PageError::TransientInput(_))
    }
}

/// One located element on a live page.
pub trait PageElement {
    fn click(&self) -> Result<(), PageError>;
    fn send_keys(&self, text: &str) -> Result<(), PageError>;
    fn text(&self) -> Result<String, PageError>;
}

/// Blocking capability surface of a live, automatable browser page.
/// Exclusively owned by one session; every call suspends the caller until
/// the page responds or times out.
pub trait InteractivePage {
    type Element: PageElement;

    fn current_url(&mut self) -> Result<String, PageError>;
    fn navigate(&mut self, url: &str) -> Result<(), PageError>;
    fn locate(&mut self, selector: &Selector) -> Result<Self::Element, PageError>;
    fn wait_for_presence(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Self::Element, PageError>;
    /// Tear down the underlying browser session.
    fn quit(self) -> Result<(), PageError>;
}

#[derive(Debug, Default)]
struct ScriptState {
    url: String,
    navigations: Vec<String>,
    clicks: Vec<String>,
    sent: String,
    send_count: usize,
    texts: BTreeMap<String, Vec<String>>,
    locates: BTreeMap<String, usize>,
    missing: BTreeSet<String>,
    failing_clicks: BTreeSet<String>,
    transient_sends: BTreeSet<usize>,
    fatal_sends: BTreeSet<usize>,
    failing_texts: BTreeSet<String>,
}

/// Scripted page for unit and integration tests. Clones share state, so a
/// test can keep a probe handle while the session consumes the page.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedPage {
    pub fn new(url: &str) -> Self {
        let page = Self::default();
        page.state.borrow_mut().url = url.to_string();
        page
    }

    /// Script the text a selector serves; each (re-)location of the
    /// selector advances to the next entry, the last one repeats.
    pub fn script_text(&self, selector: &Selector, texts: &[&str]) {
        self.state.borrow_mut().texts.insert(
            selector.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
    }

    /// Make locate/wait fail for this selector.
    pub fn mark_missing(&self, selector: &Selector) {
        self.state.borrow_mut().missing.insert(selector.to_string());
    }

    /// Make clicks on this selector fail with a backend error.
    pub fn fail_clicks_on(&self, selector: &Selector) {
        self.state
            .borrow_mut()
            .failing_clicks
            .insert(selector.to_string());
    }

    /// Make the nth `send_keys` call (zero-based, across all elements)
    /// fail transiently.
    pub fn fail_send(&self, index: usize) {
        self.state.borrow_mut().transient_sends.insert(index);
    }

    /// Make the nth `send_keys` call fail non-transiently.
    pub fn fail_send_fatally(&self, index: usize) {
        self.state.borrow_mut().fatal_sends.insert(index);
    }

    /// Make text reads on this selector fail with a backend error.
    pub fn fail_text_on(&self, selector: &Selector) {
        self.state
            .borrow_mut()
            .failing_texts
            .insert(selector.to_string());
    }

    /// Everything sent to input fields so far, in order.
    pub fn sent(&self) -> String {
        self.state.borrow().sent.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    /// How many times a selector has been located (including waits).
    pub fn locate_count(&self, selector: &Selector) -> usize {
        self.state
            .borrow()
            .locates
            .get(&selector.to_string())
            .copied()
            .unwrap_or(0)
    }

    fn locate_inner(&self, selector: &Selector) -> Result<ScriptedElement, PageError> {
        let key = selector.to_string();
        let mut state = self.state.borrow_mut();
        if state.missing.contains(&key) {
            return Err(PageError::NotFound { selector: key });
        }
        let count = state.locates.entry(key.clone()).or_insert(0);
        *count += 1;
        let generation = *count - 1;
        Ok(ScriptedElement {
            state: Rc::clone(&self.state),
            key,
            generation,
        })
    }
}

#[derive(Debug)]
pub struct ScriptedElement {
    state: Rc<RefCell<ScriptState>>,
    key: String,
    generation: usize,
}

impl PageElement for ScriptedElement {
    fn click(&self) -> Result<(), PageError> {
        let mut state = self.state.borrow_mut();
        if state.failing_clicks.contains(&self.key) {
            return Err(PageError::Backend("scripted click failure".into()));
        }
        state.clicks.push(self.key.clone());
        Ok(())
    }

    fn send_keys(&self, text: &str) -> Result<(), PageError> {
        let mut state = self.state.borrow_mut();
        let index = state.send_count;
        state.send_count += 1;
        if state.transient_sends.contains(&index) {
            return Err(PageError::TransientInput("scripted send failure".into()));
        }
        if state.fatal_sends.contains(&index) {
            return Err(PageError::Backend("scripted input loss".into()));
        }
        state.sent.push_str(text);
        Ok(())
    }

    fn text(&self) -> Result<String, PageError> {
        let state = self.state.borrow();
        if state.failing_texts.contains(&self.key) {
            return Err(PageError::Backend("scripted text failure".into()));
        }
        let Some(texts) = state.texts.get(&self.key) else {
            return Ok(String::new());
        };
        let index = self.generation.min(texts.len().saturating_sub(1));
        Ok(texts.get(index).cloned().unwrap_or_default())
    }
}

impl InteractivePage for ScriptedPage {
    type Element = ScriptedElement;

    fn current_url(&mut self) -> Result<String, PageError> {
        Ok(self.state.borrow().url.clone())
    }

    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        let mut state = self.state.borrow_mut();
        state.url = url.to_string();
        state.navigations.push(url.to_string());
        Ok(())
    }

    fn locate(&mut self, selector: &Selector) -> Result<Self::Element, PageError> {
        self.locate_inner(selector)
    }

    fn wait_for_presence(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Self::Element, PageError> {
        // No waiting in the scripted page: either the element is there or
        // the timeout is reported immediately.
        self.locate_inner(selector).map_err(|_| PageError::PresenceTimeout {
            selector: selector.to_string(),
            timeout,
        })
    }

    fn quit(self) -> Result<(), PageError> {
        Ok(())
    }
}
