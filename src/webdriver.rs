use std::rc::Rc;
use std::time::Duration;

use fantoccini::elements::Element;
use fantoccini::error::{CmdError, NewSessionError};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio::runtime::Runtime;
use tracing::info;

use crate::page::{InteractivePage, PageElement, PageError};
use crate::profile::Selector;

/// WebDriver error messages for per-keystroke faults worth skipping past.
const TRANSIENT_MARKERS: [&str; 3] = [
    "not interactable",
    "click intercepted",
    "is not reachable",
];

/// Standard WebDriver error message for a failed element lookup.
const NOT_FOUND_MARKER: &str = "no such element";

const WINDOW_WIDTH: u32 = 980;
const WINDOW_HEIGHT: u32 = 1280;

fn locator(selector: &Selector) -> Locator<'_> {
    match selector {
        Selector::Xpath(s) => Locator::XPath(s),
        Selector::Css(s) => Locator::Css(s),
    }
}

fn map_cmd_error(err: CmdError) -> PageError {
    let msg = err.to_string();
    if TRANSIENT_MARKERS.iter().any(|marker| msg.contains(marker)) {
        PageError::TransientInput(msg)
    } else {
        PageError::Backend(msg)
    }
}

fn map_locate_error(err: CmdError, selector: &Selector) -> PageError {
    if err.to_string().contains(NOT_FOUND_MARKER) {
        PageError::NotFound {
            selector: selector.to_string(),
        }
    } else {
        map_cmd_error(err)
    }
}

fn map_session_error(err: NewSessionError) -> PageError {
    PageError::Backend(err.to_string())
}

/// [`InteractivePage`] over a real WebDriver session. fantoccini is async;
/// a current-thread runtime turns every call into the blocking operation
/// the sequencer expects.
pub struct WebDriverPage {
    rt: Rc<Runtime>,
    client: Client,
}

impl WebDriverPage {
    /// Connect to a WebDriver endpoint and open a session for the named
    /// browser ("chrome", "firefox", ...).
    pub fn connect(webdriver_url: &str, browser: &str) -> Result<Self, PageError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| PageError::Backend(err.to_string()))?;

        let mut caps = serde_json::map::Map::new();
        caps.insert("browserName".to_string(), json!(browser));

        let client = rt
            .block_on(ClientBuilder::native().capabilities(caps).connect(webdriver_url))
            .map_err(map_session_error)?;
        rt.block_on(client.set_window_size(WINDOW_WIDTH, WINDOW_HEIGHT))
            .map_err(map_cmd_error)?;
        info!(endpoint = webdriver_url, browser, "webdriver session opened");

        Ok(Self {
            rt: Rc::new(rt),
            client,
        })
    }
}

impl InteractivePage for WebDriverPage {
    type Element = WebDriverElement;

    fn current_url(&mut self) -> Result<String, PageError> {
        self.rt
            .block_on(self.client.current_url())
            .map(|url| url.to_string())
            .map_err(map_cmd_error)
    }

    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.rt.block_on(self.client.goto(url)).map_err(map_cmd_error)
    }

    fn locate(&mut self, selector: &Selector) -> Result<Self::Element, PageError> {
        let element = self
            .rt
            .block_on(self.client.find(locator(selector)))
            .map_err(|err| map_locate_error(err, selector))?;
        Ok(WebDriverElement {
            rt: Rc::clone(&self.rt),
            element,
        })
    }

    fn wait_for_presence(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Self::Element, PageError> {
        let element = self
            .rt
            .block_on(
                self.client
                    .wait()
                    .at_most(timeout)
                    .for_element(locator(selector)),
            )
            .map_err(|err| match err {
                CmdError::WaitTimeout => PageError::PresenceTimeout {
                    selector: selector.to_string(),
                    timeout,
                },
                other => map_cmd_error(other),
            })?;
        Ok(WebDriverElement {
            rt: Rc::clone(&self.rt),
            element,
        })
    }

    fn quit(self) -> Result<(), PageError> {
        self.rt.block_on(self.client.close()).map_err(map_cmd_error)
    }
}

pub struct WebDriverElement {
    rt: Rc<Runtime>,
    element: Element,
}

impl PageElement for WebDriverElement {
    fn click(&self) -> Result<(), PageError> {
        self.rt.block_on(self.element.click()).map_err(map_cmd_error)
    }

    fn send_keys(&self, text: &str) -> Result<(), PageError> {
        self.rt
            .block_on(self.element.send_keys(text))
            .map_err(map_cmd_error)
    }

    fn text(&self) -> Result<String, PageError> {
        self.rt.block_on(self.element.text()).map_err(map_cmd_error)
    }
}
