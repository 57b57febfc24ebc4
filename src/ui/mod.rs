//! Browser automation capability
//!
//! UI steps talk to the browser only through [`UiDriver`], so the suite runs
//! against a real WebDriver server ([`WebDriverClient`]) or a scripted fake
//! in tests.

pub mod suite;
mod webdriver;

pub use webdriver::WebDriverClient;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::common::{Error, Result};

/// Interval between two checks of a [`WaitCondition`]
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How to find an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    Id(String),
    ClassName(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn class_name(name: impl Into<String>) -> Self {
        Locator::ClassName(name.into())
    }

    /// Equivalent CSS selector
    pub fn to_css(&self) -> String {
        match self {
            Locator::Css(selector) => selector.clone(),
            Locator::Id(id) => format!("#{}", id),
            Locator::ClassName(name) => format!(".{}", name),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css '{}'", selector),
            Locator::Id(id) => write!(f, "id '{}'", id),
            Locator::ClassName(name) => write!(f, "class '{}'", name),
        }
    }
}

/// Opaque handle to an element found by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element(pub String);

/// Something to wait for
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// An element matching the locator exists
    Present(Locator),
    /// An element matching the locator exists and is displayed
    Visible(Locator),
    /// The current URL contains the fragment
    UrlContains(String),
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Present(locator) => write!(f, "{} to be present", locator),
            WaitCondition::Visible(locator) => write!(f, "{} to be visible", locator),
            WaitCondition::UrlContains(fragment) => write!(f, "URL to contain '{}'", fragment),
        }
    }
}

/// Browser session operations used by UI steps
///
/// `find_element` fails with [`Error::ElementNotFound`] when nothing
/// matches; other failures are driver faults.
#[async_trait]
pub trait UiDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn current_url(&mut self) -> Result<String>;

    async fn find_element(&mut self, locator: &Locator) -> Result<Element>;

    /// All matches, possibly none
    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>>;

    /// First match below `parent`
    async fn find_child(&mut self, parent: &Element, locator: &Locator) -> Result<Element>;

    async fn click(&mut self, element: &Element) -> Result<()>;

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<()>;

    async fn text(&mut self, element: &Element) -> Result<String>;

    async fn is_displayed(&mut self, element: &Element) -> Result<bool>;

    async fn clear_cookies(&mut self) -> Result<()>;

    /// Empty `localStorage` and `sessionStorage` of the current page
    async fn clear_storage(&mut self) -> Result<()>;

    /// End the browser session; the driver is unusable afterwards
    async fn close(&mut self) -> Result<()>;
}

/// Poll `condition` until it holds or `timeout` elapses
///
/// Returns the matched element for element conditions. A missing element is
/// not an error while waiting; any other driver error ends the wait.
pub async fn wait_for(
    driver: &mut dyn UiDriver,
    condition: &WaitCondition,
    timeout: Duration,
) -> Result<Option<Element>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(found) = check(driver, condition).await? {
            return Ok(found);
        }
        if Instant::now() >= deadline {
            return Err(Error::WaitTimeout {
                condition: condition.to_string(),
                millis: timeout.as_millis() as u64,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// `Some` once the condition holds
async fn check(
    driver: &mut dyn UiDriver,
    condition: &WaitCondition,
) -> Result<Option<Option<Element>>> {
    match condition {
        WaitCondition::UrlContains(fragment) => {
            let url = driver.current_url().await?;
            Ok(url.contains(fragment.as_str()).then_some(None))
        }
        WaitCondition::Present(locator) => match driver.find_element(locator).await {
            Ok(element) => Ok(Some(Some(element))),
            Err(Error::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        },
        WaitCondition::Visible(locator) => match driver.find_element(locator).await {
            Ok(element) => {
                if driver.is_displayed(&element).await? {
                    Ok(Some(Some(element)))
                } else {
                    Ok(None)
                }
            }
            Err(Error::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        },
    }
}
