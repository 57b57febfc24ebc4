//! Login and inventory scenario for the demo storefront
//!
//! Every step starts from a clean browser: cookies and web storage are
//! cleared and the login page reloaded, so steps do not depend on each
//! other's browser state. Steps that need a working login declare `ui_user`,
//! written by `login_valid`.
//!
//! `page_load` logs in as the deliberately slow `performance_glitch_user`
//! and is expected to miss its budget.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::{wait_for, Element, Locator, UiDriver, WaitCondition};
use crate::common::config::UiConfig;
use crate::common::Result;
use crate::scenario::assert::{ensure, equal};
use crate::scenario::{Scenario, Step, StepAction, StepEnv};

pub const UI_USER: &str = "ui_user";

pub const INVALID_LOGIN_ERROR: &str =
    "Epic sadface: Username and password do not match any user in this service";
pub const LOCKED_OUT_ERROR: &str = "Epic sadface: Sorry, this user has been locked out.";

const LOCKED_OUT_USER: &str = "locked_out_user";
const PERFORMANCE_GLITCH_USER: &str = "performance_glitch_user";
const WRONG_PASSWORD: &str = "wrong_password";
const INVENTORY_PAGE: &str = "inventory.html";

fn username_input() -> Locator {
    Locator::css(r#"input[data-test="username"]"#)
}
fn password_input() -> Locator {
    Locator::css(r#"input[data-test="password"]"#)
}
fn login_button() -> Locator {
    Locator::id("login-button")
}
fn error_banner() -> Locator {
    Locator::css(r#"h3[data-test="error"]"#)
}
fn inventory_list() -> Locator {
    Locator::class_name("inventory_list")
}

/// Build the UI scenario for the configured storefront
pub fn scenario(config: &UiConfig) -> Scenario {
    let config = Arc::new(config.clone());
    let step = |id: &str, check: Check| {
        Step::new(
            id,
            UiStep {
                config: config.clone(),
                check,
            },
        )
    };

    Scenario::new("ui")
        .step(step("login_valid", Check::ValidLogin).produces([UI_USER]))
        .step(step("login_invalid", Check::InvalidLogin))
        .step(step("login_locked_out", Check::LockedOut))
        .step(step("inventory_items", Check::InventoryItems).requires([UI_USER]))
        .step(step("logout", Check::Logout).requires([UI_USER]))
        .step(
            step("page_load", Check::PageLoad)
                .requires([UI_USER])
                .expected_to_fail(),
        )
}

#[derive(Debug, Clone, Copy)]
enum Check {
    ValidLogin,
    InvalidLogin,
    LockedOut,
    InventoryItems,
    Logout,
    PageLoad,
}

struct UiStep {
    config: Arc<UiConfig>,
    check: Check,
}

#[async_trait]
impl StepAction for UiStep {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let config = self.config.as_ref();
        let driver = env.ui()?;

        match self.check {
            Check::ValidLogin => {
                login(driver, config, &config.username, &config.password).await?;
                await_inventory(driver, config).await?;
                env.context.put(UI_USER, config.username.clone());
                Ok(())
            }
            Check::InvalidLogin => {
                login(driver, config, &config.username, WRONG_PASSWORD).await?;
                expect_error(driver, config, INVALID_LOGIN_ERROR).await
            }
            Check::LockedOut => {
                login(driver, config, LOCKED_OUT_USER, &config.password).await?;
                expect_error(driver, config, LOCKED_OUT_ERROR).await
            }
            Check::InventoryItems => {
                login(driver, config, &config.username, &config.password).await?;
                await_inventory(driver, config).await?;
                check_inventory(driver).await
            }
            Check::Logout => {
                login(driver, config, &config.username, &config.password).await?;
                await_inventory(driver, config).await?;
                logout(driver, config).await
            }
            Check::PageLoad => {
                let button =
                    fill_login(driver, config, PERFORMANCE_GLITCH_USER, &config.password).await?;
                let started = Instant::now();
                driver.click(&button).await?;
                await_inventory(driver, config).await?;
                let elapsed = started.elapsed().as_millis() as u64;
                debug!(elapsed_ms = elapsed, "Inventory loaded");
                ensure(elapsed < config.page_load_budget_ms, || {
                    format!(
                        "inventory took {} ms to load, budget is {} ms",
                        elapsed, config.page_load_budget_ms
                    )
                })
            }
        }
    }
}

/// Fresh login page, then submit the form
async fn login(
    driver: &mut dyn UiDriver,
    config: &UiConfig,
    username: &str,
    password: &str,
) -> Result<()> {
    let button = fill_login(driver, config, username, password).await?;
    driver.click(&button).await
}

/// Fresh login page with the form filled in; returns the submit button
async fn fill_login(
    driver: &mut dyn UiDriver,
    config: &UiConfig,
    username: &str,
    password: &str,
) -> Result<Element> {
    driver.clear_cookies().await?;
    driver.navigate(&config.base_url).await?;
    // Storage is per origin, so it can only be cleared once the page is open
    driver.clear_storage().await?;

    wait_for(driver, &WaitCondition::Visible(username_input()), config.wait_timeout()).await?;
    let user = driver.find_element(&username_input()).await?;
    driver.type_text(&user, username).await?;
    let pass = driver.find_element(&password_input()).await?;
    driver.type_text(&pass, password).await?;
    driver.find_element(&login_button()).await
}

async fn await_inventory(driver: &mut dyn UiDriver, config: &UiConfig) -> Result<()> {
    wait_for(
        driver,
        &WaitCondition::UrlContains(INVENTORY_PAGE.to_string()),
        config.wait_timeout(),
    )
    .await?;
    wait_for(driver, &WaitCondition::Visible(inventory_list()), config.wait_timeout()).await?;
    Ok(())
}

async fn expect_error(driver: &mut dyn UiDriver, config: &UiConfig, expected: &str) -> Result<()> {
    let banner = wait_for(driver, &WaitCondition::Visible(error_banner()), config.wait_timeout())
        .await?;
    let text = match banner {
        Some(banner) => driver.text(&banner).await?,
        None => String::new(),
    };
    equal("login error", &expected, &text.trim())
}

/// Every inventory item shows a name and a dollar price
async fn check_inventory(driver: &mut dyn UiDriver) -> Result<()> {
    let items = driver.find_elements(&Locator::class_name("inventory_item")).await?;
    ensure(!items.is_empty(), || "inventory is empty".to_string())?;

    for (index, item) in items.iter().enumerate() {
        let name = driver
            .find_child(item, &Locator::class_name("inventory_item_name"))
            .await?;
        let name = driver.text(&name).await?;
        ensure(!name.trim().is_empty(), || format!("item {} has no name", index))?;

        let price = driver
            .find_child(item, &Locator::class_name("inventory_item_price"))
            .await?;
        let price = driver.text(&price).await?;
        ensure(price.starts_with('$'), || {
            format!("item '{}' has price {:?}", name, price)
        })?;
    }
    Ok(())
}

async fn logout(driver: &mut dyn UiDriver, config: &UiConfig) -> Result<()> {
    let menu = driver.find_element(&Locator::id("react-burger-menu-btn")).await?;
    driver.click(&menu).await?;

    let link = wait_for(
        driver,
        &WaitCondition::Visible(Locator::id("logout_sidebar_link")),
        config.wait_timeout(),
    )
    .await?;
    if let Some(link) = link {
        driver.click(&link).await?;
    }

    wait_for(driver, &WaitCondition::Visible(login_button()), config.wait_timeout()).await?;
    let url = driver.current_url().await?;
    ensure(!url.contains(INVENTORY_PAGE), || {
        format!("still on {} after logout", url)
    })
}
