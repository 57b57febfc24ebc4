//! The standard booking CRUD scenario
//!
//! Steps and the context keys they exchange:
//!
//! | step             | requires                          | produces                  |
//! |------------------|-----------------------------------|---------------------------|
//! | `health`         |                                   |                           |
//! | `auth`           |                                   | `token`                   |
//! | `create`         |                                   | `bookingid`, `booking_data` |
//! | `read`           | `bookingid`, `booking_data`       |                           |
//! | `list`           | `bookingid`                       |                           |
//! | `update`         | `bookingid`, `booking_data`, `token` |                        |
//! | `partial_update` | `bookingid`, `token`              |                           |
//! | `delete`         | `bookingid`, `token`              |                           |

use async_trait::async_trait;
use serde_json::json;

use super::{
    create_booking, delete_booking, get_booking, list_bookings, patch_booking, ping,
    update_booking, Booking, PING_STATUS,
};
use crate::common::config::ApiConfig;
use crate::common::{Error, Result};
use crate::scenario::assert::{ensure, equal};
use crate::scenario::{Scenario, Step, StepAction, StepEnv};
use crate::session::Credentials;

pub const TOKEN: &str = "token";
pub const BOOKING_ID: &str = "bookingid";
pub const BOOKING_DATA: &str = "booking_data";

/// First name the update step writes
pub const UPDATED_FIRSTNAME: &str = "Jane";

/// Additional needs the partial update step writes
pub const PATCHED_NEEDS: &str = "Late checkout";

/// Build the CRUD scenario against the configured credentials
pub fn scenario(config: &ApiConfig) -> Scenario {
    scenario_with(
        Credentials::new(&config.username, &config.password),
        Booking::sample(),
    )
}

/// Build the CRUD scenario with explicit credentials and booking payload
pub fn scenario_with(credentials: Credentials, booking: Booking) -> Scenario {
    Scenario::new("booking")
        .step(Step::new("health", HealthCheck))
        .step(Step::new("auth", Authenticate { credentials }).produces([TOKEN]))
        .step(Step::new("create", CreateBooking { booking }).produces([BOOKING_ID, BOOKING_DATA]))
        .step(Step::new("read", ReadBooking).requires([BOOKING_ID, BOOKING_DATA]))
        .step(Step::new("list", ListBookings).requires([BOOKING_ID]))
        .step(Step::new("update", UpdateBooking).requires([BOOKING_ID, BOOKING_DATA, TOKEN]))
        .step(Step::new("partial_update", PatchBooking).requires([BOOKING_ID, TOKEN]))
        .step(Step::new("delete", DeleteBooking).requires([BOOKING_ID, TOKEN]))
}

struct HealthCheck;

#[async_trait]
impl StepAction for HealthCheck {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let status = ping(env.session).await?;
        equal("GET /ping status", &PING_STATUS, &status)
    }
}

struct Authenticate {
    credentials: Credentials,
}

#[async_trait]
impl StepAction for Authenticate {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let token = env.session.authenticate(&self.credentials).await?.token().to_string();
        env.context.put(TOKEN, token);
        Ok(())
    }
}

struct CreateBooking {
    booking: Booking,
}

#[async_trait]
impl StepAction for CreateBooking {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let created = create_booking(env.session, &self.booking).await?;
        let diff = self.booking.differences(&created.booking);
        ensure(diff.is_empty(), || {
            format!("created booking differs in {}", diff.join(", "))
        })?;

        env.context.put(BOOKING_ID, created.bookingid);
        env.context.put_as(BOOKING_DATA, &created.booking)?;
        Ok(())
    }
}

struct ReadBooking;

#[async_trait]
impl StepAction for ReadBooking {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let id: u64 = env.context.get_as(BOOKING_ID)?;
        let expected: Booking = env.context.get_as(BOOKING_DATA)?;

        let stored = get_booking(env.session, id)
            .await?
            .ok_or_else(|| Error::Assertion(format!("booking {} not found", id)))?;
        let diff = expected.differences(&stored);
        ensure(diff.is_empty(), || {
            format!("booking {} differs in {}", id, diff.join(", "))
        })
    }
}

struct ListBookings;

#[async_trait]
impl StepAction for ListBookings {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let id: u64 = env.context.get_as(BOOKING_ID)?;
        let ids = list_bookings(env.session).await?;
        ensure(ids.contains(&id), || {
            format!("booking {} missing from a list of {}", id, ids.len())
        })
    }
}

struct UpdateBooking;

#[async_trait]
impl StepAction for UpdateBooking {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let id: u64 = env.context.get_as(BOOKING_ID)?;
        let mut booking: Booking = env.context.get_as(BOOKING_DATA)?;
        booking.firstname = UPDATED_FIRSTNAME.to_string();

        let updated = update_booking(env.session, id, &booking).await?;
        equal("updated firstname", &booking.firstname, &updated.firstname)?;

        let stored = get_booking(env.session, id)
            .await?
            .ok_or_else(|| Error::Assertion(format!("booking {} vanished after update", id)))?;
        equal("stored firstname", &booking.firstname, &stored.firstname)
    }
}

struct PatchBooking;

#[async_trait]
impl StepAction for PatchBooking {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let id: u64 = env.context.get_as(BOOKING_ID)?;
        let patched = patch_booking(env.session, id, &json!({ "additionalneeds": PATCHED_NEEDS }))
            .await?;
        equal(
            "patched additionalneeds",
            &Some(PATCHED_NEEDS.to_string()),
            &patched.additionalneeds,
        )
    }
}

struct DeleteBooking;

#[async_trait]
impl StepAction for DeleteBooking {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let id: u64 = env.context.get_as(BOOKING_ID)?;
        delete_booking(env.session, id).await?;
        let after = get_booking(env.session, id).await?;
        ensure(after.is_none(), || format!("booking {} still readable after delete", id))
    }
}
