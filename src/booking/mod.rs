//! Booking API client helpers, the standard booking suite and a simulated
//! booking API for offline runs

mod simulated;
pub mod suite;
mod types;

pub use simulated::SimulatedBookingApi;
pub use types::{Booking, BookingDates, BookingRef, CreatedBooking};

use crate::common::{Error, Result};
use crate::session::{HttpResponse, Method, Session};

/// Status the health endpoint answers with
pub const PING_STATUS: u16 = 201;

/// Status a successful delete answers with
pub const DELETE_STATUS: u16 = 201;

fn expect_status(response: HttpResponse, expected: u16, request: &str) -> Result<HttpResponse> {
    if response.status == expected {
        Ok(response)
    } else {
        Err(Error::unexpected_status(request, response.status, &response.body))
    }
}

fn booking_path(id: u64) -> String {
    format!("/booking/{}", id)
}

/// `GET /ping`; returns the status the service answered with
pub async fn ping(session: &Session) -> Result<u16> {
    let response = session.request(Method::Get, "/ping", None, false).await?;
    Ok(response.status)
}

/// `GET /booking`
pub async fn list_bookings(session: &Session) -> Result<Vec<u64>> {
    let response = session.request(Method::Get, "/booking", None, false).await?;
    let refs: Vec<BookingRef> = expect_status(response, 200, "GET /booking")?.json()?;
    Ok(refs.into_iter().map(|r| r.bookingid).collect())
}

/// `POST /booking`
pub async fn create_booking(session: &Session, booking: &Booking) -> Result<CreatedBooking> {
    let body = serde_json::to_value(booking)?;
    let response = session
        .request(Method::Post, "/booking", Some(&body), false)
        .await?;
    expect_status(response, 200, "POST /booking")?.json()
}

/// `GET /booking/{id}`; `None` when the booking does not exist
pub async fn get_booking(session: &Session, id: u64) -> Result<Option<Booking>> {
    let path = booking_path(id);
    let response = session.request(Method::Get, &path, None, false).await?;
    if response.status == 404 {
        return Ok(None);
    }
    let booking = expect_status(response, 200, &format!("GET {}", path))?.json()?;
    Ok(Some(booking))
}

/// `PUT /booking/{id}` (authenticated)
pub async fn update_booking(session: &Session, id: u64, booking: &Booking) -> Result<Booking> {
    let path = booking_path(id);
    let body = serde_json::to_value(booking)?;
    let response = session
        .request(Method::Put, &path, Some(&body), true)
        .await?;
    expect_status(response, 200, &format!("PUT {}", path))?.json()
}

/// `PATCH /booking/{id}` (authenticated) with a partial booking
pub async fn patch_booking(
    session: &Session,
    id: u64,
    fields: &serde_json::Value,
) -> Result<Booking> {
    let path = booking_path(id);
    let response = session
        .request(Method::Patch, &path, Some(fields), true)
        .await?;
    expect_status(response, 200, &format!("PATCH {}", path))?.json()
}

/// `DELETE /booking/{id}` (authenticated)
pub async fn delete_booking(session: &Session, id: u64) -> Result<()> {
    let path = booking_path(id);
    let response = session.request(Method::Delete, &path, None, true).await?;
    expect_status(response, DELETE_STATUS, &format!("DELETE {}", path))?;
    Ok(())
}
