//! Booking API payloads
//!
//! Decoding a response into these types doubles as its schema check: a
//! booking missing a required field or carrying a wrong type fails to parse.

use serde::{Deserialize, Serialize};

/// A booking as sent to and returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub firstname: String,
    pub lastname: String,
    pub totalprice: i64,
    pub depositpaid: bool,
    pub bookingdates: BookingDates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additionalneeds: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDates {
    pub checkin: String,
    pub checkout: String,
}

/// Answer to `POST /booking`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedBooking {
    pub bookingid: u64,
    pub booking: Booking,
}

/// Entry of `GET /booking`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookingRef {
    pub bookingid: u64,
}

impl Booking {
    /// The booking the standard suite creates
    pub fn sample() -> Self {
        Self {
            firstname: "John".to_string(),
            lastname: "Doe".to_string(),
            totalprice: 123,
            depositpaid: true,
            bookingdates: BookingDates {
                checkin: "2023-01-01".to_string(),
                checkout: "2023-01-02".to_string(),
            },
            additionalneeds: Some("Breakfast".to_string()),
        }
    }

    /// Names of the fields whose values differ from `other`
    pub fn differences(&self, other: &Booking) -> Vec<&'static str> {
        let mut diff = Vec::new();
        if self.firstname != other.firstname {
            diff.push("firstname");
        }
        if self.lastname != other.lastname {
            diff.push("lastname");
        }
        if self.totalprice != other.totalprice {
            diff.push("totalprice");
        }
        if self.depositpaid != other.depositpaid {
            diff.push("depositpaid");
        }
        if self.bookingdates.checkin != other.bookingdates.checkin {
            diff.push("bookingdates.checkin");
        }
        if self.bookingdates.checkout != other.bookingdates.checkout {
            diff.push("bookingdates.checkout");
        }
        if self.additionalneeds != other.additionalneeds {
            diff.push("additionalneeds");
        }
        diff
    }
}
