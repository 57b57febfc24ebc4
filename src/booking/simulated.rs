//! In-process stand-in for the restful-booker API
//!
//! Mirrors the observable contract of the real service, quirks included:
//! bad credentials get HTTP 200 with `{"reason":"Bad credentials"}`, the
//! health check and a delete answer 201, writes to a missing booking answer
//! 405. Transport faults can be queued to exercise the retrier.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::types::Booking;
use crate::common::{Error, FaultKind, Result};
use crate::session::{HttpRequest, HttpResponse, HttpTransport, Method};

const BASE_URL: &str = "sim://restful-booker";

#[derive(Default)]
struct State {
    bookings: BTreeMap<u64, Booking>,
    next_id: u64,
    tokens: Vec<String>,
    token_counter: u64,
    faults: VecDeque<FaultKind>,
    requests: Vec<HttpRequest>,
    last_status: Option<u16>,
}

/// Simulated booking API
pub struct SimulatedBookingApi {
    username: String,
    password: String,
    state: Mutex<State>,
}

impl Default for SimulatedBookingApi {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBookingApi {
    /// A fresh API accepting the public demo credentials
    pub fn new() -> Self {
        Self::with_credentials("admin", "password123")
    }

    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `count` requests with a transport fault of `kind`
    pub fn inject_faults(&self, kind: FaultKind, count: usize) {
        let mut state = self.state();
        state.faults.extend(std::iter::repeat(kind).take(count));
    }

    /// Requests received so far, faulted ones included
    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.state().requests.last().cloned()
    }

    /// Status of the last answered request
    pub fn last_status(&self) -> Option<u16> {
        self.state().last_status
    }

    pub fn booking_count(&self) -> usize {
        self.state().bookings.len()
    }

    fn authorized(state: &State, request: &HttpRequest) -> bool {
        let from_cookie = request.header("cookie").and_then(|cookie| {
            cookie
                .split(';')
                .map(str::trim)
                .find_map(|pair| pair.strip_prefix("token="))
        });
        let from_bearer = request
            .header("authorization")
            .and_then(|value| value.strip_prefix("Bearer "));

        from_cookie
            .or(from_bearer)
            .map(|token| state.tokens.iter().any(|t| t == token))
            .unwrap_or(false)
    }

    fn route(&self, state: &mut State, request: &HttpRequest) -> HttpResponse {
        let path = request.path.trim_end_matches('/');
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["ping"]) => HttpResponse::new(201, "Created"),
            (Method::Post, ["auth"]) => self.auth(state, request),
            (Method::Get, ["booking"]) => {
                let ids: Vec<Value> = state
                    .bookings
                    .keys()
                    .map(|id| json!({ "bookingid": id }))
                    .collect();
                HttpResponse::json_body(200, &Value::Array(ids))
            }
            (Method::Post, ["booking"]) => match parse_booking(request.body.as_ref()) {
                Some(booking) => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.bookings.insert(id, booking.clone());
                    HttpResponse::json_body(200, &json!({ "bookingid": id, "booking": booking }))
                }
                None => HttpResponse::new(500, "Internal Server Error"),
            },
            (method, ["booking", id]) => match id.parse::<u64>() {
                Ok(id) => Self::booking_by_id(state, method, id, request),
                Err(_) => HttpResponse::new(404, "Not Found"),
            },
            _ => HttpResponse::new(404, "Not Found"),
        }
    }

    fn auth(&self, state: &mut State, request: &HttpRequest) -> HttpResponse {
        let body = request.body.as_ref();
        let field = |name: &str| body.and_then(|b| b.get(name)).and_then(Value::as_str);

        if field("username") == Some(self.username.as_str())
            && field("password") == Some(self.password.as_str())
        {
            state.token_counter += 1;
            let token = format!("{:015x}", 0xabc0_0000_u64 + state.token_counter);
            state.tokens.push(token.clone());
            HttpResponse::json_body(200, &json!({ "token": token }))
        } else {
            HttpResponse::json_body(200, &json!({ "reason": "Bad credentials" }))
        }
    }

    fn booking_by_id(
        state: &mut State,
        method: Method,
        id: u64,
        request: &HttpRequest,
    ) -> HttpResponse {
        if method == Method::Get {
            return match state.bookings.get(&id) {
                Some(booking) => HttpResponse::json_body(200, &json!(booking)),
                None => HttpResponse::new(404, "Not Found"),
            };
        }

        if !Self::authorized(state, request) {
            return HttpResponse::new(403, "Forbidden");
        }
        let Some(existing) = state.bookings.get(&id).cloned() else {
            return HttpResponse::new(405, "Method Not Allowed");
        };

        match method {
            Method::Put => match parse_booking(request.body.as_ref()) {
                Some(booking) => {
                    state.bookings.insert(id, booking.clone());
                    HttpResponse::json_body(200, &json!(booking))
                }
                None => HttpResponse::new(400, "Bad Request"),
            },
            Method::Patch => {
                let mut merged = json!(existing);
                if let (Some(target), Some(Value::Object(fields))) =
                    (merged.as_object_mut(), request.body.as_ref())
                {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
                match serde_json::from_value::<Booking>(merged) {
                    Ok(booking) => {
                        state.bookings.insert(id, booking.clone());
                        HttpResponse::json_body(200, &json!(booking))
                    }
                    Err(_) => HttpResponse::new(400, "Bad Request"),
                }
            }
            Method::Delete => {
                state.bookings.remove(&id);
                HttpResponse::new(201, "Created")
            }
            Method::Get | Method::Post => HttpResponse::new(404, "Not Found"),
        }
    }
}

/// A booking body must decode and name its guest
fn parse_booking(body: Option<&Value>) -> Option<Booking> {
    body.and_then(|b| serde_json::from_value::<Booking>(b.clone()).ok())
        .filter(|booking| !booking.firstname.is_empty() && !booking.lastname.is_empty())
}

#[async_trait]
impl HttpTransport for SimulatedBookingApi {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state();
        state.requests.push(request.clone());

        if let Some(kind) = state.faults.pop_front() {
            return Err(Error::transport(
                kind,
                format!("simulated fault on {}", request.describe()),
            ));
        }

        let response = self.route(&mut state, request);
        state.last_status = Some(response.status);
        Ok(response)
    }
}
