//! Assertion helpers for step actions
//!
//! Each helper returns [`Error::Assertion`] so the runner records the step
//! as an expected-vs-actual failure rather than an environment fault.

use std::fmt::Debug;

use crate::common::{Error, Result};
use crate::session::HttpResponse;

/// Fail with `message` unless `condition` holds
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Assertion(message()))
    }
}

/// Fail unless `actual == expected`
pub fn equal<T: PartialEq + Debug>(what: &str, expected: &T, actual: &T) -> Result<()> {
    ensure(expected == actual, || {
        format!("{}: expected {:?}, got {:?}", what, expected, actual)
    })
}

/// Fail unless the response has the expected status
pub fn status(response: &HttpResponse, expected: u16) -> Result<()> {
    ensure(response.status == expected, || {
        format!(
            "expected status {}, got {} ({})",
            expected,
            response.status,
            truncate(&response.body, 120)
        )
    })
}

/// Fail unless `haystack` contains `needle`
pub fn contains(what: &str, haystack: &str, needle: &str) -> Result<()> {
    ensure(haystack.contains(needle), || {
        format!("{}: expected to contain {:?}, got {:?}", what, needle, haystack)
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_reports_both_values() {
        let err = equal("firstname", &"John", &"Jane").unwrap_err();
        assert!(err.is_assertion());
        let msg = err.to_string();
        assert!(msg.contains("\"John\"") && msg.contains("\"Jane\""));
    }

    #[test]
    fn test_status_mismatch() {
        let response = HttpResponse::new(404, "Not Found");
        assert!(status(&response, 404).is_ok());
        assert!(status(&response, 200).unwrap_err().is_assertion());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("ééé", 2), "éé");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
