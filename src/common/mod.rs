//! Common utilities shared by the suites and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::Config;
pub use error::{Error, FaultKind, Result};

/// Join a base URL and a request path without doubling or dropping slashes
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://x.test/", "/ping"), "https://x.test/ping");
        assert_eq!(join_url("https://x.test", "booking/1"), "https://x.test/booking/1");
        assert_eq!(join_url("https://x.test/", ""), "https://x.test");
    }
}
