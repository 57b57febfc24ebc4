//! W3C WebDriver client
//!
//! Speaks the JSON wire protocol of a WebDriver server such as chromedriver
//! over an [`HttpTransport`]. Every answer wraps its payload in `{"value": ..}`;
//! failures carry `{"value": {"error": .., "message": ..}}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{Element, Locator, UiDriver};
use crate::common::config::UiConfig;
use crate::common::{Error, Result};
use crate::session::{HttpRequest, HttpTransport, Method, ReqwestTransport};

/// Key under which WebDriver returns element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f0a8d1b0d3a";

/// Per-command timeout for the WebDriver server itself
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const CLEAR_STORAGE_SCRIPT: &str =
    "window.localStorage.clear(); window.sessionStorage.clear();";

/// Chrome arguments for an isolated, non-interactive browser
const CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--incognito",
    "--disable-extensions",
    "--window-size=1920,1080",
];

/// A live WebDriver browser session
pub struct WebDriverClient {
    transport: Arc<dyn HttpTransport>,
    session_id: Option<String>,
}

impl WebDriverClient {
    /// Start a browser session on the configured WebDriver server
    pub async fn connect(config: &UiConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.webdriver_url.clone(), COMMAND_TIMEOUT)?;
        Self::start(Arc::new(transport), config.headless).await
    }

    /// Start a browser session over an existing transport
    pub async fn start(transport: Arc<dyn HttpTransport>, headless: bool) -> Result<Self> {
        let mut args: Vec<&str> = CHROME_ARGS.to_vec();
        if headless {
            args.insert(0, "--headless=new");
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let mut client = Self {
            transport,
            session_id: None,
        };
        let value = client
            .send(Method::Post, "/session".to_string(), Some(capabilities))
            .await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::WebDriver("new session answer has no sessionId".to_string()))?
            .to_string();

        info!(session = %session_id, server = client.transport.base_url(), "Browser session started");
        client.session_id = Some(session_id);
        Ok(client)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn session_path(&self, suffix: &str) -> Result<String> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| Error::WebDriver("browser session is closed".to_string()))?;
        Ok(format!("/session/{}{}", id, suffix))
    }

    fn element_path(&self, element: &Element, suffix: &str) -> Result<String> {
        self.session_path(&format!("/element/{}{}", element.0, suffix))
    }

    /// Send one command and unwrap its `value`
    async fn send(&self, method: Method, path: String, body: Option<Value>) -> Result<Value> {
        let mut request = HttpRequest::new(method, path);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        debug!("WebDriver {}", request.describe());

        let response = self.transport.send(&request).await?;
        let mut payload: Value = response.json().map_err(|_| {
            Error::WebDriver(format!(
                "{} answered {} with a non-JSON body",
                request.describe(),
                response.status
            ))
        })?;
        let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if response.is_success() {
            return Ok(value);
        }

        let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        Err(protocol_error(code, message))
    }

    async fn command(&self, method: Method, suffix: &str, body: Option<Value>) -> Result<Value> {
        let path = self.session_path(suffix)?;
        self.send(method, path, body).await
    }

    async fn locate(&self, path: String, locator: &Locator) -> Result<Element> {
        let value = self
            .send(Method::Post, path, Some(selector(locator)))
            .await
            .map_err(|e| not_found_as(e, locator))?;
        element_ref(&value)
    }
}

fn selector(locator: &Locator) -> Value {
    json!({ "using": "css selector", "value": locator.to_css() })
}

fn element_ref(value: &Value) -> Result<Element> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| Element(id.to_string()))
        .ok_or_else(|| Error::WebDriver(format!("not an element reference: {}", value)))
}

fn protocol_error(code: &str, message: &str) -> Error {
    match code {
        "no such element" => Error::ElementNotFound(message.to_string()),
        _ => Error::WebDriver(format!("{}: {}", code, message)),
    }
}

/// Report a missing element by the locator rather than the server's message
fn not_found_as(error: Error, locator: &Locator) -> Error {
    match error {
        Error::ElementNotFound(_) => Error::ElementNotFound(locator.to_string()),
        other => other,
    }
}

#[async_trait]
impl UiDriver for WebDriverClient {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.command(Method::Post, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        let value = self.command(Method::Get, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::WebDriver(format!("unexpected URL value: {}", value)))
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Element> {
        let path = self.session_path("/element")?;
        self.locate(path, locator).await
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>> {
        let value = self
            .command(Method::Post, "/elements", Some(selector(locator)))
            .await?;
        value
            .as_array()
            .ok_or_else(|| Error::WebDriver(format!("unexpected elements value: {}", value)))?
            .iter()
            .map(element_ref)
            .collect()
    }

    async fn find_child(&mut self, parent: &Element, locator: &Locator) -> Result<Element> {
        let path = self.element_path(parent, "/element")?;
        self.locate(path, locator).await
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        let path = self.element_path(element, "/click")?;
        self.send(Method::Post, path, Some(json!({}))).await?;
        Ok(())
    }

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<()> {
        let path = self.element_path(element, "/value")?;
        self.send(Method::Post, path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn text(&mut self, element: &Element) -> Result<String> {
        let path = self.element_path(element, "/text")?;
        let value = self.send(Method::Get, path, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_displayed(&mut self, element: &Element) -> Result<bool> {
        let path = self.element_path(element, "/displayed")?;
        let value = self.send(Method::Get, path, None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn clear_cookies(&mut self) -> Result<()> {
        self.command(Method::Delete, "/cookie", None).await?;
        Ok(())
    }

    async fn clear_storage(&mut self) -> Result<()> {
        let script = json!({ "script": CLEAR_STORAGE_SCRIPT, "args": [] });
        self.command(Method::Post, "/execute/sync", Some(script))
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let result = self.command(Method::Delete, "", None).await;
        if let Some(id) = self.session_id.take() {
            info!(session = %id, "Browser session closed");
        }
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::HttpResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers commands from a queue and records what was sent
    #[derive(Default)]
    struct ScriptedServer {
        answers: Mutex<VecDeque<HttpResponse>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedServer {
        fn answer(&self, status: u16, value: Value) {
            self.answers
                .lock()
                .unwrap()
                .push_back(HttpResponse::json_body(status, &json!({ "value": value })));
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedServer {
        fn base_url(&self) -> &str {
            "http://webdriver.test"
        }

        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(self
                .answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| HttpResponse::json_body(200, &json!({ "value": null }))))
        }
    }

    async fn started(server: &Arc<ScriptedServer>) -> WebDriverClient {
        server.answer(200, json!({ "sessionId": "abc", "capabilities": {} }));
        WebDriverClient::start(server.clone(), true).await.unwrap()
    }

    #[tokio::test]
    async fn test_new_session_requests_headless_chrome() {
        let server = Arc::new(ScriptedServer::default());
        let client = started(&server).await;

        assert_eq!(client.session_id(), Some("abc"));
        let request = &server.sent()[0];
        assert_eq!(request.path, "/session");
        let args = &request.body.as_ref().unwrap()["capabilities"]["alwaysMatch"]
            ["goog:chromeOptions"]["args"];
        assert_eq!(args[0], "--headless=new");
        assert!(args.as_array().unwrap().contains(&json!("--incognito")));
    }

    #[tokio::test]
    async fn test_find_element_sends_css_selector() {
        let server = Arc::new(ScriptedServer::default());
        let mut client = started(&server).await;
        server.answer(200, json!({ ELEMENT_KEY: "el-1" }));

        let element = client.find_element(&Locator::id("login-button")).await.unwrap();

        assert_eq!(element, Element("el-1".into()));
        let request = server.sent().pop().unwrap();
        assert_eq!(request.path, "/session/abc/element");
        assert_eq!(request.body.unwrap()["value"], "#login-button");
    }

    #[tokio::test]
    async fn test_no_such_element_maps_to_not_found() {
        let server = Arc::new(ScriptedServer::default());
        let mut client = started(&server).await;
        server.answer(
            404,
            json!({ "error": "no such element", "message": "Unable to locate element" }),
        );

        let err = client.find_element(&Locator::css(".missing")).await.unwrap_err();
        match err {
            Error::ElementNotFound(what) => assert!(what.contains(".missing")),
            other => panic!("Expected ElementNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_protocol_errors_are_driver_faults() {
        let server = Arc::new(ScriptedServer::default());
        let mut client = started(&server).await;
        server.answer(
            500,
            json!({ "error": "unknown error", "message": "chrome not reachable" }),
        );

        let err = client.navigate("https://www.saucedemo.com/").await.unwrap_err();
        assert!(matches!(err, Error::WebDriver(ref m) if m.contains("chrome not reachable")));
    }

    #[tokio::test]
    async fn test_clear_storage_runs_script() {
        let server = Arc::new(ScriptedServer::default());
        let mut client = started(&server).await;

        client.clear_storage().await.unwrap();

        let request = server.sent().pop().unwrap();
        assert_eq!(request.path, "/session/abc/execute/sync");
        let script = request.body.unwrap()["script"].as_str().unwrap().to_string();
        assert!(script.contains("localStorage.clear()"));
        assert!(script.contains("sessionStorage.clear()"));
    }

    #[tokio::test]
    async fn test_close_deletes_session_once() {
        let server = Arc::new(ScriptedServer::default());
        let mut client = started(&server).await;

        client.close().await.unwrap();
        client.close().await.unwrap();

        let sent = server.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].method, Method::Delete);
        assert_eq!(sent[1].path, "/session/abc");
        assert!(client.navigate("about:blank").await.is_err());
    }
}
