//! W3C WebDriver client for an Appium endpoint.
//!
//! Blocking HTTP, one request per driver call. Response bodies follow the
//! W3C shape `{"value": ...}`; error bodies carry `value.error` and
//! `value.message` and are mapped onto [`HarnessError`] variants.

use crate::capabilities::{CapabilityConfig, Platform};
use crate::config::HarnessConfig;
use crate::driver::{AutomationDriver, ElementRef, SessionId, Swipe, WindowSize};
use crate::locator::Locator;
use crate::result::{HarnessError, HarnessResult};
use base64::Engine;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// W3C element identifier key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Legacy JSON Wire Protocol element key, still sent by older drivers
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Remote driver speaking W3C WebDriver over HTTP
#[derive(Debug, Clone)]
pub struct RemoteDriver {
    base_url: String,
    client: reqwest::blocking::Client,
    platform: Platform,
}

impl RemoteDriver {
    /// Create a driver for `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::with_client(endpoint, client)
    }

    /// Create a driver with a custom client
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::blocking::Client) -> Self {
        Self {
            base_url: endpoint.into().trim_end_matches('/').to_string(),
            client,
            platform: Platform::default(),
        }
    }

    /// Create a driver from the harness configuration
    pub fn from_config(config: &HarnessConfig) -> Self {
        let mut driver = Self::new(config.endpoint.clone(), config.timeouts.command());
        driver.platform = config.capabilities.platform();
        driver
    }

    /// Endpoint base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, body: Option<Value>) -> HarnessResult<Value> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "webdriver request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .map_err(|e| HarnessError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| HarnessError::transport(e.to_string()))?;
        parse_response(status, &text)
    }

    fn session_request(
        &self,
        method: Method,
        session: &SessionId,
        path: &str,
        body: Option<Value>,
    ) -> HarnessResult<Value> {
        self.request(method, &format!("/session/{session}{path}"), body)
            .map_err(|e| attach_session(e, session))
    }
}

impl AutomationDriver for RemoteDriver {
    fn open_session(&mut self, capabilities: &CapabilityConfig) -> HarnessResult<SessionId> {
        self.platform = capabilities.platform();
        let value = self.request(Method::POST, "/session", Some(capabilities.to_w3c_payload()))?;
        Ok(new_session_id(&value))
    }

    fn is_valid(&mut self, session: &SessionId) -> bool {
        !session.is_blank()
            && self
                .session_request(Method::GET, session, "/timeouts", None)
                .is_ok()
    }

    fn close_session(&mut self, session: &SessionId) -> HarnessResult<()> {
        let _ = self.session_request(Method::DELETE, session, "", None)?;
        Ok(())
    }

    fn find_element(
        &mut self,
        session: &SessionId,
        locator: &Locator,
    ) -> HarnessResult<ElementRef> {
        let value = self
            .session_request(Method::POST, session, "/element", Some(locator.to_w3c()))
            .map_err(|e| attach_locator(e, locator))?;
        element_ref(&value).ok_or_else(|| HarnessError::Protocol {
            error: "invalid response".to_string(),
            message: format!("no element id in response for {locator}"),
        })
    }

    fn find_elements(
        &mut self,
        session: &SessionId,
        locator: &Locator,
    ) -> HarnessResult<Vec<ElementRef>> {
        let value =
            self.session_request(Method::POST, session, "/elements", Some(locator.to_w3c()))?;
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(element_ref).collect())
            .unwrap_or_default())
    }

    fn is_clickable(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<bool> {
        let base = format!("/element/{}", element.id);
        let displayed = self.session_request(Method::GET, session, &format!("{base}/displayed"), None)?;
        if displayed.as_bool() != Some(true) {
            return Ok(false);
        }
        let enabled = self.session_request(Method::GET, session, &format!("{base}/enabled"), None)?;
        Ok(enabled.as_bool() == Some(true))
    }

    fn click(&mut self, session: &SessionId, element: &ElementRef) -> HarnessResult<()> {
        let path = format!("/element/{}/click", element.id);
        let _ = self.session_request(Method::POST, session, &path, Some(json!({})))?;
        Ok(())
    }

    fn send_text(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        text: &str,
    ) -> HarnessResult<()> {
        let path = format!("/element/{}/value", element.id);
        let _ = self.session_request(Method::POST, session, &path, Some(json!({ "text": text })))?;
        Ok(())
    }

    fn get_attribute(
        &mut self,
        session: &SessionId,
        element: &ElementRef,
        name: &str,
    ) -> HarnessResult<Option<String>> {
        let path = format!("/element/{}/attribute/{name}", element.id);
        let value = self.session_request(Method::GET, session, &path, None)?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    fn screenshot(&mut self, session: &SessionId) -> HarnessResult<Vec<u8>> {
        let value = self.session_request(Method::GET, session, "/screenshot", None)?;
        decode_screenshot(&value)
    }

    fn execute(&mut self, session: &SessionId, script: &str, args: Value) -> HarnessResult<Value> {
        let body = json!({ "script": script, "args": [args] });
        self.session_request(Method::POST, session, "/execute/sync", Some(body))
    }

    fn terminate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()> {
        let key = self.platform.app_management_key();
        let body = json!({ key: app_id });
        let _ = self.session_request(
            Method::POST,
            session,
            "/appium/device/terminate_app",
            Some(body),
        )?;
        Ok(())
    }

    fn activate_app(&mut self, session: &SessionId, app_id: &str) -> HarnessResult<()> {
        let key = self.platform.app_management_key();
        let body = json!({ key: app_id });
        let _ = self.session_request(
            Method::POST,
            session,
            "/appium/device/activate_app",
            Some(body),
        )?;
        Ok(())
    }

    fn window_size(&mut self, session: &SessionId) -> HarnessResult<WindowSize> {
        let value = self.session_request(Method::GET, session, "/window/rect", None)?;
        window_size(&value)
    }

    fn swipe(&mut self, session: &SessionId, swipe: &Swipe) -> HarnessResult<()> {
        let _ = self.session_request(Method::POST, session, "/actions", Some(swipe.to_w3c_actions()))?;
        Ok(())
    }
}

/// Unwrap a W3C response body, mapping error payloads to typed errors
pub fn parse_response(status: u16, body: &str) -> HarnessResult<Value> {
    let mut parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if (200..300).contains(&status) && body.trim().is_empty() => return Ok(Value::Null),
        Err(_) => {
            return Err(HarnessError::Protocol {
                error: format!("http {status}"),
                message: body.chars().take(200).collect(),
            })
        }
    };
    let value = parsed.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(map_w3c_error(code, message));
    }
    if !(200..300).contains(&status) {
        return Err(HarnessError::Protocol {
            error: format!("http {status}"),
            message: value.to_string(),
        });
    }
    Ok(value)
}

/// Map a W3C error code onto the harness taxonomy
#[must_use]
pub fn map_w3c_error(code: &str, message: &str) -> HarnessError {
    match code {
        "no such element" => HarnessError::NoSuchElement {
            locator: message.to_string(),
        },
        "invalid session id" => HarnessError::SessionInvalid {
            session_id: message.to_string(),
        },
        _ => HarnessError::Protocol {
            error: code.to_string(),
            message: message.to_string(),
        },
    }
}

/// Element reference from a W3C element object
#[must_use]
pub fn element_ref(value: &Value) -> Option<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(ElementRef::new)
}

/// Session id from a new-session response; blank when missing
#[must_use]
pub fn new_session_id(value: &Value) -> SessionId {
    SessionId::new(
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    )
}

/// Decode the base64 PNG of a screenshot response
pub fn decode_screenshot(value: &Value) -> HarnessResult<Vec<u8>> {
    let encoded = value.as_str().ok_or_else(|| HarnessError::Capture {
        message: "screenshot response is not a string".to_string(),
    })?;
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| HarnessError::Capture {
            message: format!("invalid base64 screenshot: {e}"),
        })
}

fn window_size(value: &Value) -> HarnessResult<WindowSize> {
    let dim = |key: &str| value.get(key).and_then(Value::as_f64);
    match (dim("width"), dim("height")) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => {
            Ok(WindowSize::new(w.round() as u32, h.round() as u32))
        }
        _ => Err(HarnessError::Protocol {
            error: "invalid response".to_string(),
            message: format!("bad window rect {value}"),
        }),
    }
}

fn attach_session(err: HarnessError, session: &SessionId) -> HarnessError {
    match err {
        HarnessError::SessionInvalid { .. } => HarnessError::SessionInvalid {
            session_id: session.to_string(),
        },
        other => other,
    }
}

fn attach_locator(err: HarnessError, locator: &Locator) -> HarnessError {
    match err {
        HarnessError::NoSuchElement { .. } => HarnessError::NoSuchElement {
            locator: locator.to_string(),
        },
        other => other,
    }
}
