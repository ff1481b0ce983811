//! Session handoff between the browser and direct executors
//!
//! After the browser executor clears a login or a challenge, its cookies
//! and identifying headers are captured as a snapshot. The direct executor
//! replays that snapshot so the platform sees one continuous session.
//! The browser side of the bridge hands over a plain snapshot; no browser
//! types cross this boundary.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, COOKIE, ORIGIN,
    REFERER, USER_AGENT,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

/// Body substrings that indicate a login wall
const UNAUTHENTICATED_INDICATORS: &[&str] = &[
    "please log in",
    "sign in required",
    "unauthorized",
    "access denied",
    "session expired",
    "login required",
];

/// Body substrings that indicate an authenticated page
const AUTHENTICATED_INDICATORS: &[&str] = &[
    "dashboard",
    "balance",
    "portfolio",
    "trading",
    "account",
    "logout",
];

/// One cookie as captured from the browser executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CookieRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

/// Captured browser session state, replayable by the direct executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub cookies: Vec<CookieRecord>,
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// URL the browser was on at capture time; becomes the Referer
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
}

/// Compact description of a snapshot, for logs
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub captured_at: DateTime<Utc>,
    pub cookie_count: usize,
    pub live_cookie_count: usize,
    pub has_csrf_token: bool,
    pub has_user_agent: bool,
}

/// Result of probing a transferred session against a live endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SessionValidation {
    pub authenticated: bool,
    pub status_code: u16,
    pub final_url: String,
    pub body_bytes: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self {
            captured_at: Utc::now(),
            cookies: Vec::new(),
            csrf_token: None,
            user_agent: None,
            url: None,
            account_type: None,
        }
    }

    /// Cookies that have not expired
    pub fn live_cookies(&self) -> Vec<&CookieRecord> {
        let now = Utc::now();
        self.cookies.iter().filter(|c| !c.is_expired(now)).collect()
    }

    /// `Cookie` header value built from the live cookies
    pub fn cookie_header(&self) -> Option<HeaderValue> {
        let live = self.live_cookies();
        if live.is_empty() {
            return None;
        }
        let joined = live
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        match HeaderValue::from_str(&joined) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Could not build Cookie header from snapshot: {}", e);
                None
            }
        }
    }

    /// Header map replaying the browser identity on direct requests
    pub fn header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        if let Some(cookie) = self.cookie_header() {
            headers.insert(COOKIE, cookie);
        }

        if let Some(agent) = &self.user_agent {
            insert_header(&mut headers, USER_AGENT, agent);
        }

        if let Some(token) = &self.csrf_token {
            insert_header(&mut headers, HeaderName::from_static("x-csrf-token"), token);
            debug!("CSRF token carried over to direct session");
        }

        if let Some(url) = &self.url {
            insert_header(&mut headers, REFERER, url);
            if let Some(origin) = origin_of(url) {
                insert_header(&mut headers, ORIGIN, &origin);
            }
        }

        headers
    }

    /// HTTP client preloaded with this snapshot's identity
    pub fn build_direct_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .default_headers(self.header_map())
            .build()
            .context("Failed to build direct client from session snapshot")
    }

    /// Persist the snapshot as JSON for later restoration
    pub async fn backup(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write session backup: {}", path.display()))?;
        info!("Session snapshot backed up to {}", path.display());
        Ok(())
    }

    pub async fn restore(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read session backup: {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid session backup: {}", path.display()))?;
        info!(
            "Session snapshot restored from {} ({} cookies)",
            path.display(),
            snapshot.cookies.len()
        );
        Ok(snapshot)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            captured_at: self.captured_at,
            cookie_count: self.cookies.len(),
            live_cookie_count: self.live_cookies().len(),
            has_csrf_token: self.csrf_token.is_some(),
            has_user_agent: self.user_agent.is_some(),
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => debug!("Skipping header {}: {}", name, e),
    }
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{}://{}:{}", parsed.scheme(), host, port)),
        None => Some(format!("{}://{}", parsed.scheme(), host)),
    }
}

/// Heuristic check that a response came back authenticated
pub fn looks_authenticated(status: u16, final_url: &str, body: &str) -> bool {
    if status == 401 {
        return false;
    }
    if final_url.to_lowercase().contains("login") {
        return false;
    }

    let content = body.to_lowercase();
    if UNAUTHENTICATED_INDICATORS.iter().any(|i| content.contains(i)) {
        return false;
    }
    if AUTHENTICATED_INDICATORS.iter().any(|i| content.contains(i)) {
        return true;
    }

    (200..300).contains(&status)
}

/// Probe `test_url` with the snapshot's identity and judge the result
pub async fn validate_session(
    client: &reqwest::Client,
    snapshot: &SessionSnapshot,
    test_url: &str,
) -> anyhow::Result<SessionValidation> {
    let response = client
        .get(test_url)
        .headers(snapshot.header_map())
        .send()
        .await
        .with_context(|| format!("Session validation request failed: {}", test_url))?;

    let status_code = response.status().as_u16();
    let final_url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let authenticated = looks_authenticated(status_code, &final_url, &body);

    if authenticated {
        info!("Session validation successful - authenticated request");
    } else {
        warn!("Session validation failed - not authenticated");
    }

    Ok(SessionValidation {
        authenticated,
        status_code,
        final_url,
        body_bytes: body.len(),
    })
}
