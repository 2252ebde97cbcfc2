//! Event tracking. Every send is raced against a short timer so a slow or
//! dead analytics endpoint can delay a navigation but never cancel it.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::utils;

pub const DEFAULT_WAIT: Duration = Duration::from_millis(2000);
pub const MEASUREMENT_PROTOCOL_ENDPOINT: &str = "https://www.google-analytics.com/mp/collect";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl AnalyticsEvent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Adds the parameter only when a value is present.
    pub fn param_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },

    #[error("analytics endpoint returned status {status}")]
    Status { status: u16 },

    #[error("failed to build analytics client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Records events in the log only.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        info!(event = %event.name, params = ?event.params, "analytics event");
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeasurementCredentials {
    pub measurement_id: String,
    pub api_secret: String,
    pub debug: bool,
}

/// Server-side delivery through the GA4 Measurement Protocol. Without
/// credentials every send resolves immediately.
#[derive(Clone, Debug)]
pub struct MeasurementProtocolSink {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<MeasurementCredentials>,
}

#[derive(Serialize)]
struct CollectBody<'a> {
    client_id: String,
    events: [&'a AnalyticsEvent; 1],
}

impl MeasurementProtocolSink {
    pub fn new(
        credentials: Option<MeasurementCredentials>,
        timeout: Duration,
    ) -> Result<Self, AnalyticsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AnalyticsError::ClientBuild { source })?;
        Ok(Self {
            client,
            endpoint: MEASUREMENT_PROTOCOL_ENDPOINT.to_string(),
            credentials,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Two random integers joined by a dot, the shape GA expects.
pub fn random_client_id() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "{}.{}",
        rng.gen_range(0..1_000_000_000u32),
        rng.gen_range(0..1_000_000_000u32)
    )
}

#[async_trait]
impl EventSink for MeasurementProtocolSink {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        let Some(creds) = &self.credentials else {
            debug!(event = %event.name, "measurement protocol not configured");
            return Ok(());
        };
        let mut event = event.clone();
        if creds.debug {
            event.params.insert("debug_mode".to_string(), "1".to_string());
        }
        let body = CollectBody {
            client_id: random_client_id(),
            events: [&event],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("measurement_id", creds.measurement_id.as_str()),
                ("api_secret", creds.api_secret.as_str()),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|source| AnalyticsError::Request { source })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AnalyticsError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackOutcome {
    Delivered,
    Failed,
    TimedOut,
}

/// Sends `event` and waits at most `wait`. Never fails: errors and
/// timeouts are logged and reported through the outcome.
pub async fn track_event<S>(sink: &S, event: &AnalyticsEvent, wait: Duration) -> TrackOutcome
where
    S: EventSink + ?Sized,
{
    match utils::race_timeout(sink.send(event), wait).await {
        Some(Ok(())) => TrackOutcome::Delivered,
        Some(Err(e)) => {
            warn!(event = %event.name, error = %e, "analytics delivery failed");
            TrackOutcome::Failed
        }
        None => {
            debug!(event = %event.name, wait_ms = wait.as_millis() as u64, "analytics wait elapsed");
            TrackOutcome::TimedOut
        }
    }
}

/// Sends several events concurrently; outcomes keep the input order.
pub async fn track_all<S>(sink: &S, events: &[AnalyticsEvent], wait: Duration) -> Vec<TrackOutcome>
where
    S: EventSink + ?Sized,
{
    futures::future::join_all(events.iter().map(|e| track_event(sink, e, wait))).await
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub meta: bool,
    pub middle_button: bool,
}

impl Modifiers {
    /// The browser opens the link elsewhere and we must not redirect.
    pub fn opens_elsewhere(&self) -> bool {
        self.ctrl || self.shift || self.meta || self.middle_button
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "follow_up", content = "url", rename_all = "snake_case")]
pub enum FollowUp {
    /// The browser already handled the click.
    BrowserDefault,
    Navigate(String),
    Nothing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackedClick {
    pub outcome: TrackOutcome,
    pub follow_up: FollowUp,
}

/// A tracked outbound click: track first, then navigate, whatever the
/// analytics outcome.
pub async fn tracked_click<S>(
    sink: &S,
    event: &AnalyticsEvent,
    href: Option<&str>,
    modifiers: Modifiers,
    wait: Duration,
) -> TrackedClick
where
    S: EventSink + ?Sized,
{
    let outcome = track_event(sink, event, wait).await;
    let follow_up = if modifiers.opens_elsewhere() {
        FollowUp::BrowserDefault
    } else {
        match href.filter(|h| !h.is_empty()) {
            Some(h) => FollowUp::Navigate(h.to_string()),
            None => FollowUp::Nothing,
        }
    };
    TrackedClick { outcome, follow_up }
}

pub fn plan_link_click(
    link_url: &str,
    link_text: &str,
    council_slug: Option<&str>,
    plan_id: Option<&str>,
) -> AnalyticsEvent {
    let extension = link_url.rsplit('.').next().unwrap_or_default();
    let file_name = link_url.rsplit('/').next().unwrap_or_default();
    AnalyticsEvent::new("plan_link_click")
        .param("file_extension", format!(".{extension}"))
        .param("file_name", file_name)
        .param("link_url", link_url)
        .param("link_text", link_text)
        .param_opt("council_slug", council_slug)
        .param_opt("plan_id", plan_id)
}

/// Link text falls back to the image source for image-only links.
pub fn nzlh_landing_page_click(
    href: Option<&str>,
    text: &str,
    image_src: Option<&str>,
) -> AnalyticsEvent {
    let text = utils::collapse_whitespace(text);
    let link_text = if text.is_empty() {
        image_src.map(str::to_string)
    } else {
        Some(text)
    };
    AnalyticsEvent::new("nzlh_landing_page_click")
        .param_opt("link_text", link_text.as_deref())
        .param_opt("destination", href)
}

pub fn survey_response(question: &str, answer_label: &str) -> AnalyticsEvent {
    AnalyticsEvent::new("survey_response")
        .param("survey_question", question)
        .param("survey_answer", answer_label.trim())
}

pub fn content_navbar_switch(section: &str) -> AnalyticsEvent {
    AnalyticsEvent::new("content_navbar_switch").param("content_navbar", section)
}
