use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::utils;

pub const DECLINED_TEXT: &str = "You declined location sharing.";
pub const NOT_FOUND_TEXT: &str = "Your location could not be found.";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeolocateOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
}

impl Default for GeolocateOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_millis(10_000),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GeolocateError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    Unavailable,

    #[error("timed out acquiring position")]
    Timeout,
}

impl GeolocateError {
    /// Inline text that replaces the locate link.
    pub fn alert_text(&self) -> &'static str {
        match self {
            Self::PermissionDenied => DECLINED_TEXT,
            Self::Unavailable | Self::Timeout => NOT_FOUND_TEXT,
        }
    }
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self, options: &GeolocateOptions) -> Result<Position, GeolocateError>;
}

/// Answers with a preset result; stands in for a device in the CLI.
#[derive(Clone, Debug)]
pub struct FixedGeolocator {
    result: Result<Position, GeolocateError>,
}

impl FixedGeolocator {
    pub fn at(longitude: f64, latitude: f64) -> Self {
        Self {
            result: Ok(Position {
                longitude,
                latitude,
            }),
        }
    }

    pub fn failing(err: GeolocateError) -> Self {
        Self { result: Err(err) }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self, _options: &GeolocateOptions) -> Result<Position, GeolocateError> {
        self.result.clone()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum GeolocateOutcome {
    /// No geolocation capability; the locate control stays hidden.
    Hidden,
    Navigate(String),
    Alert(&'static str),
}

/// Lookup URL for a position: coordinates go in the query string with six
/// decimal places, longitude first.
pub fn location_url(href: &str, position: Position) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("lon", &format!("{:.6}", position.longitude))
        .append_pair("lat", &format!("{:.6}", position.latitude))
        .finish();
    format!("{href}?{query}")
}

pub async fn locate(
    href: &str,
    geolocator: Option<&dyn Geolocator>,
    options: &GeolocateOptions,
) -> GeolocateOutcome {
    let Some(geolocator) = geolocator else {
        debug!("geolocation unavailable, hiding control");
        return GeolocateOutcome::Hidden;
    };
    let result = utils::race_timeout(geolocator.current_position(options), options.timeout)
        .await
        .unwrap_or(Err(GeolocateError::Timeout));
    match result {
        Ok(position) => {
            let url = location_url(href, position);
            info!(url = %url, "located user");
            GeolocateOutcome::Navigate(url)
        }
        Err(e) => {
            info!(error = %e, "geolocation failed");
            GeolocateOutcome::Alert(e.alert_text())
        }
    }
}
