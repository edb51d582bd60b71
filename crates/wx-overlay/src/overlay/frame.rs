// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame-index lookup for radar and satellite overlays.
//!
//! RainViewer publishes a single JSON document listing the tile-set paths
//! available for each product. The resolver fetches it and picks the latest
//! frame per kind. It never retries; the compositor simply tries again on
//! its next cycle.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use super::kind::FrameKind;
use crate::error::WeatherError;

pub const DEFAULT_FRAME_INDEX_URL: &str = "https://api.rainviewer.com/public/weather-maps.json";

const WHAT: &str = "frame index";

/// One time-indexed tile-set reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverlayFrame {
    pub path: String,
    /// Unix seconds.
    #[serde(rename = "time")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RadarFrames {
    #[serde(default)]
    pub nowcast: Vec<OverlayFrame>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SatelliteFrames {
    #[serde(default)]
    pub infrared: Vec<OverlayFrame>,
}

/// The frame-index document. Missing sections read as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FrameIndex {
    #[serde(default)]
    pub radar: RadarFrames,
    #[serde(default)]
    pub satellite: SatelliteFrames,
}

impl FrameIndex {
    pub fn from_json(body: &str) -> Result<Self, WeatherError> {
        serde_json::from_str(body).map_err(|e| WeatherError::malformed(WHAT, e))
    }

    /// Frames for `kind`, in upstream order.
    #[must_use]
    pub fn frames(&self, kind: FrameKind) -> &[OverlayFrame] {
        match kind {
            FrameKind::Radar => &self.radar.nowcast,
            FrameKind::Satellite => &self.satellite.infrared,
        }
    }

    /// Latest frame for `kind`.
    ///
    /// Upstream lists are ordered oldest to newest and the last entry is taken
    /// as-is. An out-of-order list is logged but not re-sorted.
    pub fn latest(&self, kind: FrameKind) -> Result<OverlayFrame, WeatherError> {
        let frames = self.frames(kind);

        if !frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
            warn!("{} frame list is not ordered by time; using last entry anyway", kind);
        }

        frames
            .last()
            .cloned()
            .ok_or(WeatherError::NoFrameAvailable(kind))
    }
}

/// Anything that can produce the frame-index document.
pub trait FrameIndexSource: Send + Sync + 'static {
    fn fetch_index(&self) -> impl Future<Output = Result<FrameIndex, WeatherError>> + Send;
}

/// Fetches the frame index over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFrameIndexSource {
    http: reqwest::Client,
    url: String,
}

impl HttpFrameIndexSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::fetch(&url, &e))?;
        Ok(Self { http, url })
    }
}

impl FrameIndexSource for HttpFrameIndexSource {
    async fn fetch_index(&self) -> Result<FrameIndex, WeatherError> {
        debug!("Fetching frame index from {}", self.url);

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| WeatherError::fetch(&self.url, &e))?;

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::fetch(&self.url, &e))?;

        FrameIndex::from_json(&body)
    }
}

/// Resolves the most recent usable frame per kind.
///
/// Every error means "not available": the caller skips that kind for the
/// current cycle.
#[derive(Debug)]
pub struct FrameResolver<F> {
    source: F,
}

impl<F: FrameIndexSource> FrameResolver<F> {
    pub fn new(source: F) -> Self {
        Self { source }
    }

    pub async fn resolve_latest(&self, kind: FrameKind) -> Result<OverlayFrame, WeatherError> {
        let index = self.source.fetch_index().await?;
        let frame = index.latest(kind)?;
        debug!("Resolved {} frame {} @ {}", kind, frame.path, frame.timestamp);
        Ok(frame)
    }

    #[must_use]
    pub fn source(&self) -> &F {
        &self.source
    }
}
