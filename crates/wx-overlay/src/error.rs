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

//! Error taxonomy shared by the fetchers, the frame resolver and the store.

use thiserror::Error;

use crate::overlay::FrameKind;

/// Errors produced while fetching or interpreting weather data.
///
/// Overlay errors are never fatal: the compositor treats every variant as
/// "skip this overlay kind for this cycle".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    /// Network/transport failure or a non-2xx response.
    #[error("request to {url} failed: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The response parsed but did not match the expected schema.
    #[error("malformed {what}: {reason}")]
    MalformedResponse { what: &'static str, reason: String },

    /// The frame index was valid but the list for this kind was empty.
    #[error("no {0} frame available")]
    NoFrameAvailable(FrameKind),

    /// The user's position could not be determined.
    #[error("location unavailable: {0}")]
    GeolocationDenied(String),

    /// Latitude/longitude outside the valid range.
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

impl WeatherError {
    pub(crate) fn fetch(url: &str, err: &reqwest::Error) -> Self {
        Self::FetchFailed {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn malformed(what: &'static str, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            what,
            reason: reason.to_string(),
        }
    }
}
