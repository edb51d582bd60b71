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

//! Open-Meteo forecast fetcher.

use std::time::Duration;

use log::{debug, info};

use super::payload::ForecastPayload;
use super::projector::FORECAST_DAYS;
use crate::error::WeatherError;
use crate::geo::Coordinate;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,is_day,precipitation,weathercode,\
windspeed_10m,winddirection_10m,windgusts_10m,rain,showers,snowfall";
const HOURLY_FIELDS: &str = CURRENT_FIELDS;
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,weathercode";

/// Client for the forecast endpoint.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: reqwest::Client,
    base_url: String,
}

impl ForecastClient {
    /// Create a client against `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::fetch(&base_url, &e))?;
        Ok(Self { http, base_url })
    }

    /// Query parameters sent for `coordinate`.
    #[must_use]
    pub fn query(coordinate: Coordinate) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", coordinate.latitude().to_string()),
            ("longitude", coordinate.longitude().to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
            ("timezone", "auto".to_string()),
        ]
    }

    /// Fetch and validate the forecast for `coordinate`.
    pub async fn fetch(&self, coordinate: Coordinate) -> Result<ForecastPayload, WeatherError> {
        info!("Fetching forecast for {}", coordinate);

        let response = self
            .http
            .get(&self.base_url)
            .query(&Self::query(coordinate))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| WeatherError::fetch(&self.base_url, &e))?;

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::fetch(&self.base_url, &e))?;

        let payload = ForecastPayload::from_json(&body)?;
        debug!(
            "Forecast received: {} hours, {} days",
            payload.hour_count(),
            payload.day_count()
        );
        Ok(payload)
    }
}
