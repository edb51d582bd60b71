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

//! City search and IP-based geolocation.

use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::WeatherError;
use crate::geo::Coordinate;

pub const DEFAULT_CITY_SEARCH_URL: &str = "http://api.openweathermap.org/geo/1.0/direct";

/// Lookups tried in order when no coordinate was configured.
pub const IP_LOCATION_URLS: [&str; 2] = ["https://ipapi.co/json/", "http://ip-api.com/json/"];

/// Queries this short (after trimming) are not sent.
pub const MIN_QUERY_CHARS: usize = 3;

/// A city returned by the geocoding search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct City {
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl City {
    pub fn coordinate(&self) -> Result<Coordinate, WeatherError> {
        Coordinate::try_new(self.lat, self.lon)
    }

    /// `"<name> (<country>)"`
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.country)
    }
}

/// Client for the OpenWeatherMap direct geocoding endpoint.
#[derive(Debug, Clone)]
pub struct CitySearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limit: u32,
}

impl CitySearchClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        limit: u32,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::fetch(&base_url, &e))?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            limit,
        })
    }

    /// Trimmed query text, or `None` when it is too short to search for.
    #[must_use]
    pub fn normalize_query(text: &str) -> Option<&str> {
        let text = text.trim();
        (text.chars().count() >= MIN_QUERY_CHARS).then_some(text)
    }

    /// Cities matching `text`. Short queries return no results without a request.
    pub async fn search(&self, text: &str) -> Result<Vec<City>, WeatherError> {
        let Some(query) = Self::normalize_query(text) else {
            return Ok(Vec::new());
        };

        if self.api_key.is_empty() {
            warn!("City search has no API key configured; request will likely be rejected");
        }

        debug!("Searching cities for {:?}", query);

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", query.to_string()),
                ("limit", self.limit.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| WeatherError::fetch(&self.base_url, &e))?;

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::fetch(&self.base_url, &e))?;

        parse_cities(&body)
    }
}

pub(crate) fn parse_cities(body: &str) -> Result<Vec<City>, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::malformed("city search results", e))
}

// ipapi.co uses latitude/longitude, ip-api.com uses lat/lon.
#[derive(Debug, Deserialize)]
struct IpLocation {
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon")]
    longitude: Option<f64>,
    #[serde(default)]
    city: Option<String>,
}

fn parse_ip_location(body: &str) -> Result<(Coordinate, Option<String>), WeatherError> {
    let location: IpLocation =
        serde_json::from_str(body).map_err(|e| WeatherError::malformed("IP location", e))?;

    match (location.latitude, location.longitude) {
        (Some(latitude), Some(longitude)) => {
            Ok((Coordinate::try_new(latitude, longitude)?, location.city))
        }
        _ => Err(WeatherError::malformed(
            "IP location",
            "response has no coordinates",
        )),
    }
}

/// Approximate position of this machine from its public IP address.
#[derive(Debug, Clone)]
pub struct IpLocator {
    http: reqwest::Client,
    urls: Vec<String>,
}

impl IpLocator {
    pub fn new(timeout: Duration) -> Result<Self, WeatherError> {
        Self::with_urls(IP_LOCATION_URLS.iter().map(ToString::to_string), timeout)
    }

    pub fn with_urls(
        urls: impl IntoIterator<Item = String>,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::GeolocationDenied(e.to_string()))?;
        Ok(Self {
            http,
            urls: urls.into_iter().collect(),
        })
    }

    /// Try every lookup service in order; the first usable answer wins.
    pub async fn locate(&self) -> Result<Coordinate, WeatherError> {
        let mut last_error = String::from("no lookup services configured");

        for url in &self.urls {
            match self.lookup(url).await {
                Ok((coordinate, city)) => {
                    info!(
                        "Located at {} ({}) via {}",
                        coordinate,
                        city.as_deref().unwrap_or("unknown city"),
                        url
                    );
                    return Ok(coordinate);
                }
                Err(e) => {
                    warn!("IP location lookup failed: {}", e);
                    last_error = e.to_string();
                }
            }
        }

        Err(WeatherError::GeolocationDenied(last_error))
    }

    async fn lookup(&self, url: &str) -> Result<(Coordinate, Option<String>), WeatherError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| WeatherError::fetch(url, &e))?;

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::fetch(url, &e))?;

        parse_ip_location(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_queries_are_skipped() {
        assert_eq!(CitySearchClient::normalize_query(""), None);
        assert_eq!(CitySearchClient::normalize_query("  ab  "), None);
        assert_eq!(CitySearchClient::normalize_query(" Oslo "), Some("Oslo"));
    }

    #[tokio::test]
    async fn test_short_search_makes_no_request() {
        // Unroutable base URL: a request would fail rather than return Ok.
        let client =
            CitySearchClient::new("http://127.0.0.1:9/", "", 5, Duration::from_millis(50)).unwrap();
        assert_eq!(client.search("ab").await, Ok(Vec::new()));
    }

    #[test]
    fn test_parse_cities() {
        let cities = parse_cities(
            r#"[{"name":"Bengaluru","local_names":{"kn":"ಬೆಂಗಳೂರು"},"lat":12.9767936,
                 "lon":77.590082,"country":"IN","state":"Karnataka"},
                {"name":"Bangalore","lat":40.0,"lon":-80.0,"country":"US"}]"#,
        )
        .unwrap();

        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].display_name(), "Bengaluru (IN)");
        assert_eq!(cities[0].state.as_deref(), Some("Karnataka"));
        assert_eq!(cities[1].state, None);
        assert!((cities[0].coordinate().unwrap().latitude() - 12.976_793_6).abs() < 1e-9);
    }

    #[test]
    fn test_parse_cities_rejects_error_object() {
        let err = parse_cities(r#"{"cod":401,"message":"Invalid API key"}"#).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_ip_location_variants() {
        let (c, city) =
            parse_ip_location(r#"{"ip":"1.2.3.4","city":"Oslo","latitude":59.91,"longitude":10.75}"#)
                .unwrap();
        assert_eq!(c, Coordinate::try_new(59.91, 10.75).unwrap());
        assert_eq!(city.as_deref(), Some("Oslo"));

        let (c, _) =
            parse_ip_location(r#"{"status":"success","lat":35.68,"lon":139.69}"#).unwrap();
        assert_eq!(c, Coordinate::try_new(35.68, 139.69).unwrap());

        let err = parse_ip_location(r#"{"error":true,"reason":"RateLimited"}"#).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { .. }));
    }
}
