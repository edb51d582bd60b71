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

//! Typed Open-Meteo forecast payload.
//!
//! The wire format uses parallel arrays indexed by `time`. Raw structures are
//! deserialized first and then validated into [`ForecastPayload`], so a ragged
//! column or an unparseable timestamp surfaces as
//! [`WeatherError::MalformedResponse`] instead of a silently missing value.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::WeatherError;

const WHAT: &str = "forecast payload";
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

// ============================================================================
// Open-Meteo wire structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawForecast {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    utc_offset_seconds: i32,
    #[serde(default)]
    timezone: Option<String>,
    current: RawCurrent,
    hourly: RawHourly,
    daily: RawDaily,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    time: String,
    #[serde(default)]
    temperature_2m: Option<f64>,
    #[serde(default)]
    relative_humidity_2m: Option<f64>,
    #[serde(default)]
    is_day: Option<u8>,
    #[serde(default)]
    precipitation: Option<f64>,
    #[serde(default)]
    weathercode: Option<i32>,
    #[serde(default)]
    windspeed_10m: Option<f64>,
    #[serde(default)]
    winddirection_10m: Option<f64>,
    #[serde(default)]
    windgusts_10m: Option<f64>,
    #[serde(default)]
    rain: Option<f64>,
    #[serde(default)]
    showers: Option<f64>,
    #[serde(default)]
    snowfall: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    weathercode: Vec<Option<i32>>,
    windspeed_10m: Vec<Option<f64>>,
    windgusts_10m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct RawDaily {
    time: Vec<String>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    weathercode: Vec<Option<i32>>,
}

// ============================================================================
// Validated payload
// ============================================================================

/// Conditions at the time of the request.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSample {
    pub time: DateTime<FixedOffset>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub is_day: Option<bool>,
    pub precipitation: Option<f64>,
    pub weather_code: Option<i32>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_gusts: Option<f64>,
    pub rain: Option<f64>,
    pub showers: Option<f64>,
    pub snowfall: Option<f64>,
}

/// Hourly columns; every vector has the same length as `time`.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    pub time: Vec<DateTime<FixedOffset>>,
    pub temperature: Vec<Option<f64>>,
    pub humidity: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub weather_code: Vec<Option<i32>>,
    pub wind_speed: Vec<Option<f64>>,
    pub wind_gusts: Vec<Option<f64>>,
}

/// Daily columns; every vector has the same length as `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub date: Vec<NaiveDate>,
    pub temperature_max: Vec<Option<f64>>,
    pub temperature_min: Vec<Option<f64>>,
    pub precipitation_sum: Vec<Option<f64>>,
    pub weather_code: Vec<Option<i32>>,
}

/// A validated forecast response.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPayload {
    /// Grid-snapped latitude reported by the API.
    pub latitude: f64,
    /// Grid-snapped longitude reported by the API.
    pub longitude: f64,
    pub utc_offset: FixedOffset,
    pub timezone: Option<String>,
    pub current: CurrentSample,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
}

impl ForecastPayload {
    /// Parse and validate a JSON response body.
    pub fn from_json(body: &str) -> Result<Self, WeatherError> {
        let raw: RawForecast =
            serde_json::from_str(body).map_err(|e| WeatherError::malformed(WHAT, e))?;
        Self::try_from(raw)
    }

    /// Number of hourly samples.
    #[must_use]
    pub fn hour_count(&self) -> usize {
        self.hourly.time.len()
    }

    /// Number of daily samples.
    #[must_use]
    pub fn day_count(&self) -> usize {
        self.daily.date.len()
    }
}

impl TryFrom<RawForecast> for ForecastPayload {
    type Error = WeatherError;

    fn try_from(raw: RawForecast) -> Result<Self, Self::Error> {
        let utc_offset = FixedOffset::east_opt(raw.utc_offset_seconds).ok_or_else(|| {
            WeatherError::malformed(
                WHAT,
                format!("utc_offset_seconds {} out of range", raw.utc_offset_seconds),
            )
        })?;

        let current = CurrentSample {
            time: parse_local_time(&raw.current.time, utc_offset)?,
            temperature: raw.current.temperature_2m,
            humidity: raw.current.relative_humidity_2m,
            is_day: raw.current.is_day.map(|flag| flag != 0),
            precipitation: raw.current.precipitation,
            weather_code: raw.current.weathercode,
            wind_speed: raw.current.windspeed_10m,
            wind_direction: raw.current.winddirection_10m,
            wind_gusts: raw.current.windgusts_10m,
            rain: raw.current.rain,
            showers: raw.current.showers,
            snowfall: raw.current.snowfall,
        };

        let hours = raw.hourly.time.len();
        check_column("hourly.temperature_2m", raw.hourly.temperature_2m.len(), hours)?;
        check_column("hourly.relative_humidity_2m", raw.hourly.relative_humidity_2m.len(), hours)?;
        check_column("hourly.precipitation", raw.hourly.precipitation.len(), hours)?;
        check_column("hourly.weathercode", raw.hourly.weathercode.len(), hours)?;
        check_column("hourly.windspeed_10m", raw.hourly.windspeed_10m.len(), hours)?;
        check_column("hourly.windgusts_10m", raw.hourly.windgusts_10m.len(), hours)?;

        let hourly = HourlySeries {
            time: raw
                .hourly
                .time
                .iter()
                .map(|t| parse_local_time(t, utc_offset))
                .collect::<Result<_, _>>()?,
            temperature: raw.hourly.temperature_2m,
            humidity: raw.hourly.relative_humidity_2m,
            precipitation: raw.hourly.precipitation,
            weather_code: raw.hourly.weathercode,
            wind_speed: raw.hourly.windspeed_10m,
            wind_gusts: raw.hourly.windgusts_10m,
        };

        let days = raw.daily.time.len();
        check_column("daily.temperature_2m_max", raw.daily.temperature_2m_max.len(), days)?;
        check_column("daily.temperature_2m_min", raw.daily.temperature_2m_min.len(), days)?;
        check_column("daily.precipitation_sum", raw.daily.precipitation_sum.len(), days)?;
        check_column("daily.weathercode", raw.daily.weathercode.len(), days)?;

        let daily = DailySeries {
            date: raw
                .daily
                .time
                .iter()
                .map(|d| parse_date(d))
                .collect::<Result<_, _>>()?,
            temperature_max: raw.daily.temperature_2m_max,
            temperature_min: raw.daily.temperature_2m_min,
            precipitation_sum: raw.daily.precipitation_sum,
            weather_code: raw.daily.weathercode,
        };

        Ok(Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            utc_offset,
            timezone: raw.timezone,
            current,
            hourly,
            daily,
        })
    }
}

fn check_column(name: &str, len: usize, expected: usize) -> Result<(), WeatherError> {
    if len == expected {
        Ok(())
    } else {
        Err(WeatherError::malformed(
            WHAT,
            format!("{name} has {len} entries, expected {expected}"),
        ))
    }
}

fn parse_local_time(value: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>, WeatherError> {
    NaiveDateTime::parse_from_str(value, LOCAL_TIME_FORMAT)
        .ok()
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .ok_or_else(|| WeatherError::malformed(WHAT, format!("bad timestamp {value:?}")))
}

fn parse_date(value: &str) -> Result<NaiveDate, WeatherError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| WeatherError::malformed(WHAT, format!("bad date {value:?}: {e}")))
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Two hourly samples, three days, UTC+05:30.
    pub const SAMPLE: &str = r#"{
        "latitude": 12.97,
        "longitude": 77.59,
        "utc_offset_seconds": 19800,
        "timezone": "Asia/Kolkata",
        "current": {
            "time": "2025-03-26T12:00",
            "temperature_2m": 31.2,
            "relative_humidity_2m": 40,
            "is_day": 1,
            "precipitation": 0.0,
            "weathercode": 2,
            "windspeed_10m": 11.5,
            "winddirection_10m": 95,
            "windgusts_10m": 22.0,
            "rain": 0.0,
            "showers": 0.0,
            "snowfall": 0.0
        },
        "hourly": {
            "time": ["2025-03-26T11:00", "2025-03-26T12:00", "2025-03-26T13:00"],
            "temperature_2m": [30.1, 31.2, null],
            "relative_humidity_2m": [42, 40, 39],
            "precipitation": [0.0, 0.0, 0.1],
            "weathercode": [1, 2, 999],
            "windspeed_10m": [10.0, 11.5, 12.0],
            "windgusts_10m": [20.0, 22.0, 25.0]
        },
        "daily": {
            "time": ["2025-03-26", "2025-03-27", "2025-03-28"],
            "temperature_2m_max": [33.0, 34.1, 32.5],
            "temperature_2m_min": [21.0, 21.4, 20.9],
            "precipitation_sum": [0.0, 1.2, 4.5],
            "weathercode": [2, 61, 95]
        }
    }"#;
}
