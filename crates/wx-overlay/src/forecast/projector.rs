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

//! Pure projections from a [`ForecastPayload`] into view models.

use std::fmt;
use std::iter::FusedIterator;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use super::codes::{compass_point, condition_label};
use super::payload::ForecastPayload;

/// Maximum number of daily records produced.
pub const FORECAST_DAYS: usize = 14;

const DAILY_LABEL_FORMAT: &str = "%a, %d %b";
const HOURLY_LABEL_FORMAT: &str = "%d %b, %I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daylight {
    Day,
    Night,
}

impl fmt::Display for Daylight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Daylight::Day => write!(f, "Day"),
            Daylight::Night => write!(f, "Night"),
        }
    }
}

/// Current conditions panel.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub observed_at: DateTime<FixedOffset>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub daylight: Option<Daylight>,
    pub precipitation: Option<f64>,
    pub condition: &'static str,
    pub wind_speed: Option<f64>,
    /// Compass point, e.g. `"NE"`.
    pub wind_direction: Option<&'static str>,
    pub wind_gusts: Option<f64>,
    pub rain: Option<f64>,
    pub showers: Option<f64>,
    pub snowfall: Option<f64>,
}

/// One row of the daily table.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    /// Formatted like `Wed, 27 Mar`.
    pub label: String,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub precipitation: Option<f64>,
    pub condition: &'static str,
}

/// One row of the hourly table.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRecord {
    pub time: DateTime<FixedOffset>,
    /// Formatted like `26 Mar, 12:00 PM`.
    pub label: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub condition: &'static str,
    pub wind_speed: Option<f64>,
    pub wind_gusts: Option<f64>,
}

#[must_use]
pub fn current_conditions(payload: &ForecastPayload) -> CurrentConditions {
    let current = &payload.current;
    CurrentConditions {
        observed_at: current.time,
        temperature: current.temperature,
        humidity: current.humidity,
        daylight: current
            .is_day
            .map(|day| if day { Daylight::Day } else { Daylight::Night }),
        precipitation: current.precipitation,
        condition: condition_label(current.weather_code),
        wind_speed: current.wind_speed,
        wind_direction: current.wind_direction.and_then(compass_point),
        wind_gusts: current.wind_gusts,
        rain: current.rain,
        showers: current.showers,
        snowfall: current.snowfall,
    }
}

/// Value at `i` in a column; a short column reads as missing.
fn column<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

/// Daily records in payload order, capped at [`FORECAST_DAYS`].
#[must_use]
pub fn daily_forecast(payload: &ForecastPayload) -> Vec<DailyForecast> {
    let daily = &payload.daily;
    daily
        .date
        .iter()
        .enumerate()
        .take(FORECAST_DAYS)
        .map(|(i, date)| DailyForecast {
            date: *date,
            label: date.format(DAILY_LABEL_FORMAT).to_string(),
            max_temp: column(&daily.temperature_max, i),
            min_temp: column(&daily.temperature_min, i),
            precipitation: column(&daily.precipitation_sum, i),
            condition: condition_label(column(&daily.weather_code, i)),
        })
        .collect()
}

/// Hourly records at or after `now`.
///
/// The returned iterator is lazy and can be cloned or [`restart`](HourlyForecast::restart)ed
/// to walk the same payload again.
#[must_use]
pub fn hourly_forecast(payload: &ForecastPayload, now: DateTime<Utc>) -> HourlyForecast<'_> {
    HourlyForecast {
        payload,
        now: now.with_timezone(&payload.utc_offset),
        index: 0,
    }
}

/// Iterator returned by [`hourly_forecast`].
#[derive(Debug, Clone)]
pub struct HourlyForecast<'a> {
    payload: &'a ForecastPayload,
    now: DateTime<FixedOffset>,
    index: usize,
}

impl HourlyForecast<'_> {
    /// Rewind to the first hour.
    pub fn restart(&mut self) {
        self.index = 0;
    }

    fn record(&self, i: usize) -> HourlyRecord {
        let hourly = &self.payload.hourly;
        let time = hourly.time[i];
        HourlyRecord {
            time,
            label: time.format(HOURLY_LABEL_FORMAT).to_string(),
            temperature: column(&hourly.temperature, i),
            humidity: column(&hourly.humidity, i),
            precipitation: column(&hourly.precipitation, i),
            condition: condition_label(column(&hourly.weather_code, i)),
            wind_speed: column(&hourly.wind_speed, i),
            wind_gusts: column(&hourly.wind_gusts, i),
        }
    }
}

impl Iterator for HourlyForecast<'_> {
    type Item = HourlyRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let times = &self.payload.hourly.time;
        while self.index < times.len() {
            let i = self.index;
            self.index += 1;
            if times[i] >= self.now {
                return Some(self.record(i));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.payload.hourly.time.len().saturating_sub(self.index);
        (0, Some(remaining))
    }
}

impl FusedIterator for HourlyForecast<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::payload::fixtures::SAMPLE;
    use chrono::TimeZone;

    fn payload() -> ForecastPayload {
        ForecastPayload::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn test_current_conditions() {
        let now = current_conditions(&payload());
        assert_eq!(now.temperature, Some(31.2));
        assert_eq!(now.daylight, Some(Daylight::Day));
        assert_eq!(now.condition, "Partly cloudy");
        assert_eq!(now.wind_direction, Some("E"));
    }

    #[test]
    fn test_daily_labels_and_codes() {
        let days = daily_forecast(&payload());
        assert_eq!(days.len(), 3);
        assert_eq!(days[1].label, "Thu, 27 Mar");
        assert_eq!(days[1].condition, "Rain (slight)");
        assert_eq!(days[2].precipitation, Some(4.5));
    }

    #[test]
    fn test_daily_capped_at_fourteen() {
        let mut p = payload();
        let first = p.daily.date[0];
        p.daily.date = (0..20).map(|d| first + chrono::Days::new(d)).collect();
        p.daily.temperature_max = vec![None; 20];
        p.daily.temperature_min = vec![None; 20];
        p.daily.precipitation_sum = vec![None; 20];
        p.daily.weather_code = vec![None; 20];
        assert_eq!(daily_forecast(&p).len(), FORECAST_DAYS);
    }

    #[test]
    fn test_ragged_columns_read_as_missing() {
        let mut p = payload();
        let last = *p.daily.date.last().unwrap();
        p.daily.date.push(last + chrono::Days::new(1));
        p.hourly.time.push(*p.hourly.time.last().unwrap() + chrono::Duration::hours(1));
        p.hourly.temperature.clear();

        let days = daily_forecast(&p);
        assert_eq!(days.len(), 4);
        assert_eq!(days[3].max_temp, None);
        assert_eq!(days[3].condition, "Unknown");

        let now = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let hours: Vec<_> = hourly_forecast(&p, now).collect();
        assert_eq!(hours.len(), p.hourly.time.len());
        assert!(hours.iter().all(|h| h.temperature.is_none()));
        assert_eq!(hours.last().unwrap().condition, "Unknown");
    }

    #[test]
    fn test_hourly_skips_past_entries() {
        let p = payload();
        // 12:00 local (+05:30) is 06:30 UTC
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 6, 30, 0).unwrap();
        let hours: Vec<_> = hourly_forecast(&p, now).collect();
        assert_eq!(hours.len(), 2);
        assert_eq!(hours[0].label, "26 Mar, 12:00 PM");
        assert_eq!(hours[1].temperature, None);
        assert_eq!(hours[1].condition, "Unknown");
    }

    #[test]
    fn test_hourly_restartable() {
        let p = payload();
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 7, 0, 0).unwrap();
        let mut hours = hourly_forecast(&p, now);
        let first: Vec<_> = hours.by_ref().collect();
        assert_eq!(first.len(), 1);
        assert!(hours.next().is_none());

        hours.restart();
        let again: Vec<_> = hours.collect();
        assert_eq!(first, again);
    }

    #[test]
    fn test_hourly_all_past_is_empty() {
        let p = payload();
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(hourly_forecast(&p, now).count(), 0);
    }
}
