//! Forecast fetching, validation and projection.
//!
//! This module provides the Open-Meteo client, the validated payload type and
//! the pure projections used by the forecast pane.

pub mod client;
pub mod codes;
pub mod payload;
pub mod projector;

pub use client::{ForecastClient, DEFAULT_FORECAST_URL};
pub use codes::{compass_point, condition_label, UNKNOWN_CONDITION};
pub use payload::{CurrentSample, DailySeries, ForecastPayload, HourlySeries};
pub use projector::{
    current_conditions, daily_forecast, hourly_forecast, CurrentConditions, DailyForecast,
    Daylight, HourlyForecast, HourlyRecord, FORECAST_DAYS,
};
