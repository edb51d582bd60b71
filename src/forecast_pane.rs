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

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use wx_overlay::forecast::{
    current_conditions, daily_forecast, hourly_forecast, CurrentConditions, DailyForecast,
    HourlyRecord,
};
use wx_overlay::{ForecastSnapshot, StoreSubscription};

const HOURLY_ROWS: usize = 24;
const HOURLY_RECOMPUTE: Duration = Duration::from_secs(60);

const HEADER_COLOR: egui::Color32 = egui::Color32::from_rgb(100, 180, 220);
const MUTED_COLOR: egui::Color32 = egui::Color32::from_rgb(150, 160, 170);

/// Format an optional measurement, `-` when missing
fn value(v: Option<f64>, unit: &str) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.1}{unit}"))
}

struct Projected {
    snapshot: Arc<ForecastSnapshot>,
    current: CurrentConditions,
    daily: Vec<DailyForecast>,
    hourly: Vec<HourlyRecord>,
    hourly_at: Instant,
}

impl Projected {
    fn new(snapshot: Arc<ForecastSnapshot>) -> Self {
        let current = current_conditions(&snapshot.payload);
        let daily = daily_forecast(&snapshot.payload);
        let hourly = hourly_forecast(&snapshot.payload, Utc::now())
            .take(HOURLY_ROWS)
            .collect();

        Self {
            snapshot,
            current,
            daily,
            hourly,
            hourly_at: Instant::now(),
        }
    }

    fn refresh_hourly(&mut self) {
        if self.hourly_at.elapsed() >= HOURLY_RECOMPUTE {
            self.hourly = hourly_forecast(&self.snapshot.payload, Utc::now())
                .take(HOURLY_ROWS)
                .collect();
            self.hourly_at = Instant::now();
        }
    }
}

/// Side panel with current conditions, the daily outlook and the next hours.
pub struct ForecastPane {
    subscription: StoreSubscription,
    projected: Option<Projected>,
    place: Option<String>,
}

impl std::fmt::Debug for ForecastPane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastPane")
            .field("place", &self.place)
            .field("loaded", &self.projected.is_some())
            .finish_non_exhaustive()
    }
}

impl ForecastPane {
    pub fn new(subscription: StoreSubscription) -> Self {
        Self {
            subscription,
            projected: None,
            place: None,
        }
    }

    /// Label shown above the current conditions
    pub fn set_place(&mut self, place: Option<String>) {
        self.place = place;
    }

    /// Pick up a newly published forecast, if any.
    pub fn poll(&mut self) {
        if let Some(snapshot) = self.subscription.poll() {
            self.projected = Some(Projected::new(snapshot));
        } else if let Some(projected) = &mut self.projected {
            projected.refresh_hourly();
        }
    }

    pub fn render(&mut self, ui: &mut egui::Ui) {
        let Some(projected) = &self.projected else {
            ui.add_space(20.0);
            ui.label(egui::RichText::new("Waiting for forecast...").color(MUTED_COLOR));
            return;
        };

        egui::ScrollArea::vertical().show(ui, |ui| {
            let title = self
                .place
                .clone()
                .unwrap_or_else(|| projected.snapshot.coordinate.to_string());
            ui.label(egui::RichText::new(title).size(16.0).strong());
            ui.label(
                egui::RichText::new(format!(
                    "Updated {}",
                    projected
                        .snapshot
                        .fetched_at
                        .with_timezone(&projected.snapshot.payload.utc_offset)
                        .format("%d %b, %I:%M %p")
                ))
                .color(MUTED_COLOR)
                .size(11.0),
            );
            ui.add_space(8.0);

            Self::render_current(ui, &projected.current);
            ui.separator();
            Self::render_daily(ui, &projected.daily);
            ui.separator();
            Self::render_hourly(ui, &projected.hourly);
        });
    }

    fn section(ui: &mut egui::Ui, title: &str) {
        ui.label(
            egui::RichText::new(title)
                .color(HEADER_COLOR)
                .size(12.0)
                .strong(),
        );
    }

    fn render_current(ui: &mut egui::Ui, current: &CurrentConditions) {
        Self::section(ui, "CURRENT");

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(value(current.temperature, "°C")).size(28.0));
            ui.vertical(|ui| {
                ui.label(current.condition);
                if let Some(daylight) = current.daylight {
                    ui.label(egui::RichText::new(daylight.to_string()).color(MUTED_COLOR));
                }
            });
        });

        egui::Grid::new("current_conditions")
            .num_columns(2)
            .spacing([12.0, 2.0])
            .show(ui, |ui| {
                let wind = match current.wind_direction {
                    Some(dir) => format!("{} {}", value(current.wind_speed, " km/h"), dir),
                    None => value(current.wind_speed, " km/h"),
                };
                let rows = [
                    ("Humidity", value(current.humidity, "%")),
                    ("Wind", wind),
                    ("Gusts", value(current.wind_gusts, " km/h")),
                    ("Precipitation", value(current.precipitation, " mm")),
                    ("Rain", value(current.rain, " mm")),
                    ("Showers", value(current.showers, " mm")),
                    ("Snowfall", value(current.snowfall, " cm")),
                ];
                for (label, text) in rows {
                    ui.label(egui::RichText::new(label).color(MUTED_COLOR));
                    ui.label(text);
                    ui.end_row();
                }
            });
    }

    fn render_daily(ui: &mut egui::Ui, daily: &[DailyForecast]) {
        Self::section(ui, &format!("{}-DAY FORECAST", daily.len()));

        egui::Grid::new("daily_forecast")
            .striped(true)
            .num_columns(4)
            .show(ui, |ui| {
                for day in daily {
                    ui.label(day.label.as_str());
                    ui.label(day.condition);
                    ui.label(format!(
                        "{} / {}",
                        value(day.max_temp, "°"),
                        value(day.min_temp, "°")
                    ));
                    ui.label(value(day.precipitation, " mm"));
                    ui.end_row();
                }
            });
    }

    fn render_hourly(ui: &mut egui::Ui, hourly: &[HourlyRecord]) {
        Self::section(ui, "NEXT 24 HOURS");

        if hourly.is_empty() {
            ui.label(egui::RichText::new("No upcoming hours in this forecast").color(MUTED_COLOR));
            return;
        }

        egui::Grid::new("hourly_forecast")
            .striped(true)
            .num_columns(5)
            .show(ui, |ui| {
                for hour in hourly {
                    ui.label(hour.label.as_str());
                    ui.label(hour.condition);
                    ui.label(value(hour.temperature, "°C"));
                    ui.label(value(hour.humidity, "%"));
                    ui.label(value(hour.wind_speed, " km/h"));
                    ui.end_row();
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_formatting() {
        assert_eq!(value(Some(31.24), "°C"), "31.2°C");
        assert_eq!(value(Some(0.0), " mm"), "0.0 mm");
        assert_eq!(value(None, "%"), "-");
    }
}
