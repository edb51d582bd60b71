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

//! WMO weather interpretation codes and compass helpers.

/// Label used for any code missing from the table.
pub const UNKNOWN_CONDITION: &str = "Unknown";

const COMPASS_POINTS: [&str; 9] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW", "N"];

/// Map a WMO weather code to a human-readable label.
///
/// Never fails: unmapped or missing codes yield [`UNKNOWN_CONDITION`].
#[must_use]
pub fn condition_label(code: Option<i32>) -> &'static str {
    match code {
        Some(0) => "Clear sky",
        Some(1) => "Mainly clear",
        Some(2) => "Partly cloudy",
        Some(3) => "Overcast",
        Some(45) => "Fog",
        Some(48) => "Depositing rime fog",
        Some(51) => "Drizzle (light)",
        Some(53) => "Drizzle (moderate)",
        Some(55) => "Drizzle (dense)",
        Some(56) => "Freezing drizzle (light)",
        Some(57) => "Freezing drizzle (dense)",
        Some(61) => "Rain (slight)",
        Some(63) => "Rain (moderate)",
        Some(65) => "Rain (heavy)",
        Some(66) => "Freezing rain (light)",
        Some(67) => "Freezing rain (heavy)",
        Some(71) => "Snow (slight)",
        Some(73) => "Snow (moderate)",
        Some(75) => "Snow (heavy)",
        Some(77) => "Snow grains",
        Some(80) => "Rain showers (slight)",
        Some(81) => "Rain showers (moderate)",
        Some(82) => "Rain showers (violent)",
        Some(85) => "Snow showers (slight)",
        Some(86) => "Snow showers (heavy)",
        Some(95) => "Thunderstorm (moderate)",
        Some(96) => "Thunderstorm (with slight hail)",
        Some(99) => "Thunderstorm (with heavy hail)",
        _ => UNKNOWN_CONDITION,
    }
}

/// Convert a wind bearing in degrees to one of eight compass points.
#[must_use]
pub fn compass_point(degrees: f64) -> Option<&'static str> {
    if !degrees.is_finite() {
        return None;
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "normalised bearing / 45 is in 0.0..=8.0"
    )]
    let index = (degrees.rem_euclid(360.0) / 45.0).round() as usize;
    COMPASS_POINTS.get(index).copied()
}
