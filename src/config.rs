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

//! Application configuration management.
//!
//! This module handles persistent configuration storage using TOML format.
//! It holds the start location, overlay preferences, refresh intervals and
//! service endpoints. Every field has a serde default so older files load.

use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use wx_overlay::forecast::DEFAULT_FORECAST_URL;
use wx_overlay::overlay::{
    FrameTileOptions, LightningOptions, DEFAULT_FRAME_INDEX_URL, TILE_CACHE_BASE,
};
use wx_overlay::{
    CompositorConfig, Coordinate, OverlayKind, WeatherError, DEFAULT_CITY_SEARCH_URL,
};

const APP_NAME: &str = "skycast-desktop";
const CONFIG_NAME: &str = "config";

/// Environment variable that overrides the configured geocoding key
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Map centre used when no location can be determined
    #[serde(default = "default_latitude")]
    pub default_latitude: f64,

    #[serde(default = "default_longitude")]
    pub default_longitude: f64,

    /// Fixed start location (skips IP geolocation)
    #[serde(default)]
    pub override_latitude: Option<f64>,

    #[serde(default)]
    pub override_longitude: Option<f64>,

    /// Zoom level used when recentring (3 - 14)
    #[serde(default = "default_zoom")]
    pub default_zoom: u8,

    /// Show the lightning overlay
    #[serde(default = "default_true")]
    pub show_lightning: bool,

    /// Show the radar overlay
    #[serde(default = "default_true")]
    pub show_radar: bool,

    /// Show the satellite cloud overlay
    #[serde(default = "default_true")]
    pub show_satellite: bool,

    /// Lightning layer opacity (0.0 - 1.0)
    #[serde(default = "default_lightning_opacity")]
    pub lightning_opacity: f32,

    /// Radar and satellite layer opacity (0.0 - 1.0)
    #[serde(default = "default_frame_opacity")]
    pub frame_opacity: f32,

    /// Seconds between lightning cache-bust refreshes
    #[serde(default = "default_refresh_secs")]
    pub lightning_refresh_secs: u64,

    /// Seconds between radar/satellite frame lookups
    #[serde(default = "default_refresh_secs")]
    pub frame_refresh_secs: u64,

    /// Timeout for every outbound request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// OpenWeatherMap API key for city search (env var takes precedence)
    #[serde(default)]
    pub openweathermap_api_key: Option<String>,

    /// Maximum number of city search results
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    #[serde(default = "default_city_search_url")]
    pub city_search_url: String,

    #[serde(default = "default_frame_index_url")]
    pub frame_index_url: String,

    #[serde(default = "default_tile_cache_base")]
    pub tile_cache_base: String,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1 // Current schema version
}

fn default_latitude() -> f64 {
    12.9716
}

fn default_longitude() -> f64 {
    77.5946
}

fn default_zoom() -> u8 {
    10
}

fn default_true() -> bool {
    true
}

fn default_lightning_opacity() -> f32 {
    0.8
}

fn default_frame_opacity() -> f32 {
    0.6
}

fn default_refresh_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_search_limit() -> u32 {
    5
}

fn default_forecast_url() -> String {
    DEFAULT_FORECAST_URL.to_string()
}

fn default_city_search_url() -> String {
    DEFAULT_CITY_SEARCH_URL.to_string()
}

fn default_frame_index_url() -> String {
    DEFAULT_FRAME_INDEX_URL.to_string()
}

fn default_tile_cache_base() -> String {
    TILE_CACHE_BASE.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            default_latitude: default_latitude(),
            default_longitude: default_longitude(),
            override_latitude: None,
            override_longitude: None,
            default_zoom: default_zoom(),
            show_lightning: true,
            show_radar: true,
            show_satellite: true,
            lightning_opacity: default_lightning_opacity(),
            frame_opacity: default_frame_opacity(),
            lightning_refresh_secs: default_refresh_secs(),
            frame_refresh_secs: default_refresh_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            openweathermap_api_key: None,
            search_limit: default_search_limit(),
            forecast_url: default_forecast_url(),
            city_search_url: default_city_search_url(),
            frame_index_url: default_frame_index_url(),
            tile_cache_base: default_tile_cache_base(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults when unreadable
    pub fn load() -> Self {
        match confy::load::<AppConfig>(APP_NAME, CONFIG_NAME) {
            Ok(config) => {
                if let Ok(path) = Self::get_config_path() {
                    info!("Loaded configuration from {}", path.display());
                }
                config
            }
            Err(e) => {
                warn!("Failed to load configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Configured start coordinate, if both override fields are set and valid
    pub fn override_coordinate(&self) -> Option<Coordinate> {
        let (lat, lon) = self.override_latitude.zip(self.override_longitude)?;
        match Coordinate::try_new(lat, lon) {
            Ok(coordinate) => Some(coordinate),
            Err(e) => {
                warn!("Ignoring configured location: {}", e);
                None
            }
        }
    }

    /// Fallback map centre
    pub fn default_coordinate(&self) -> Result<Coordinate, WeatherError> {
        Coordinate::try_new(self.default_latitude, self.default_longitude).or_else(|e| {
            warn!("Invalid default location ({}), using built-in default", e);
            Coordinate::try_new(default_latitude(), default_longitude())
        })
    }

    /// Resolve API key from environment variable or config
    pub fn resolve_api_key(&self) -> Option<String> {
        Self::resolve_api_key_from(
            std::env::var(API_KEY_ENV).ok(),
            self.openweathermap_api_key.as_deref(),
        )
    }

    fn resolve_api_key_from(env_key: Option<String>, config_key: Option<&str>) -> Option<String> {
        // Check environment variable first
        if let Some(key) = env_key.filter(|k| !k.is_empty()) {
            return Some(key);
        }

        // Fall back to config
        config_key.map(ToString::to_string).filter(|s| !s.is_empty())
    }

    /// Overlay kinds enabled in the config, in paint order
    pub fn enabled_overlays(&self) -> Vec<OverlayKind> {
        OverlayKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                OverlayKind::Lightning => self.show_lightning,
                OverlayKind::Radar => self.show_radar,
                OverlayKind::Satellite => self.show_satellite,
            })
            .collect()
    }

    pub fn to_compositor_config(&self) -> CompositorConfig {
        let frame_opacity = self.frame_opacity.clamp(0.0, 1.0);

        CompositorConfig {
            kinds: self.enabled_overlays(),
            zoom: self.default_zoom,
            lightning_refresh: Duration::from_secs(self.lightning_refresh_secs.max(1)),
            frame_refresh: Duration::from_secs(self.frame_refresh_secs.max(1)),
            tile_cache_base: self.tile_cache_base.clone(),
            radar: FrameTileOptions {
                opacity: frame_opacity,
                ..FrameTileOptions::radar()
            },
            satellite: FrameTileOptions {
                opacity: frame_opacity,
                ..FrameTileOptions::satellite()
            },
            lightning: LightningOptions {
                opacity: self.lightning_opacity.clamp(0.0, 1.0),
                ..LightningOptions::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.default_zoom, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.search_limit, 5);
    }

    #[test]
    fn test_override_requires_both_fields() {
        let mut config = AppConfig {
            override_latitude: Some(51.5),
            ..AppConfig::default()
        };
        assert_eq!(config.override_coordinate(), None);

        config.override_longitude = Some(-0.12);
        assert_eq!(
            config.override_coordinate(),
            Some(Coordinate::try_new(51.5, -0.12).unwrap())
        );

        config.override_latitude = Some(123.0);
        assert_eq!(config.override_coordinate(), None);
    }

    #[test]
    fn test_api_key_precedence() {
        assert_eq!(
            AppConfig::resolve_api_key_from(Some("env".to_string()), Some("cfg")),
            Some("env".to_string())
        );
        assert_eq!(
            AppConfig::resolve_api_key_from(Some(String::new()), Some("cfg")),
            Some("cfg".to_string())
        );
        assert_eq!(AppConfig::resolve_api_key_from(None, Some("")), None);
        assert_eq!(AppConfig::resolve_api_key_from(None, None), None);
    }

    #[test]
    fn test_compositor_config() {
        let config = AppConfig {
            show_satellite: false,
            frame_opacity: 1.7,
            frame_refresh_secs: 0,
            ..AppConfig::default()
        };
        let compositor = config.to_compositor_config();

        assert_eq!(
            compositor.kinds,
            vec![OverlayKind::Lightning, OverlayKind::Radar]
        );
        assert!((compositor.radar.opacity - 1.0).abs() < f32::EPSILON);
        assert!((compositor.lightning.opacity - 0.8).abs() < f32::EPSILON);
        assert_eq!(compositor.frame_refresh, Duration::from_secs(1));
        assert_eq!(compositor.radar.color_scheme, 4);
        assert_eq!(compositor.zoom, 10);
    }
}
