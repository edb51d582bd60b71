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

//! Weather data and live map overlays for SkyCast.
//!
//! The library has no UI dependency. It is split into layers that can be used
//! on their own:
//!
//! - **Store**: [`WeatherDataStore`] holds the latest forecast snapshot and
//!   notifies subscribers
//! - **Forecast**: Open-Meteo client, validated payload and pure projections
//!   for display
//! - **Overlays**: frame-index lookup and the [`OverlayCompositor`], which keeps
//!   lightning, radar and satellite layers fresh on any [`MapSurface`]
//! - **Geocoding**: city search and IP-based location
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use wx_overlay::{
//!     Coordinate, CompositorConfig, ForecastClient, ForecastSnapshot, HttpFrameIndexSource,
//!     OverlayCompositor, WeatherDataStore, DEFAULT_FORECAST_URL, DEFAULT_FRAME_INDEX_URL,
//! };
//! # use wx_overlay::{LayerControl, LayerHandle, MapSurface, OverlayDescriptor};
//! # struct NullSurface(u64);
//! # impl MapSurface for NullSurface {
//! #     fn set_view(&mut self, _: Coordinate, _: u8) {}
//! #     fn add_layer(&mut self, _: &OverlayDescriptor) -> LayerHandle { self.0 += 1; LayerHandle::new(self.0) }
//! #     fn remove_layer(&mut self, _: LayerHandle) {}
//! #     fn add_control(&mut self, _: LayerControl) {}
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wx_overlay::WeatherError> {
//!     let timeout = Duration::from_secs(10);
//!     let store = WeatherDataStore::new();
//!
//!     let compositor = OverlayCompositor::new(
//!         NullSurface(0),
//!         HttpFrameIndexSource::new(DEFAULT_FRAME_INDEX_URL, timeout)?,
//!         CompositorConfig::default(),
//!     );
//!     let _binding = compositor.bind(&store);
//!     compositor.start();
//!
//!     let here = Coordinate::try_new(12.9716, 77.5946)?;
//!     let payload = ForecastClient::new(DEFAULT_FORECAST_URL, timeout)?.fetch(here).await?;
//!     store.publish(ForecastSnapshot::new(here, payload));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod forecast;
pub mod geo;
pub mod geocode;
pub mod overlay;
pub mod store;

pub use error::WeatherError;
pub use forecast::{
    current_conditions, daily_forecast, hourly_forecast, ForecastClient, ForecastPayload,
    DEFAULT_FORECAST_URL,
};
pub use geo::Coordinate;
pub use geocode::{City, CitySearchClient, IpLocator, DEFAULT_CITY_SEARCH_URL};
pub use overlay::{
    CompositorConfig, CycleOutcome, FrameIndex, FrameIndexSource, FrameKind, HttpFrameIndexSource,
    LayerControl, LayerControlEntry, LayerHandle, MapSurface, OverlayCompositor, OverlayDescriptor,
    OverlayFrame, OverlayKind, OverlayPhase, StoreBinding, DEFAULT_FRAME_INDEX_URL,
};
pub use store::{ForecastSnapshot, StoreSubscription, WeatherDataStore};
