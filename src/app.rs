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

//! The desktop application: wires the store, the overlay compositor and the
//! widgets together.

use std::time::{Duration, Instant};

use log::{info, warn};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wx_overlay::{
    City, CitySearchClient, Coordinate, ForecastClient, ForecastSnapshot, HttpFrameIndexSource,
    IpLocator, OverlayCompositor, StoreBinding, WeatherDataStore, WeatherError,
};

use crate::config::AppConfig;
use crate::forecast_pane::ForecastPane;
use crate::map::{MapView, SharedMapSurface};
use crate::search::{SearchAction, SearchBar};

type Compositor = OverlayCompositor<SharedMapSurface, HttpFrameIndexSource>;

/// Where the first forecast comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartLocation {
    Fixed(Coordinate),
    Geolocate,
    /// Geolocation disabled; wait for a city search.
    Manual,
}

impl StartLocation {
    /// Command line first, then the configured override, then IP lookup.
    pub fn resolve(cli: Option<Coordinate>, config: &AppConfig, geolocate: bool) -> Self {
        if let Some(coordinate) = cli.or_else(|| config.override_coordinate()) {
            Self::Fixed(coordinate)
        } else if geolocate {
            Self::Geolocate
        } else {
            Self::Manual
        }
    }
}

/// Results delivered from background tasks to the UI thread
#[derive(Debug)]
enum AppEvent {
    Located(Coordinate),
    LocationFailed(WeatherError),
    ForecastFailed(WeatherError),
    SearchResults {
        generation: u64,
        result: Result<Vec<City>, WeatherError>,
    },
}

pub struct WeatherApp {
    runtime: Runtime,
    store: WeatherDataStore,
    compositor: Compositor,
    _binding: StoreBinding,
    surface: SharedMapSurface,
    map: MapView,
    forecast: ForecastPane,
    search: SearchBar,
    forecast_client: ForecastClient,
    city_client: CitySearchClient,
    locator: IpLocator,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    egui_ctx: egui::Context,
    location: Option<Coordinate>,
    status: Option<String>,
}

impl std::fmt::Debug for WeatherApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherApp")
            .field("location", &self.location)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl WeatherApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Runtime,
        config: &AppConfig,
        start: StartLocation,
    ) -> Result<Self, WeatherError> {
        let timeout = config.request_timeout();
        let egui_ctx = cc.egui_ctx.clone();

        let store = WeatherDataStore::new();
        let surface = SharedMapSurface::new(egui_ctx.clone());
        let compositor = OverlayCompositor::new(
            surface.clone(),
            HttpFrameIndexSource::new(&config.frame_index_url, timeout)?,
            config.to_compositor_config(),
        );

        // Binding and timers spawn onto the runtime
        let binding = {
            let _guard = runtime.enter();
            let binding = compositor.bind(&store);
            compositor.start();
            binding
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skycast-desktop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeatherError::FetchFailed {
                url: "map tiles".to_string(),
                reason: e.to_string(),
            })?;

        let api_key = config.resolve_api_key().unwrap_or_default();
        if api_key.is_empty() {
            warn!("No OpenWeatherMap API key configured; city search will fail");
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let center = match start {
            StartLocation::Fixed(coordinate) => coordinate,
            StartLocation::Geolocate | StartLocation::Manual => config.default_coordinate()?,
        };

        let mut app = Self {
            map: MapView::new(center, config.default_zoom, http, runtime.handle().clone()),
            forecast: ForecastPane::new(store.subscribe()),
            search: SearchBar::new(),
            forecast_client: ForecastClient::new(&config.forecast_url, timeout)?,
            city_client: CitySearchClient::new(
                &config.city_search_url,
                api_key,
                config.search_limit,
                timeout,
            )?,
            locator: IpLocator::new(timeout)?,
            runtime,
            store,
            compositor,
            _binding: binding,
            surface,
            events_tx,
            events_rx,
            egui_ctx,
            location: None,
            status: None,
        };

        match start {
            StartLocation::Fixed(coordinate) => app.load_forecast(coordinate, None),
            StartLocation::Geolocate => app.geolocate(),
            StartLocation::Manual => {
                app.status = Some("Search for a city to load the forecast".to_string());
            }
        }

        Ok(app)
    }

    fn send(tx: &mpsc::UnboundedSender<AppEvent>, ctx: &egui::Context, event: AppEvent) {
        // The receiver only closes when the app is shutting down
        if tx.send(event).is_ok() {
            ctx.request_repaint();
        }
    }

    fn geolocate(&mut self) {
        self.status = Some("Locating...".to_string());
        let locator = self.locator.clone();
        let tx = self.events_tx.clone();
        let ctx = self.egui_ctx.clone();

        self.runtime.spawn(async move {
            let event = match locator.locate().await {
                Ok(coordinate) => AppEvent::Located(coordinate),
                Err(e) => AppEvent::LocationFailed(e),
            };
            Self::send(&tx, &ctx, event);
        });
    }

    /// Fetch the forecast for `coordinate` and publish it to the store.
    fn load_forecast(&mut self, coordinate: Coordinate, place: Option<String>) {
        info!("Loading forecast for {}", place.as_deref().unwrap_or("selected location"));
        self.location = Some(coordinate);
        self.forecast.set_place(place);
        self.status = Some("Loading forecast...".to_string());

        let client = self.forecast_client.clone();
        let store = self.store.clone();
        let tx = self.events_tx.clone();
        let ctx = self.egui_ctx.clone();

        self.runtime.spawn(async move {
            match client.fetch(coordinate).await {
                Ok(payload) => {
                    store.publish(ForecastSnapshot::new(coordinate, payload));
                    ctx.request_repaint();
                }
                Err(e) => Self::send(&tx, &ctx, AppEvent::ForecastFailed(e)),
            }
        });
    }

    fn start_search(&mut self, generation: u64, query: String) {
        let token = CancellationToken::new();
        self.search.begin(token.clone());

        let client = self.city_client.clone();
        let tx = self.events_tx.clone();
        let ctx = self.egui_ctx.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                result = client.search(&query) => {
                    Self::send(&tx, &ctx, AppEvent::SearchResults { generation, result });
                }
            }
        });
    }

    fn handle_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::Located(coordinate) => self.load_forecast(coordinate, None),
                AppEvent::LocationFailed(e) => {
                    warn!("{}", e);
                    self.status = Some(format!("{e}. Search for a city instead."));
                }
                AppEvent::ForecastFailed(e) => {
                    warn!("Forecast fetch failed: {}", e);
                    self.status = Some(format!("Forecast unavailable: {e}"));
                }
                AppEvent::SearchResults { generation, result } => {
                    self.search.accept(generation, result);
                }
            }
        }
    }

    fn render_layer_control(&mut self, ctx: &egui::Context) {
        let state = self.surface.snapshot();
        if state.control.entries.is_empty() {
            return;
        }

        egui::Window::new("Layers")
            .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
            .resizable(false)
            .collapsible(true)
            .frame(
                egui::Frame::window(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(25, 30, 35, 220))
                    .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(60, 80, 100)))
                    .corner_radius(6.0),
            )
            .show(ctx, |ui| {
                for entry in &state.control.entries {
                    let mut visible = self.map.is_visible(entry.kind);
                    if ui.checkbox(&mut visible, entry.label).changed() {
                        self.map.set_visible(entry.kind, visible);
                    }
                }
            });
    }
}

impl eframe::App for WeatherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_events();
        self.forecast.poll();

        let now = Instant::now();
        if let Some((generation, query)) = self.search.due_query(now) {
            self.start_search(generation, query);
        }

        let state = self.surface.snapshot();
        self.map.sync(&state);
        if self.status.as_deref() == Some("Loading forecast...") && self.store.latest().is_some() {
            self.status = None;
        }

        egui::TopBottomPanel::top("search_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            match self.search.render(ui) {
                SearchAction::Select(city) => match city.coordinate() {
                    Ok(coordinate) => self.load_forecast(coordinate, Some(city.display_name())),
                    Err(e) => self.status = Some(e.to_string()),
                },
                SearchAction::MyLocation => self.geolocate(),
                SearchAction::None => {}
            }
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status_line").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let text = self
                    .status
                    .as_deref()
                    .or_else(|| self.map.tile_status())
                    .unwrap_or("Ready");
                ui.label(egui::RichText::new(text).size(11.0));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let kinds: Vec<String> = self
                        .compositor
                        .current_kinds()
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    ui.label(
                        egui::RichText::new(format!("Overlays: {}", kinds.join(", "))).size(11.0),
                    );
                });
            });
        });

        egui::SidePanel::right("forecast_pane")
            .default_width(360.0)
            .resizable(true)
            .show(ctx, |ui| self.forecast.render(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.map.show(ui, self.location));

        self.render_layer_control(ctx);

        // Keep the debounce and the hourly list ticking without input
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

impl Drop for WeatherApp {
    fn drop(&mut self) {
        self.compositor.stop();
    }
}
