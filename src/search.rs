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

//! City search box with debounced lookups.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use wx_overlay::{City, CitySearchClient, WeatherError};

/// Quiet time after the last keystroke before a search is sent
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// What the user asked for this frame
#[derive(Debug, Clone, PartialEq)]
pub enum SearchAction {
    None,
    Select(City),
    MyLocation,
}

#[derive(Debug, Default)]
pub struct SearchBar {
    text: String,
    edited_at: Option<Instant>,
    generation: u64,
    results: Vec<City>,
    in_flight: Option<CancellationToken>,
    error: Option<String>,
}

impl SearchBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[City] {
        &self.results
    }

    pub fn set_text(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        self.edited_at = Some(now);
    }

    /// The query to send once the input has been quiet for [`SEARCH_DEBOUNCE`].
    ///
    /// Too-short input clears the results instead. Each returned query carries
    /// a generation so late answers to older queries can be dropped.
    pub fn due_query(&mut self, now: Instant) -> Option<(u64, String)> {
        let edited_at = self.edited_at?;
        if now.duration_since(edited_at) < SEARCH_DEBOUNCE {
            return None;
        }
        self.edited_at = None;
        self.generation += 1;

        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }

        match CitySearchClient::normalize_query(&self.text) {
            Some(query) => Some((self.generation, query.to_string())),
            None => {
                self.results.clear();
                self.error = None;
                None
            }
        }
    }

    /// Track the task running the latest query.
    pub fn begin(&mut self, token: CancellationToken) {
        if let Some(previous) = self.in_flight.replace(token) {
            previous.cancel();
        }
    }

    /// Apply search results; returns `false` for a superseded query.
    pub fn accept(&mut self, generation: u64, result: Result<Vec<City>, WeatherError>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.in_flight = None;

        match result {
            Ok(cities) => {
                self.error = (cities.is_empty()).then(|| "No matching cities".to_string());
                self.results = cities;
            }
            Err(e) => {
                self.results.clear();
                self.error = Some(format!("Search failed: {e}"));
            }
        }
        true
    }

    fn reset(&mut self) {
        self.text.clear();
        self.edited_at = None;
        self.generation += 1;
        self.results.clear();
        self.error = None;
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }

    pub fn render(&mut self, ui: &mut egui::Ui) -> SearchAction {
        let mut action = SearchAction::None;
        let mut edited = None;

        ui.horizontal(|ui| {
            let mut text = self.text.clone();
            let response = ui.add(
                egui::TextEdit::singleline(&mut text)
                    .hint_text("Search for a city")
                    .desired_width(280.0),
            );
            if response.changed() {
                edited = Some(text);
            }

            if ui.button("My location").clicked() {
                action = SearchAction::MyLocation;
            }

            if self.in_flight.is_some() {
                ui.spinner();
            }
            if let Some(error) = &self.error {
                ui.label(egui::RichText::new(error).color(egui::Color32::from_rgb(220, 120, 100)));
            }
        });

        if let Some(text) = edited {
            self.set_text(text, Instant::now());
        }

        if !self.results().is_empty() {
            ui.horizontal_wrapped(|ui| {
                for city in self.results() {
                    let label = match &city.state {
                        Some(state) => format!("{}, {}", city.display_name(), state),
                        None => city.display_name(),
                    };
                    if ui.button(label).clicked() {
                        action = SearchAction::Select(city.clone());
                    }
                }
            });
        }

        match &action {
            SearchAction::Select(city) => {
                self.reset();
                self.text = city.display_name();
            }
            SearchAction::MyLocation => self.reset(),
            SearchAction::None => {}
        }

        action
    }
}
