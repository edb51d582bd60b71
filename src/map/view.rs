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

//! Interactive map widget: base tiles, overlay layers, pan and zoom.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use tokio::runtime::Handle;
use walkers::sources::TileSource;
use wx_overlay::{Coordinate, LayerHandle, OverlayKind};

use super::sources::{OsmTileSource, OverlayTileSource};
use super::surface::MapState;
use super::tiles::{visible_tiles, TileManager, WebMercator, TILE_SIZE};

const MIN_ZOOM: f32 = 3.0;
const MAX_ZOOM: f32 = 18.0;

struct OverlayLayer {
    kind: OverlayKind,
    z_index: i64,
    opacity: f32,
    tiles: TileManager<OverlayTileSource>,
}

pub struct MapView {
    pub center_lat: f64,
    pub center_lon: f64,
    /// Float for smoother pinch-zoom
    pub zoom: f32,
    seen_revision: u64,
    base: TileManager<OsmTileSource>,
    overlays: BTreeMap<LayerHandle, OverlayLayer>,
    hidden: BTreeSet<OverlayKind>,
    http: reqwest::Client,
    runtime: Handle,
    tile_status: Option<String>,
}

impl std::fmt::Debug for MapView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("center_lat", &self.center_lat)
            .field("center_lon", &self.center_lon)
            .field("zoom", &self.zoom)
            .field("overlays", &self.overlays.len())
            .finish_non_exhaustive()
    }
}

impl MapView {
    pub fn new(center: Coordinate, zoom: u8, http: reqwest::Client, runtime: Handle) -> Self {
        let base =
            TileManager::with_disk_cache(OsmTileSource, "osm", http.clone(), runtime.clone());

        Self {
            center_lat: center.latitude(),
            center_lon: center.longitude(),
            zoom: f32::from(zoom).clamp(MIN_ZOOM, MAX_ZOOM),
            seen_revision: 0,
            base,
            overlays: BTreeMap::new(),
            hidden: BTreeSet::new(),
            http,
            runtime,
            tile_status: None,
        }
    }

    /// Adopt a new recentre and reconcile overlay layers with the surface state.
    pub fn sync(&mut self, state: &MapState) {
        if state.view_revision != self.seen_revision {
            self.seen_revision = state.view_revision;
            if let Some(center) = state.center {
                self.center_lat = center.latitude();
                self.center_lon = center.longitude();
                self.zoom = f32::from(state.zoom).clamp(MIN_ZOOM, MAX_ZOOM);
            }
        }

        self.overlays
            .retain(|handle, _| state.layers.contains_key(handle));

        for (handle, descriptor) in &state.layers {
            if self.overlays.contains_key(handle) {
                continue;
            }
            debug!("Creating tile layer {} for {}", handle, descriptor.kind);
            let layer = OverlayLayer {
                kind: descriptor.kind,
                z_index: descriptor.z_index,
                opacity: descriptor.opacity,
                tiles: TileManager::new(
                    OverlayTileSource::new(descriptor.clone()),
                    format!("{}-{}", descriptor.kind, handle.id()),
                    self.http.clone(),
                    self.runtime.clone(),
                ),
            };
            self.overlays.insert(*handle, layer);
        }
    }

    pub fn is_visible(&self, kind: OverlayKind) -> bool {
        !self.hidden.contains(&kind)
    }

    /// Hide or show a layer locally; the compositor keeps managing it.
    pub fn set_visible(&mut self, kind: OverlayKind, visible: bool) {
        if visible {
            self.hidden.remove(&kind);
        } else {
            self.hidden.insert(kind);
        }
    }

    pub fn tile_status(&self) -> Option<&str> {
        self.tile_status.as_deref()
    }

    pub fn show(&mut self, ui: &mut egui::Ui, marker: Option<Coordinate>) {
        let (response, painter) = ui.allocate_painter(
            egui::vec2(ui.available_width(), ui.available_height()),
            egui::Sense::click_and_drag(),
        );

        let rect = response.rect;
        let center = rect.center();

        // Draw background
        painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(170, 211, 223));

        // Pinch-zoom or scroll-zoom over the map
        if response.hovered() {
            let (zoom_delta, scroll) = ui.ctx().input(|i| (i.zoom_delta(), i.smooth_scroll_delta.y));
            let mut change = 0.0;
            if (zoom_delta - 1.0).abs() > 0.001 {
                change += zoom_delta.log2();
            }
            if scroll.abs() > 0.1 {
                change += scroll / 200.0;
            }
            self.zoom = (self.zoom + change).clamp(MIN_ZOOM, MAX_ZOOM);
        }

        // Round zoom level for tile fetching and scale the cells for the remainder
        let tile_zoom = self.zoom.round() as u8;
        let scale = 2_f32.powf(self.zoom - f32::from(tile_zoom));
        let tile_px = TILE_SIZE as f32 * scale;

        // Handle dragging in tile space so panning tracks the cursor at any latitude
        if response.dragged() {
            let delta = response.drag_delta();
            let x = WebMercator::lon_to_x(self.center_lon, tile_zoom) - f64::from(delta.x / tile_px);
            let y = WebMercator::lat_to_y(self.center_lat, tile_zoom) - f64::from(delta.y / tile_px);
            let max = f64::from(1_u32 << tile_zoom);

            self.center_lon = WebMercator::x_to_lon(x.rem_euclid(max), tile_zoom);
            self.center_lat = WebMercator::y_to_lat(y, tile_zoom).clamp(-85.0, 85.0);
        }

        let tiles = visible_tiles(
            self.center_lat,
            self.center_lon,
            tile_zoom,
            rect.width() / scale,
            rect.height() / scale,
        );
        let full_uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        let cell = |offset_x: f32, offset_y: f32| {
            egui::Rect::from_min_size(
                egui::pos2(center.x + offset_x * scale, center.y + offset_y * scale),
                egui::vec2(tile_px, tile_px),
            )
        };

        let mut tiles_rendered = 0;
        for (coord, offset_x, offset_y) in &tiles {
            if let Some(texture) = self.base.get_tile(*coord, ui.ctx()) {
                painter.image(texture.id(), cell(*offset_x, *offset_y), full_uv, egui::Color32::WHITE);
                tiles_rendered += 1;
            }
        }

        // Overlays in z-index order; higher paints above lower
        let mut layers: Vec<&OverlayLayer> = self
            .overlays
            .values()
            .filter(|layer| !self.hidden.contains(&layer.kind))
            .collect();
        layers.sort_by_key(|layer| layer.z_index);

        for layer in &layers {
            let tint = egui::Color32::WHITE.gamma_multiply(layer.opacity);
            for (coord, offset_x, offset_y) in &tiles {
                if let Some(texture) = layer.tiles.get_tile(*coord, ui.ctx()) {
                    painter.image(texture.id(), cell(*offset_x, *offset_y), full_uv, tint);
                }
            }
        }

        // Update tile status line
        let errors = self.base.get_error_count();
        self.tile_status = if errors > 0 {
            Some(format!("Failed to load {errors} map tiles"))
        } else if self.base.has_loading_tiles() {
            Some("Loading map tiles...".to_string())
        } else if tiles_rendered > 0 {
            None
        } else {
            self.tile_status.take()
        };

        if let Some(marker) = marker {
            let pos = self.to_screen(marker, center, tile_zoom, tile_px);
            if rect.contains(pos) {
                painter.circle_filled(pos, 7.0, egui::Color32::from_rgb(230, 70, 60));
                painter.circle_stroke(pos, 7.0, egui::Stroke::new(2.0, egui::Color32::WHITE));
            }
        }

        // Attribution
        let mut credits = vec![self.base.source().attribution().text];
        for layer in &layers {
            let text = layer.tiles.source().attribution().text;
            if !credits.contains(&text) {
                credits.push(text);
            }
        }
        painter.text(
            rect.right_bottom() + egui::vec2(-6.0, -4.0),
            egui::Align2::RIGHT_BOTTOM,
            credits.join(" | "),
            egui::FontId::proportional(10.0),
            egui::Color32::from_rgb(40, 40, 40),
        );
    }

    fn to_screen(
        &self,
        coordinate: Coordinate,
        center: egui::Pos2,
        tile_zoom: u8,
        tile_px: f32,
    ) -> egui::Pos2 {
        let dx = WebMercator::lon_to_x(coordinate.longitude(), tile_zoom)
            - WebMercator::lon_to_x(self.center_lon, tile_zoom);
        let dy = WebMercator::lat_to_y(coordinate.latitude(), tile_zoom)
            - WebMercator::lat_to_y(self.center_lat, tile_zoom);

        egui::pos2(
            center.x + dx as f32 * tile_px,
            center.y + dy as f32 * tile_px,
        )
    }
}
