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

//! Tile-source descriptors for overlay layers.
//!
//! URL layouts must match the upstream tile services exactly.

use super::frame::OverlayFrame;
use super::kind::{FrameKind, OverlayKind};

/// RainViewer tile cache host.
pub const TILE_CACHE_BASE: &str = "https://tilecache.rainviewer.com";

/// Blitzortung lightning tiles; a `timestamp` query parameter is appended per refresh.
pub const LIGHTNING_TILE_URL: &str = "https://tiles.lightningmaps.org/tiles/hrd/{z}/{x}/{y}.png";

const RAINVIEWER_ATTRIBUTION: &str = "RainViewer";
const LIGHTNING_ATTRIBUTION: &str = "Blitzortung.org";

/// Rendering options for frame-based (RainViewer) tiles
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTileOptions {
    /// Tile size requested from the server (in the URL).
    pub request_size: u32,
    /// Tile size the map renders each tile at.
    pub render_size: u32,
    pub color_scheme: u8,
    pub smooth: bool,
    pub snow: bool,
    pub extension: String,
    pub opacity: f32,
}

impl FrameTileOptions {
    #[must_use]
    pub fn radar() -> Self {
        Self {
            request_size: 512,
            render_size: 256,
            color_scheme: 4,
            smooth: true,
            snow: false,
            extension: "png".to_string(),
            opacity: 0.6,
        }
    }

    #[must_use]
    pub fn satellite() -> Self {
        Self {
            request_size: 512,
            render_size: 256,
            color_scheme: 0,
            smooth: false,
            snow: false,
            extension: "png".to_string(),
            opacity: 0.6,
        }
    }
}

/// Options for the lightning layer
#[derive(Debug, Clone, PartialEq)]
pub struct LightningOptions {
    pub url: String,
    pub opacity: f32,
    pub z_index: i64,
}

impl Default for LightningOptions {
    fn default() -> Self {
        Self {
            url: LIGHTNING_TILE_URL.to_string(),
            opacity: 0.8,
            z_index: 10,
        }
    }
}

/// Everything a map surface needs to create one tile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDescriptor {
    pub kind: OverlayKind,
    /// URL with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    pub attribution: String,
    /// Paint order; higher paints above lower.
    pub z_index: i64,
    pub opacity: f32,
    /// Rendered tile size in pixels.
    pub tile_size: u32,
}

impl OverlayDescriptor {
    /// Descriptor for a RainViewer frame.
    ///
    /// `z_index` is the frame timestamp so a newer frame paints above an older one.
    #[must_use]
    pub fn from_frame(
        kind: FrameKind,
        frame: &OverlayFrame,
        tile_cache_base: &str,
        options: &FrameTileOptions,
    ) -> Self {
        let url_template = format!(
            "{}{}/{}/{{z}}/{{x}}/{{y}}/{}/{}_{}.{}",
            tile_cache_base,
            frame.path,
            options.request_size,
            options.color_scheme,
            u8::from(options.smooth),
            u8::from(options.snow),
            options.extension,
        );

        Self {
            kind: kind.overlay_kind(),
            url_template,
            attribution: RAINVIEWER_ATTRIBUTION.to_string(),
            z_index: frame.timestamp,
            opacity: options.opacity,
            tile_size: options.render_size,
        }
    }

    /// Lightning descriptor cache-busted with `timestamp` (unix seconds).
    #[must_use]
    pub fn lightning(options: &LightningOptions, timestamp: i64) -> Self {
        Self {
            kind: OverlayKind::Lightning,
            url_template: format!("{}?timestamp={}", options.url, timestamp),
            attribution: LIGHTNING_ATTRIBUTION.to_string(),
            z_index: options.z_index,
            opacity: options.opacity,
            tile_size: 256,
        }
    }

    /// Concrete URL for one tile.
    #[must_use]
    pub fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}
