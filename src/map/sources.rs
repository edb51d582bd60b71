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

//! Tile sources for the base map and the weather overlays.

use walkers::sources::{Attribution, TileSource};
use walkers::TileId;
use wx_overlay::{OverlayDescriptor, OverlayKind};

/// Standard OpenStreetMap raster tiles
#[derive(Debug, Clone, Copy, Default)]
pub struct OsmTileSource;

impl TileSource for OsmTileSource {
    fn tile_url(&self, tile_id: TileId) -> String {
        format!(
            "https://tile.openstreetmap.org/{}/{}/{}.png",
            tile_id.zoom, tile_id.x, tile_id.y
        )
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "© OpenStreetMap contributors",
            url: "https://www.openstreetmap.org/copyright",
            logo_light: None,
            logo_dark: None,
        }
    }
}

/// Tile source for one attached overlay layer
#[derive(Debug, Clone)]
pub struct OverlayTileSource {
    descriptor: OverlayDescriptor,
}

impl OverlayTileSource {
    pub fn new(descriptor: OverlayDescriptor) -> Self {
        Self { descriptor }
    }
}

impl TileSource for OverlayTileSource {
    fn tile_url(&self, tile_id: TileId) -> String {
        self.descriptor
            .tile_url(tile_id.zoom, tile_id.x, tile_id.y)
    }

    fn attribution(&self) -> Attribution {
        match self.descriptor.kind {
            OverlayKind::Lightning => Attribution {
                text: "Lightning data © Blitzortung.org",
                url: "https://www.blitzortung.org/",
                logo_light: None,
                logo_dark: None,
            },
            OverlayKind::Radar | OverlayKind::Satellite => Attribution {
                text: "Weather data © RainViewer",
                url: "https://www.rainviewer.com/",
                logo_light: None,
                logo_dark: None,
            },
        }
    }

    fn tile_size(&self) -> u32 {
        self.descriptor.tile_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_overlay::overlay::{FrameTileOptions, LightningOptions, TILE_CACHE_BASE};
    use wx_overlay::{FrameKind, OverlayFrame};

    fn tile(x: u32, y: u32, zoom: u8) -> TileId {
        TileId { x, y, zoom }
    }

    #[test]
    fn test_osm_url() {
        assert_eq!(
            OsmTileSource.tile_url(tile(1, 2, 3)),
            "https://tile.openstreetmap.org/3/1/2.png"
        );
    }

    #[test]
    fn test_overlay_urls() {
        let radar = OverlayTileSource::new(OverlayDescriptor::from_frame(
            FrameKind::Radar,
            &OverlayFrame {
                path: "/v2/radar/nowcast_abc".to_string(),
                timestamp: 1_700_000_600,
            },
            TILE_CACHE_BASE,
            &FrameTileOptions::radar(),
        ));
        assert_eq!(
            radar.tile_url(tile(730, 480, 10)),
            "https://tilecache.rainviewer.com/v2/radar/nowcast_abc/512/10/730/480/4/1_0.png"
        );
        assert_eq!(radar.tile_size(), 256);
        assert!(radar.attribution().text.contains("RainViewer"));

        let lightning = OverlayTileSource::new(OverlayDescriptor::lightning(
            &LightningOptions::default(),
            42,
        ));
        assert_eq!(
            lightning.tile_url(tile(0, 0, 0)),
            "https://tiles.lightningmaps.org/tiles/hrd/0/0/0.png?timestamp=42"
        );
    }
}
