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

//! Tile fetching, caching and Web Mercator helpers.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use egui::{ColorImage, TextureHandle, TextureOptions};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use walkers::sources::TileSource;
use walkers::TileId;

/// Screen size of one tile cell. Larger images are scaled into it.
pub const TILE_SIZE: u32 = 256;
const CACHE_DURATION_DAYS: u64 = 7;

/// Web Mercator projection utilities
#[derive(Debug)]
pub struct WebMercator;

impl WebMercator {
    /// Latitude to fractional tile Y at `zoom`
    pub fn lat_to_y(lat: f64, zoom: u8) -> f64 {
        let lat_rad = lat.to_radians();
        let n = 2_f64.powi(i32::from(zoom));
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * n
    }

    /// Longitude to fractional tile X at `zoom`
    pub fn lon_to_x(lon: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        ((lon + 180.0) / 360.0) * n
    }

    /// Fractional tile Y back to latitude
    pub fn y_to_lat(y: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        let lat_rad = (std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh().atan();
        lat_rad.to_degrees()
    }

    /// Fractional tile X back to longitude
    pub fn x_to_lon(x: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        x / n * 360.0 - 180.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    pub fn tile_id(self) -> TileId {
        TileId {
            x: self.x,
            y: self.y,
            zoom: self.zoom,
        }
    }
}

/// Cache filename based on hash of URL
fn cache_filename(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}.png", hasher.finalize())
}

/// Decode a tile at its real pixel size.
pub fn decode_tile(bytes: &[u8]) -> Result<ColorImage, image::ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

/// Every tile needed to cover a viewport, with its offset from the centre in pixels.
pub fn visible_tiles(
    center_lat: f64,
    center_lon: f64,
    zoom: u8,
    viewport_width: f32,
    viewport_height: f32,
) -> Vec<(TileCoord, f32, f32)> {
    let mut tiles = Vec::new();
    let tile_px = f64::from(TILE_SIZE);

    let center_tile_x = WebMercator::lon_to_x(center_lon, zoom);
    let center_tile_y = WebMercator::lat_to_y(center_lat, zoom);

    let tiles_wide = (viewport_width / TILE_SIZE as f32).ceil() as i64 + 2;
    let tiles_high = (viewport_height / TILE_SIZE as f32).ceil() as i64 + 2;

    let start_x = center_tile_x.floor() as i64 - tiles_wide / 2;
    let start_y = center_tile_y.floor() as i64 - tiles_high / 2;

    let max_tile = 1_i64 << zoom;

    for dy in 0..tiles_high {
        for dx in 0..tiles_wide {
            let tile_x = start_x + dx;
            let tile_y = start_y + dy;

            // Latitude doesn't wrap
            if !(0..max_tile).contains(&tile_y) {
                continue;
            }

            // Longitude wraps around
            let wrapped_x = tile_x.rem_euclid(max_tile);
            let coord = TileCoord::new(wrapped_x as u32, tile_y as u32, zoom);

            let offset_x = (tile_x as f64 - center_tile_x) * tile_px;
            let offset_y = (tile_y as f64 - center_tile_y) * tile_px;

            tiles.push((coord, offset_x as f32, offset_y as f32));
        }
    }

    tiles
}

pub enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

type TileMap = Arc<Mutex<HashMap<TileCoord, TileState>>>;

fn lock(tiles: &TileMap) -> MutexGuard<'_, HashMap<TileCoord, TileState>> {
    tiles.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fetches and holds the textures of one tile layer.
///
/// Downloads run on the Tokio runtime; the UI thread only reads the tile map.
/// With a cache directory, tiles are also kept on disk for
/// [`CACHE_DURATION_DAYS`] days.
pub struct TileManager<S> {
    source: S,
    label: String,
    cache_dir: Option<PathBuf>,
    tiles: TileMap,
    http: reqwest::Client,
    runtime: Handle,
}

impl<S> std::fmt::Debug for TileManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("label", &self.label)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl<S: TileSource> TileManager<S> {
    /// Memory-only layer.
    pub fn new(source: S, label: impl Into<String>, http: reqwest::Client, runtime: Handle) -> Self {
        Self {
            source,
            label: label.into(),
            cache_dir: None,
            tiles: Arc::new(Mutex::new(HashMap::new())),
            http,
            runtime,
        }
    }

    /// Layer backed by a disk cache under the user cache directory.
    pub fn with_disk_cache(
        source: S,
        label: impl Into<String>,
        http: reqwest::Client,
        runtime: Handle,
    ) -> Self {
        let label = label.into();
        let cache_dir = Self::get_cache_dir(&label);

        match fs::create_dir_all(&cache_dir) {
            Ok(()) => Self::cleanup_old_tiles(&cache_dir),
            Err(e) => warn!("Failed to create cache directory {}: {}", cache_dir.display(), e),
        }

        Self {
            cache_dir: Some(cache_dir),
            ..Self::new(source, label, http, runtime)
        }
    }

    fn get_cache_dir(label: &str) -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        path.push("skycast-desktop");
        path.push("tiles");
        path.push(label);
        path
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);

        let Ok(entries) = fs::read_dir(cache_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);

            if expired {
                match fs::remove_file(entry.path()) {
                    Ok(()) => debug!("Removed old tile cache: {}", entry.path().display()),
                    Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
                }
            }
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get tile from memory or disk, or queue it for download
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        if coord.zoom > self.source.max_zoom() {
            return None;
        }

        let mut tiles = lock(&self.tiles);

        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => return Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => return None,
            None => {}
        }

        let url = self.source.tile_url(coord.tile_id());
        let cache_path = self
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(cache_filename(&url)));

        if let Some(path) = cache_path.as_ref().filter(|p| p.exists()) {
            match self.load_tile_from_disk(path, ctx, coord) {
                Ok(texture) => {
                    tiles.insert(coord, TileState::Loaded(texture.clone()));
                    return Some(texture);
                }
                Err(e) => warn!("Failed to load cached tile {}: {}", path.display(), e),
            }
        }

        tiles.insert(coord, TileState::Loading);
        drop(tiles);
        self.queue_download(coord, url, cache_path, ctx.clone());
        None
    }

    fn texture_name(&self, coord: TileCoord) -> String {
        format!("{}_{}_{}/{}", self.label, coord.zoom, coord.x, coord.y)
    }

    fn load_tile_from_disk(
        &self,
        path: &Path,
        ctx: &egui::Context,
        coord: TileCoord,
    ) -> Result<TextureHandle, String> {
        let img_data = fs::read(path).map_err(|e| e.to_string())?;
        let color_image = decode_tile(&img_data).map_err(|e| e.to_string())?;

        Ok(ctx.load_texture(
            self.texture_name(coord),
            color_image,
            TextureOptions::default(),
        ))
    }

    fn queue_download(
        &self,
        coord: TileCoord,
        url: String,
        cache_path: Option<PathBuf>,
        ctx: egui::Context,
    ) {
        let tiles = Arc::clone(&self.tiles);
        let http = self.http.clone();
        let name = self.texture_name(coord);

        self.runtime.spawn(async move {
            let state = match download_tile(&http, &url).await {
                Ok(bytes) => {
                    if let Some(path) = cache_path {
                        if let Err(e) = tokio::fs::write(&path, &bytes).await {
                            warn!("Failed to save tile to cache: {}", e);
                        }
                    }

                    match decode_tile(&bytes) {
                        Ok(color_image) => TileState::Loaded(ctx.load_texture(
                            name,
                            color_image,
                            TextureOptions::default(),
                        )),
                        Err(e) => {
                            warn!("Failed to decode tile image {}: {}", url, e);
                            TileState::Failed
                        }
                    }
                }
                Err(e) => {
                    debug!("Failed to fetch tile {}: {}", url, e);
                    TileState::Failed
                }
            };

            lock(&tiles).insert(coord, state);
            ctx.request_repaint();
        });
    }

    pub fn has_loading_tiles(&self) -> bool {
        lock(&self.tiles)
            .values()
            .any(|state| matches!(state, TileState::Loading))
    }

    pub fn get_error_count(&self) -> usize {
        lock(&self.tiles)
            .values()
            .filter(|state| matches!(state, TileState::Failed))
            .count()
    }
}

async fn download_tile(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
