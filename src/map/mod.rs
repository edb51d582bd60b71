//! Map rendering and tile management.
//!
//! This module provides the compositor-facing map surface, tile sources,
//! tile fetching and caching, and Web Mercator projection utilities.

pub mod sources;
pub mod surface;
pub mod tiles;
pub mod view;

pub use sources::{OsmTileSource, OverlayTileSource};
pub use surface::{MapState, SharedMapSurface};
pub use tiles::{TileManager, WebMercator};
pub use view::MapView;
