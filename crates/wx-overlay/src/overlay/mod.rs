//! Live map overlays.
//!
//! [`OverlayCompositor`] owns the overlay layers on a [`MapSurface`]. Radar and
//! satellite tiles are located through the RainViewer frame index
//! ([`FrameResolver`]); lightning tiles come from a fixed template that is
//! cache-busted on every refresh.

pub mod compositor;
pub mod descriptor;
pub mod frame;
pub mod kind;
pub mod surface;

pub use compositor::{CompositorConfig, CycleOutcome, OverlayCompositor, OverlayPhase, StoreBinding};
pub use descriptor::{
    FrameTileOptions, LightningOptions, OverlayDescriptor, LIGHTNING_TILE_URL, TILE_CACHE_BASE,
};
pub use frame::{
    FrameIndex, FrameIndexSource, FrameResolver, HttpFrameIndexSource, OverlayFrame, RadarFrames,
    SatelliteFrames, DEFAULT_FRAME_INDEX_URL,
};
pub use kind::{FrameKind, OverlayKind};
pub use surface::{LayerControl, LayerControlEntry, LayerHandle, MapSurface};
