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

//! The map rendering capability the compositor drives.

use std::fmt;

use super::descriptor::OverlayDescriptor;
use super::kind::OverlayKind;
use crate::geo::Coordinate;

/// Opaque reference to a tile layer attached to a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(u64);

impl LayerHandle {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// One toggle row in the layer control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerControlEntry {
    pub kind: OverlayKind,
    pub label: &'static str,
    pub handle: LayerHandle,
}

/// Overlay toggles reflecting exactly the attached layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerControl {
    pub entries: Vec<LayerControlEntry>,
}

impl LayerControl {
    #[must_use]
    pub fn kinds(&self) -> Vec<OverlayKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }
}

/// A map that can be recentred and can carry tile layers.
///
/// Only the compositor mutates the surface, always while holding its own lock,
/// so implementations need no internal ordering guarantees.
pub trait MapSurface: Send + 'static {
    /// Recentre the map.
    fn set_view(&mut self, center: Coordinate, zoom: u8);

    /// Attach a tile layer and return its handle.
    fn add_layer(&mut self, descriptor: &OverlayDescriptor) -> LayerHandle;

    /// Detach a layer previously returned by [`add_layer`](Self::add_layer).
    fn remove_layer(&mut self, handle: LayerHandle);

    /// Install the layer control, replacing any control added before.
    fn add_control(&mut self, control: LayerControl);
}
