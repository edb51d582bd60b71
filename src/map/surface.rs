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

//! `MapSurface` backed by shared state the UI reads every frame.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use wx_overlay::{Coordinate, LayerControl, LayerHandle, MapSurface, OverlayDescriptor};

/// What the compositor has asked the map to show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub center: Option<Coordinate>,
    pub zoom: u8,
    /// Bumped on every `set_view` so the UI can tell a new recentre from a stale one.
    pub view_revision: u64,
    pub layers: BTreeMap<LayerHandle, OverlayDescriptor>,
    pub control: LayerControl,
}

#[derive(Debug, Default)]
struct Inner {
    state: MapState,
    next_handle: u64,
}

/// Cloneable surface handle: the compositor writes, the UI reads.
#[derive(Clone, Default)]
pub struct SharedMapSurface {
    inner: Arc<Mutex<Inner>>,
    repaint: Option<egui::Context>,
}

impl std::fmt::Debug for SharedMapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMapSurface")
            .field("state", &self.lock().state)
            .finish_non_exhaustive()
    }
}

impl SharedMapSurface {
    /// Surface that asks `ctx` for a repaint after every change.
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            inner: Arc::default(),
            repaint: Some(ctx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn changed(&self) {
        if let Some(ctx) = &self.repaint {
            ctx.request_repaint();
        }
    }

    /// Copy of the current state for one UI frame.
    pub fn snapshot(&self) -> MapState {
        self.lock().state.clone()
    }
}

impl MapSurface for SharedMapSurface {
    fn set_view(&mut self, center: Coordinate, zoom: u8) {
        {
            let mut inner = self.lock();
            inner.state.center = Some(center);
            inner.state.zoom = zoom;
            inner.state.view_revision += 1;
        }
        self.changed();
    }

    fn add_layer(&mut self, descriptor: &OverlayDescriptor) -> LayerHandle {
        let handle = {
            let mut inner = self.lock();
            inner.next_handle += 1;
            let handle = LayerHandle::new(inner.next_handle);
            inner.state.layers.insert(handle, descriptor.clone());
            handle
        };
        debug!("Map layer {} added for {}", handle, descriptor.kind);
        self.changed();
        handle
    }

    fn remove_layer(&mut self, handle: LayerHandle) {
        let removed = self.lock().state.layers.remove(&handle);
        if removed.is_none() {
            debug!("Map layer {} was already gone", handle);
        }
        self.changed();
    }

    fn add_control(&mut self, control: LayerControl) {
        self.lock().state.control = control;
        self.changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_overlay::overlay::LightningOptions;
    use wx_overlay::{LayerControlEntry, OverlayKind};

    #[test]
    fn test_clones_share_state() {
        let reader = SharedMapSurface::default();
        let mut writer = reader.clone();

        let here = Coordinate::try_new(48.85, 2.35).unwrap();
        writer.set_view(here, 10);
        writer.set_view(here, 10);

        let handle = writer.add_layer(&OverlayDescriptor::lightning(&LightningOptions::default(), 1));
        writer.add_control(LayerControl {
            entries: vec![LayerControlEntry {
                kind: OverlayKind::Lightning,
                label: OverlayKind::Lightning.display_name(),
                handle,
            }],
        });

        let state = reader.snapshot();
        assert_eq!(state.center, Some(here));
        assert_eq!(state.view_revision, 2);
        assert_eq!(state.layers.len(), 1);
        assert_eq!(state.control.kinds(), vec![OverlayKind::Lightning]);

        writer.remove_layer(handle);
        writer.remove_layer(handle);
        assert!(reader.snapshot().layers.is_empty());
    }

    #[test]
    fn test_handles_are_unique() {
        let mut surface = SharedMapSurface::default();
        let descriptor = OverlayDescriptor::lightning(&LightningOptions::default(), 1);
        let a = surface.add_layer(&descriptor);
        let b = surface.add_layer(&descriptor);
        assert_ne!(a, b);
    }
}
