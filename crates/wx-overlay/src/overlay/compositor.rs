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

//! Overlay lifecycle management.
//!
//! The compositor owns every overlay layer on the map surface. Each overlay
//! kind moves through `Absent → Resolving → Attached → Refreshing →
//! Attached | Absent`. A refresh cycle is triggered by a coordinate change or
//! by the kind's interval timer.
//!
//! Cycles for the same kind are serialised with a generation counter: a cycle
//! records the generation it started with and its result is applied only if
//! no newer cycle (and no [`stop`](OverlayCompositor::stop)) has happened
//! since. Applying a result is a single critical section that detaches the
//! old layer, attaches the new one and rebuilds the layer control.
//!
//! A recentre fetches the frame index once and resolves every frame-backed
//! kind from that document.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::descriptor::{FrameTileOptions, LightningOptions, OverlayDescriptor, TILE_CACHE_BASE};
use super::frame::{FrameIndex, FrameIndexSource, FrameResolver};
use super::kind::{FrameKind, OverlayKind};
use super::surface::{LayerControl, LayerControlEntry, LayerHandle, MapSurface};
use crate::error::WeatherError;
use crate::geo::Coordinate;
use crate::store::WeatherDataStore;

/// Configuration for the overlay compositor.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Overlay kinds managed by this compositor.
    pub kinds: Vec<OverlayKind>,
    /// Zoom level used when recentring.
    pub zoom: u8,
    /// Cache-bust interval for the lightning layer.
    pub lightning_refresh: Duration,
    /// Frame-index lookup interval for radar and satellite.
    pub frame_refresh: Duration,
    pub tile_cache_base: String,
    pub radar: FrameTileOptions,
    pub satellite: FrameTileOptions,
    pub lightning: LightningOptions,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            kinds: OverlayKind::ALL.to_vec(),
            zoom: 10,
            lightning_refresh: Duration::from_secs(30),
            frame_refresh: Duration::from_secs(30),
            tile_cache_base: TILE_CACHE_BASE.to_string(),
            radar: FrameTileOptions::radar(),
            satellite: FrameTileOptions::satellite(),
            lightning: LightningOptions::default(),
        }
    }
}

impl CompositorConfig {
    #[must_use]
    pub fn refresh_interval(&self, kind: OverlayKind) -> Duration {
        match kind {
            OverlayKind::Lightning => self.lightning_refresh,
            OverlayKind::Radar | OverlayKind::Satellite => self.frame_refresh,
        }
    }

    fn frame_options(&self, kind: FrameKind) -> &FrameTileOptions {
        match kind {
            FrameKind::Radar => &self.radar,
            FrameKind::Satellite => &self.satellite,
        }
    }
}

/// Lifecycle phase of one overlay kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayPhase {
    #[default]
    Absent,
    /// Lookup in flight, nothing attached.
    Resolving,
    Attached,
    /// Lookup in flight, previous layer still attached.
    Refreshing,
}

/// How a refresh cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Attached,
    /// Resolution failed; the kind has no layer.
    Absent,
    /// A newer cycle or `stop()` overtook this one; its result was discarded.
    Superseded,
}

#[derive(Debug)]
struct ActiveLayer {
    handle: LayerHandle,
    descriptor: OverlayDescriptor,
}

#[derive(Debug, Default)]
struct KindSlot {
    generation: u64,
    phase: OverlayPhase,
    layer: Option<ActiveLayer>,
}

/// Frame index shared by the cycles of one recentre.
type SharedIndex = OnceCell<Result<FrameIndex, WeatherError>>;

struct State<S> {
    surface: S,
    slots: HashMap<OverlayKind, KindSlot>,
    center: Option<Coordinate>,
    timers: Option<CancellationToken>,
    /// Set by `stop()`, cleared by `start()`; store updates are ignored meanwhile.
    stopped: bool,
}

impl<S> State<S> {
    fn begin_cycle(&mut self, kind: OverlayKind) -> u64 {
        let slot = self.slots.entry(kind).or_default();
        slot.generation += 1;
        slot.phase = if slot.layer.is_some() {
            OverlayPhase::Refreshing
        } else {
            OverlayPhase::Resolving
        };
        slot.generation
    }

    fn layer_control(&self) -> LayerControl {
        let entries = OverlayKind::ALL
            .iter()
            .filter_map(|kind| {
                let layer = self.slots.get(kind)?.layer.as_ref()?;
                Some(LayerControlEntry {
                    kind: *kind,
                    label: kind.display_name(),
                    handle: layer.handle,
                })
            })
            .collect();
        LayerControl { entries }
    }
}

impl<S: MapSurface> State<S> {
    fn apply(
        &mut self,
        kind: OverlayKind,
        result: Result<OverlayDescriptor, WeatherError>,
    ) -> CycleOutcome {
        let slot = self.slots.entry(kind).or_default();

        if let Some(old) = slot.layer.take() {
            self.surface.remove_layer(old.handle);
            debug!("Detached {} overlay {}", kind, old.handle);
        }

        let outcome = match result {
            Ok(descriptor) => {
                let handle = self.surface.add_layer(&descriptor);
                debug!("Attached {} overlay {} ({})", kind, handle, descriptor.url_template);
                slot.layer = Some(ActiveLayer { handle, descriptor });
                slot.phase = OverlayPhase::Attached;
                CycleOutcome::Attached
            }
            Err(e) => {
                warn!("Skipping {} overlay this cycle: {}", kind, e);
                slot.phase = OverlayPhase::Absent;
                CycleOutcome::Absent
            }
        };

        let control = self.layer_control();
        self.surface.add_control(control);
        outcome
    }
}

struct Shared<S, F> {
    state: Mutex<State<S>>,
    resolver: FrameResolver<F>,
    config: CompositorConfig,
}

impl<S, F> Shared<S, F> {
    fn lock(&self) -> MutexGuard<'_, State<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, F> Drop for Shared<S, F> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = state.timers.take() {
            token.cancel();
        }
    }
}

/// Owns the overlay layers on a [`MapSurface`] and keeps them fresh.
///
/// The handle is cheap to clone; clones share the same state. Timer tasks
/// only hold a weak reference, so dropping the last handle stops them.
pub struct OverlayCompositor<S, F> {
    shared: Arc<Shared<S, F>>,
}

impl<S, F> Clone for OverlayCompositor<S, F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, F> fmt::Debug for OverlayCompositor<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("OverlayCompositor")
            .field("center", &state.center)
            .field("running", &state.timers.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: MapSurface, F: FrameIndexSource> OverlayCompositor<S, F> {
    #[must_use]
    pub fn new(surface: S, source: F, config: CompositorConfig) -> Self {
        let state = State {
            surface,
            slots: HashMap::new(),
            center: None,
            timers: None,
            stopped: false,
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                resolver: FrameResolver::new(source),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CompositorConfig {
        &self.shared.config
    }

    /// Recentre the map and rebuild every managed overlay.
    ///
    /// Resolves once every cycle started here has settled. Calling it again
    /// with the same coordinate still recentres and refreshes.
    pub async fn set_coordinate(&self, coordinate: Coordinate) {
        let Some(mut cycles) = self.recenter(coordinate, false) else {
            return;
        };
        while let Some(joined) = cycles.join_next().await {
            if let Err(e) = joined {
                warn!("Overlay refresh task failed: {}", e);
            }
        }
    }

    /// Run one refresh cycle for `kind`.
    pub async fn refresh(&self, kind: OverlayKind) -> CycleOutcome {
        let generation = self.shared.lock().begin_cycle(kind);
        self.run_cycle(kind, generation, None).await
    }

    /// Start the per-kind refresh timers. Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut state = self.shared.lock();
        state.stopped = false;
        if state.timers.is_some() {
            debug!("Overlay refresh already running");
            return;
        }

        let token = CancellationToken::new();
        for &kind in &self.shared.config.kinds {
            let period = self.shared.config.refresh_interval(kind);
            tokio::spawn(refresh_loop(
                Arc::downgrade(&self.shared),
                kind,
                period,
                token.clone(),
            ));
        }

        info!(
            "Overlay refresh started for {} kind(s)",
            self.shared.config.kinds.len()
        );
        state.timers = Some(token);
    }

    /// Cancel the refresh timers and disregard every in-flight cycle.
    ///
    /// Once this returns, nothing started before it will touch the surface.
    /// A [`StoreBinding`] ignores published snapshots until the next
    /// [`start`](Self::start); explicit [`set_coordinate`](Self::set_coordinate)
    /// calls still recentre.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        state.stopped = true;
        if let Some(token) = state.timers.take() {
            token.cancel();
            info!("Overlay refresh stopped");
        }

        for slot in state.slots.values_mut() {
            slot.generation += 1;
            slot.phase = if slot.layer.is_some() {
                OverlayPhase::Attached
            } else {
                OverlayPhase::Absent
            };
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().timers.is_some()
    }

    /// Kinds with a layer currently attached.
    #[must_use]
    pub fn current_kinds(&self) -> BTreeSet<OverlayKind> {
        self.shared
            .lock()
            .slots
            .iter()
            .filter(|(_, slot)| slot.layer.is_some())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Descriptor of the attached layer for `kind`.
    #[must_use]
    pub fn descriptor(&self, kind: OverlayKind) -> Option<OverlayDescriptor> {
        self.shared
            .lock()
            .slots
            .get(&kind)
            .and_then(|slot| slot.layer.as_ref())
            .map(|layer| layer.descriptor.clone())
    }

    #[must_use]
    pub fn phase(&self, kind: OverlayKind) -> OverlayPhase {
        self.shared
            .lock()
            .slots
            .get(&kind)
            .map(|slot| slot.phase)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn center(&self) -> Option<Coordinate> {
        self.shared.lock().center
    }

    /// Run `f` against the surface while holding the compositor lock.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.shared.lock().surface)
    }

    /// Follow `store`: every published snapshot recentres the map.
    ///
    /// The returned binding owns the subscription; drop it to stop following.
    /// Snapshots published while the compositor is stopped are skipped.
    #[must_use]
    pub fn bind(&self, store: &WeatherDataStore) -> StoreBinding {
        let mut subscription = store.subscribe();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let weak = Arc::downgrade(&self.shared);

        tokio::spawn(async move {
            loop {
                let snapshot = tokio::select! {
                    () = task_token.cancelled() => break,
                    next = subscription.changed() => match next {
                        Some(snapshot) => snapshot,
                        None => break,
                    },
                };

                let Some(shared) = weak.upgrade() else { break };
                match (OverlayCompositor { shared }).recenter(snapshot.coordinate, true) {
                    Some(mut cycles) => {
                        info!("Forecast updated; recentred overlays on {}", snapshot.coordinate);
                        cycles.detach_all();
                    }
                    None => debug!("Compositor stopped; ignoring forecast update"),
                }
            }
            debug!("Store binding closed");
        });

        StoreBinding { token }
    }

    /// Recentre and start one cycle per managed kind.
    ///
    /// Generations are bumped in the same critical section as the recentre so
    /// that a `stop()` issued afterwards disregards these cycles. With
    /// `skip_if_stopped`, nothing happens while the compositor is stopped.
    fn recenter(
        &self,
        coordinate: Coordinate,
        skip_if_stopped: bool,
    ) -> Option<JoinSet<CycleOutcome>> {
        let started: Vec<(OverlayKind, u64)> = {
            let mut state = self.shared.lock();
            if skip_if_stopped && state.stopped {
                return None;
            }
            state.surface.set_view(coordinate, self.shared.config.zoom);
            state.center = Some(coordinate);
            self.shared
                .config
                .kinds
                .iter()
                .map(|&kind| (kind, state.begin_cycle(kind)))
                .collect()
        };

        info!(
            "Map centred on {}; refreshing {} overlay(s)",
            coordinate,
            started.len()
        );

        let index = Arc::new(SharedIndex::new());
        let mut cycles = JoinSet::new();
        for (kind, generation) in started {
            let compositor = self.clone();
            let index = Arc::clone(&index);
            cycles.spawn(async move {
                compositor
                    .run_cycle(kind, generation, Some(index.as_ref()))
                    .await
            });
        }
        Some(cycles)
    }

    async fn run_cycle(
        &self,
        kind: OverlayKind,
        generation: u64,
        index: Option<&SharedIndex>,
    ) -> CycleOutcome {
        let result = self.describe(kind, index).await;

        let mut state = self.shared.lock();
        let current = state.slots.get(&kind).map_or(0, |slot| slot.generation);
        if current != generation {
            debug!(
                "Discarding stale {} cycle (generation {} < {})",
                kind, generation, current
            );
            return CycleOutcome::Superseded;
        }

        state.apply(kind, result)
    }

    async fn describe(
        &self,
        kind: OverlayKind,
        index: Option<&SharedIndex>,
    ) -> Result<OverlayDescriptor, WeatherError> {
        let config = &self.shared.config;
        let resolver = &self.shared.resolver;
        match kind.frame_kind() {
            None => Ok(OverlayDescriptor::lightning(
                &config.lightning,
                Utc::now().timestamp(),
            )),
            Some(frame_kind) => {
                let frame = match index {
                    Some(shared) => {
                        let fetched = shared
                            .get_or_init(|| resolver.source().fetch_index())
                            .await;
                        fetched.as_ref().map_err(Clone::clone)?.latest(frame_kind)?
                    }
                    None => resolver.resolve_latest(frame_kind).await?,
                };
                Ok(OverlayDescriptor::from_frame(
                    frame_kind,
                    &frame,
                    &config.tile_cache_base,
                    config.frame_options(frame_kind),
                ))
            }
        }
    }
}

async fn refresh_loop<S: MapSurface, F: FrameIndexSource>(
    shared: Weak<Shared<S, F>>,
    kind: OverlayKind,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(shared) = shared.upgrade() else { break };
        let compositor = OverlayCompositor { shared };

        // Checked under the lock so a tick racing with stop() never starts a cycle.
        let generation = {
            let mut state = compositor.shared.lock();
            if token.is_cancelled() {
                break;
            }
            state.begin_cycle(kind)
        };

        tokio::select! {
            () = token.cancelled() => break,
            outcome = compositor.run_cycle(kind, generation, None) => {
                debug!("Timed {} refresh: {:?}", kind, outcome);
            }
        }
    }

    debug!("{} refresh timer exited", kind);
}

/// Keeps a compositor following a [`WeatherDataStore`]; dropping it unsubscribes.
#[derive(Debug)]
pub struct StoreBinding {
    token: CancellationToken,
}

impl StoreBinding {
    pub fn unbind(self) {
        drop(self);
    }
}

impl Drop for StoreBinding {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
