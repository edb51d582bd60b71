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

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wx_overlay::{
    CompositorConfig, Coordinate, CycleOutcome, ForecastPayload, ForecastSnapshot, FrameIndex,
    FrameIndexSource, LayerControl, LayerHandle, MapSurface, OverlayCompositor, OverlayDescriptor,
    OverlayKind, OverlayPhase, WeatherDataStore, WeatherError,
};

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Debug, Default)]
struct RecordingSurface {
    next_id: u64,
    mutations: usize,
    views: Vec<(Coordinate, u8)>,
    layers: BTreeMap<LayerHandle, OverlayDescriptor>,
    control: Option<LayerControl>,
}

impl RecordingSurface {
    fn handles_for(&self, kind: OverlayKind) -> usize {
        self.layers.values().filter(|d| d.kind == kind).count()
    }
}

impl MapSurface for RecordingSurface {
    fn set_view(&mut self, center: Coordinate, zoom: u8) {
        self.mutations += 1;
        self.views.push((center, zoom));
    }

    fn add_layer(&mut self, descriptor: &OverlayDescriptor) -> LayerHandle {
        self.mutations += 1;
        self.next_id += 1;
        let handle = LayerHandle::new(self.next_id);
        self.layers.insert(handle, descriptor.clone());
        handle
    }

    fn remove_layer(&mut self, handle: LayerHandle) {
        self.mutations += 1;
        assert!(
            self.layers.remove(&handle).is_some(),
            "removed unknown {handle}"
        );
    }

    fn add_control(&mut self, control: LayerControl) {
        self.mutations += 1;
        self.control = Some(control);
    }
}

type Response = (Duration, Result<FrameIndex, WeatherError>);

/// Replays scripted frame-index responses; the last one repeats forever.
#[derive(Debug, Clone)]
struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Response>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into_iter().collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn fixed(index: Result<FrameIndex, WeatherError>) -> Self {
        Self::new([(Duration::ZERO, index)])
    }
}

impl FrameIndexSource for ScriptedSource {
    async fn fetch_index(&self) -> Result<FrameIndex, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn index(json: &str) -> FrameIndex {
    FrameIndex::from_json(json).unwrap()
}

fn full_index() -> FrameIndex {
    index(
        r#"{"radar":{"nowcast":[{"path":"/a","time":100},{"path":"/b","time":200}]},
            "satellite":{"infrared":[{"path":"/ir","time":150}]}}"#,
    )
}

fn radar_only(path: &str, time: i64) -> FrameIndex {
    index(&format!(
        r#"{{"radar":{{"nowcast":[{{"path":"{path}","time":{time}}}]}}}}"#
    ))
}

fn here() -> Coordinate {
    Coordinate::try_new(12.9716, 77.5946).unwrap()
}

fn compositor(
    source: ScriptedSource,
    config: CompositorConfig,
) -> OverlayCompositor<RecordingSurface, ScriptedSource> {
    OverlayCompositor::new(RecordingSurface::default(), source, config)
}

fn kinds(list: &[OverlayKind]) -> BTreeSet<OverlayKind> {
    list.iter().copied().collect()
}

fn radar_url(c: &OverlayCompositor<RecordingSurface, ScriptedSource>) -> Option<String> {
    c.descriptor(OverlayKind::Radar).map(|d| d.url_template)
}

const PAYLOAD: &str = r#"{
    "latitude": 59.9,
    "longitude": 10.75,
    "utc_offset_seconds": 3600,
    "current": {"time": "2025-01-10T09:00", "temperature_2m": -3.0, "weathercode": 71},
    "hourly": {
        "time": ["2025-01-10T09:00"],
        "temperature_2m": [-3.0],
        "relative_humidity_2m": [85],
        "precipitation": [0.2],
        "weathercode": [71],
        "windspeed_10m": [6.0],
        "windgusts_10m": [12.0]
    },
    "daily": {
        "time": ["2025-01-10"],
        "temperature_2m_max": [-1.0],
        "temperature_2m_min": [-6.0],
        "precipitation_sum": [1.5],
        "weathercode": [71]
    }
}"#;

// ============================================================================
// Settling and idempotence
// ============================================================================

#[tokio::test]
async fn test_settled_kinds_match_resolved_kinds() {
    let c = compositor(
        ScriptedSource::fixed(Ok(full_index())),
        CompositorConfig::default(),
    );
    c.set_coordinate(here()).await;

    assert_eq!(c.current_kinds(), kinds(&OverlayKind::ALL));
    for kind in OverlayKind::ALL {
        assert_eq!(c.phase(kind), OverlayPhase::Attached);
    }

    c.with_surface(|s| {
        assert_eq!(s.views, vec![(here(), 10)]);
        assert_eq!(s.layers.len(), 3);
        let control = s.control.as_ref().unwrap();
        assert_eq!(control.kinds(), OverlayKind::ALL.to_vec());
        assert_eq!(control.entries[2].label, "Live Satellite Cloud");
    });
}

#[tokio::test]
async fn test_nowcast_example_resolves_latest_frame() {
    let c = compositor(
        ScriptedSource::fixed(Ok(full_index())),
        CompositorConfig::default(),
    );
    c.set_coordinate(here()).await;

    let radar = c.descriptor(OverlayKind::Radar).unwrap();
    assert_eq!(
        radar.url_template,
        "https://tilecache.rainviewer.com/b/512/{z}/{x}/{y}/4/1_0.png"
    );
    assert_eq!(radar.z_index, 200);
    assert!((radar.opacity - 0.6).abs() < f32::EPSILON);

    let lightning = c.descriptor(OverlayKind::Lightning).unwrap();
    assert!(lightning
        .url_template
        .starts_with("https://tiles.lightningmaps.org/tiles/hrd/{z}/{x}/{y}.png?timestamp="));
    assert_eq!(lightning.z_index, 10);
}

#[tokio::test]
async fn test_recenter_fetches_frame_index_once() {
    let source = ScriptedSource::new([
        (Duration::ZERO, Ok(full_index())),
        (Duration::ZERO, Ok(FrameIndex::default())),
    ]);
    let calls = Arc::clone(&source.calls);
    let c = compositor(source, CompositorConfig::default());

    c.set_coordinate(here()).await;

    // Both frame-backed kinds came from the first document.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(c.current_kinds(), kinds(&OverlayKind::ALL));
    assert!(radar_url(&c).unwrap().contains("/b/"));
}

#[tokio::test]
async fn test_set_coordinate_twice_matches_once() {
    let once = compositor(
        ScriptedSource::fixed(Ok(full_index())),
        CompositorConfig::default(),
    );
    once.set_coordinate(here()).await;

    let twice = compositor(
        ScriptedSource::fixed(Ok(full_index())),
        CompositorConfig::default(),
    );
    twice.set_coordinate(here()).await;
    twice.set_coordinate(here()).await;

    assert_eq!(once.current_kinds(), twice.current_kinds());
    for kind in [OverlayKind::Radar, OverlayKind::Satellite] {
        assert_eq!(
            once.descriptor(kind).map(|d| d.url_template),
            twice.descriptor(kind).map(|d| d.url_template)
        );
    }

    // Still recentres and keeps a single layer per kind.
    twice.with_surface(|s| {
        assert_eq!(s.views.len(), 2);
        assert_eq!(s.layers.len(), 3);
    });
}

#[tokio::test]
async fn test_single_handle_per_kind_after_many_refreshes() {
    let c = compositor(
        ScriptedSource::fixed(Ok(full_index())),
        CompositorConfig::default(),
    );
    c.set_coordinate(here()).await;

    for _ in 0..5 {
        for kind in OverlayKind::ALL {
            assert_eq!(c.refresh(kind).await, CycleOutcome::Attached);
        }
    }

    c.with_surface(|s| {
        for kind in OverlayKind::ALL {
            assert_eq!(s.handles_for(kind), 1, "{kind}");
        }
        let control = s.control.as_ref().unwrap();
        for entry in &control.entries {
            assert!(s.layers.contains_key(&entry.handle));
        }
    });
}

// ============================================================================
// Unavailable overlays
// ============================================================================

#[tokio::test]
async fn test_empty_nowcast_leaves_radar_absent() {
    let source = ScriptedSource::fixed(Ok(index(
        r#"{"radar":{"nowcast":[]},"satellite":{"infrared":[{"path":"/ir","time":1}]}}"#,
    )));
    let c = compositor(source, CompositorConfig::default());
    c.set_coordinate(here()).await;

    assert_eq!(
        c.current_kinds(),
        kinds(&[OverlayKind::Lightning, OverlayKind::Satellite])
    );
    assert_eq!(c.phase(OverlayKind::Radar), OverlayPhase::Absent);
    assert!(c.descriptor(OverlayKind::Radar).is_none());
    c.with_surface(|s| {
        assert_eq!(s.handles_for(OverlayKind::Radar), 0);
        assert_eq!(
            s.control.as_ref().unwrap().kinds(),
            vec![OverlayKind::Lightning, OverlayKind::Satellite]
        );
    });
}

#[tokio::test]
async fn test_fetch_failure_skips_frame_kinds() {
    let source = ScriptedSource::fixed(Err(WeatherError::FetchFailed {
        url: "https://api.rainviewer.com/public/weather-maps.json".to_string(),
        reason: "connection refused".to_string(),
    }));
    let c = compositor(source, CompositorConfig::default());
    c.set_coordinate(here()).await;

    assert_eq!(c.current_kinds(), kinds(&[OverlayKind::Lightning]));
}

#[tokio::test]
async fn test_failed_refresh_removes_previous_layer() {
    let source = ScriptedSource::new([
        (Duration::ZERO, Ok(radar_only("/first", 10))),
        (Duration::ZERO, Ok(FrameIndex::default())),
    ]);
    let config = CompositorConfig {
        kinds: vec![OverlayKind::Radar],
        ..CompositorConfig::default()
    };
    let c = compositor(source, config);

    assert_eq!(c.refresh(OverlayKind::Radar).await, CycleOutcome::Attached);
    assert_eq!(c.refresh(OverlayKind::Radar).await, CycleOutcome::Absent);

    assert!(c.current_kinds().is_empty());
    c.with_surface(|s| {
        assert!(s.layers.is_empty());
        assert!(s.control.as_ref().unwrap().entries.is_empty());
    });
}

// ============================================================================
// Supersession and stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_newer_cycle_supersedes_older() {
    let source = ScriptedSource::new([
        (Duration::from_secs(5), Ok(radar_only("/old", 100))),
        (Duration::ZERO, Ok(radar_only("/new", 200))),
    ]);
    let config = CompositorConfig {
        kinds: vec![OverlayKind::Radar],
        ..CompositorConfig::default()
    };
    let c = compositor(source, config);

    let slow = tokio::spawn({
        let c = c.clone();
        async move { c.refresh(OverlayKind::Radar).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(c.phase(OverlayKind::Radar), OverlayPhase::Resolving);

    assert_eq!(c.refresh(OverlayKind::Radar).await, CycleOutcome::Attached);
    assert_eq!(slow.await.unwrap(), CycleOutcome::Superseded);

    assert!(radar_url(&c).unwrap().contains("/new/"));
    c.with_surface(|s| assert_eq!(s.layers.len(), 1));
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_cycle() {
    let source = ScriptedSource::new([(Duration::from_secs(5), Ok(full_index()))]);
    let c = compositor(source, CompositorConfig::default());

    let pending = tokio::spawn({
        let c = c.clone();
        async move { c.set_coordinate(here()).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    c.stop();

    let before = c.with_surface(|s| s.mutations);
    pending.await.unwrap();

    // Lightning needs no lookup and settled before stop(); the slow lookups did not.
    assert_eq!(c.current_kinds(), kinds(&[OverlayKind::Lightning]));
    assert_eq!(c.phase(OverlayKind::Radar), OverlayPhase::Absent);
    assert_eq!(c.with_surface(|s| s.mutations), before);
}

#[tokio::test(start_paused = true)]
async fn test_stop_then_wait_makes_no_mutations() {
    let source = ScriptedSource::fixed(Ok(full_index()));
    let calls = Arc::clone(&source.calls);
    let c = compositor(source, CompositorConfig::default());

    c.set_coordinate(here()).await;
    c.start();
    assert!(c.is_running());

    c.stop();
    c.stop();
    assert!(!c.is_running());

    let mutations = c.with_surface(|s| s.mutations);
    let fetches = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(90)).await;

    assert_eq!(c.with_surface(|s| s.mutations), mutations);
    assert_eq!(calls.load(Ordering::SeqCst), fetches);
    // Layers attached before stop() stay on the map.
    assert_eq!(c.current_kinds(), kinds(&OverlayKind::ALL));
}

#[tokio::test(start_paused = true)]
async fn test_timers_refresh_each_interval() {
    let source = ScriptedSource::new([
        (Duration::ZERO, Ok(radar_only("/a", 100))),
        (Duration::ZERO, Ok(radar_only("/b", 200))),
    ]);
    let config = CompositorConfig {
        kinds: vec![OverlayKind::Radar],
        frame_refresh: Duration::from_secs(30),
        ..CompositorConfig::default()
    };
    let c = compositor(source, config);

    c.set_coordinate(here()).await;
    assert!(radar_url(&c).unwrap().contains("/a/"));

    c.start();
    c.start();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(radar_url(&c).unwrap().contains("/a/"));

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert!(radar_url(&c).unwrap().contains("/b/"));
    c.with_surface(|s| assert_eq!(s.handles_for(OverlayKind::Radar), 1));

    c.stop();
}

#[tokio::test(start_paused = true)]
async fn test_lightning_timer_rewrites_url_without_lookup() {
    let source = ScriptedSource::fixed(Ok(full_index()));
    let calls = Arc::clone(&source.calls);
    let config = CompositorConfig {
        kinds: vec![OverlayKind::Lightning],
        lightning_refresh: Duration::from_secs(30),
        ..CompositorConfig::default()
    };
    let c = compositor(source, config);

    c.set_coordinate(here()).await;
    let first: Vec<LayerHandle> = c.with_surface(|s| s.layers.keys().copied().collect());
    assert_eq!(first.len(), 1);

    c.start();
    tokio::time::sleep(Duration::from_secs(35)).await;

    let second: Vec<LayerHandle> = c.with_surface(|s| s.layers.keys().copied().collect());
    assert_eq!(second.len(), 1);
    assert_ne!(first, second);
    c.with_surface(|s| assert_eq!(s.handles_for(OverlayKind::Lightning), 1));
    assert_eq!(c.phase(OverlayKind::Lightning), OverlayPhase::Attached);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    c.stop();
}

#[tokio::test(start_paused = true)]
async fn test_dropping_compositor_ends_timers() {
    let source = ScriptedSource::fixed(Ok(full_index()));
    let calls = Arc::clone(&source.calls);
    let c = compositor(source, CompositorConfig::default());

    c.start();
    drop(c);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Store binding
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_binding_follows_store() {
    let store = WeatherDataStore::new();
    let c = compositor(
        ScriptedSource::fixed(Ok(full_index())),
        CompositorConfig::default(),
    );
    let binding = c.bind(&store);

    let oslo = Coordinate::try_new(59.9, 10.75).unwrap();
    let payload = ForecastPayload::from_json(PAYLOAD).unwrap();
    store.publish(ForecastSnapshot::new(oslo, payload.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(c.center(), Some(oslo));
    assert_eq!(c.current_kinds(), kinds(&OverlayKind::ALL));

    binding.unbind();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.subscriber_count(), 0);

    store.publish(ForecastSnapshot::new(here(), payload));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(c.center(), Some(oslo));
}

#[tokio::test(start_paused = true)]
async fn test_binding_pauses_while_stopped() {
    let store = WeatherDataStore::new();
    let c = compositor(
        ScriptedSource::fixed(Ok(full_index())),
        CompositorConfig::default(),
    );
    let _binding = c.bind(&store);
    let payload = ForecastPayload::from_json(PAYLOAD).unwrap();

    c.start();
    c.stop();
    let mutations = c.with_surface(|s| s.mutations);

    let oslo = Coordinate::try_new(59.9, 10.75).unwrap();
    store.publish(ForecastSnapshot::new(oslo, payload.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(c.center(), None);
    assert_eq!(c.with_surface(|s| s.mutations), mutations);

    c.start();
    store.publish(ForecastSnapshot::new(here(), payload));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(c.center(), Some(here()));

    c.stop();
}
