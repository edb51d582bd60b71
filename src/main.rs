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

mod app;
mod config;
mod forecast_pane;
mod map;
mod search;

use clap::Parser;
use log::info;
use wx_overlay::Coordinate;

use app::{StartLocation, WeatherApp};
use config::AppConfig;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Live weather map with lightning, radar and satellite overlays
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Start latitude in degrees
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Start longitude in degrees
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Initial map zoom level
    #[arg(long)]
    zoom: Option<u8>,

    /// Skip IP geolocation at startup
    #[arg(long)]
    no_geolocate: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args = Args::parse();

    info!("Starting SkyCast Desktop...");
    let mut config = AppConfig::load();
    if let Ok(path) = AppConfig::get_config_path() {
        info!("Using config file {}", path.display());
    }
    if let Some(zoom) = args.zoom {
        config.default_zoom = zoom;
    }

    let cli = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Some(Coordinate::try_new(lat, lon)?),
        _ => None,
    };
    let start = StartLocation::resolve(cli, &config, !args.no_geolocate);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("skycast-worker")
        .build()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 850.0])
            .with_title("SkyCast Desktop"),
        ..Default::default()
    };

    info!("Initializing window...");
    eframe::run_native(
        "SkyCast Desktop",
        options,
        Box::new(move |cc| Ok(Box::new(WeatherApp::new(cc, runtime, &config, start)?))),
    )?;

    Ok(())
}
