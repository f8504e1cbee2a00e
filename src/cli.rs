// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Terminal preview with scanning
//! - Headless scanning
//! - Decoding still images
//! - Listing cameras and printing the configuration

use barcode_camera::backends::camera::zoom::{DigitalZoom, spawn_zoom_actor};
use barcode_camera::backends::camera::enumerate_cameras;
use barcode_camera::backends::camera::v4l2_controls::{ControlDevice, V4L2_CID_ZOOM_ABSOLUTE};
use barcode_camera::backends::file_source::{FileFrameSource, collect_images};
use barcode_camera::config::Config;
use barcode_camera::constants::app_info;
use barcode_camera::frame_processor::{
    DecodeOutcome, FrameAnalyzer, MultiFormatDecoder, ReleaseCounter,
};
use barcode_camera::permission::PermissionGate;
use barcode_camera::session::{ScanSession, SessionOutcome};
use barcode_camera::terminal;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Set up tracing
///
/// In terminal mode logs go to a file so they do not draw over the preview.
pub fn init_logging(to_file: bool) -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control the level, e.g. RUST_LOG=barcode_camera=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if to_file {
        let log_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(app_info::APP_ID);
        std::fs::create_dir_all(&log_dir)?;
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("barcode-camera.log"))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(log_file))
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .init();
    }

    Ok(())
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Summary line for a finished session
///
/// A denied permission has already been logged and gets no output.
fn outcome_summary(outcome: &SessionOutcome) -> Option<String> {
    match outcome {
        SessionOutcome::PermissionDenied => None,
        SessionOutcome::Completed {
            frames,
            dropped,
            analysis,
        } => Some(format!(
            "{} frames captured, {} skipped while busy, {} analyzed ({} with barcodes, {} failed)",
            frames, dropped, analysis.submitted, analysis.found, analysis.failed
        )),
    }
}

fn print_outcome(outcome: &SessionOutcome) {
    if let Some(summary) = outcome_summary(outcome) {
        println!("{}", summary);
    }
}

/// Terminal preview with scanning
pub fn preview(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = terminal::run(config)?;
    print_outcome(&outcome);
    Ok(())
}

/// Scan without preview until Ctrl+C or `duration` elapses
pub fn scan(config: Config, duration: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let provider = terminal::permission_provider(&config);
    let (symbol_tx, mut symbol_rx) = mpsc::unbounded_channel();
    let session = ScanSession::new(config).with_symbol_listener(symbol_tx);

    let outcome = runtime()?.block_on(async move {
        let printer = tokio::spawn(async move {
            while let Some(symbols) = symbol_rx.recv().await {
                let timestamp = chrono::Local::now().format("%H:%M:%S");
                for symbol in symbols {
                    println!("[{}] {}: {}", timestamp, symbol.format, symbol.display_value);
                }
            }
        });

        let shutdown = async move {
            match duration {
                Some(secs) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                        _ = tokio::signal::ctrl_c() => {}
                    }
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };

        println!("Scanning... Press Ctrl+C to stop.");
        let mut gate = PermissionGate::new(provider);
        let outcome = session.run(&mut gate, shutdown).await;
        let _ = printer.await;
        outcome
    })?;

    print_outcome(&outcome);
    Ok(())
}

/// Decode still images with the live analysis path
///
/// Images run one after another against a digital zoom, so the printed
/// zoom is the level each result leaves behind.
pub fn decode(config: Config, inputs: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let images = collect_images(&inputs);
    if images.is_empty() {
        println!("No images found.");
        return Ok(());
    }

    let rotation = config.sensor_rotation();
    let options = config.decoder_options();

    runtime()?.block_on(async move {
        let (zoom, _actor) = spawn_zoom_actor(Box::new(DigitalZoom::new()));
        let analyzer = FrameAnalyzer::new(
            MultiFormatDecoder::new(options),
            zoom.clone(),
            config.max_decode_dimension,
        );
        let releases = ReleaseCounter::new();

        for (path, frame) in FileFrameSource::new(images, rotation, releases.clone()) {
            let Some(pending) = analyzer.analyze(frame) else {
                println!("{}: could not read image", path.display());
                continue;
            };

            match pending.await {
                Ok(DecodeOutcome::Found(symbols)) => {
                    for symbol in symbols {
                        println!("{}: {}: {}", path.display(), symbol.format, symbol.display_value);
                    }
                }
                Ok(DecodeOutcome::Empty) => println!("{}: no barcode", path.display()),
                Ok(DecodeOutcome::Failed(e)) => println!("{}: error: {}", path.display(), e),
                Err(e) => println!("{}: error: {}", path.display(), e),
            }
            println!("  zoom {:.1}x", zoom.current());
        }
    });

    Ok(())
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Device: {}", camera.path);

        let zoom = ControlDevice::open(&camera.path)
            .and_then(|device| device.query(V4L2_CID_ZOOM_ABSOLUTE))
            .ok()
            .filter(|info| !info.is_disabled());
        match zoom {
            Some(info) => println!("      Zoom:   {}..{} (step {})", info.minimum, info.maximum, info.step),
            None => println!("      Zoom:   digital only"),
        }
        println!();
    }

    Ok(())
}

/// Print the effective config, optionally saving it
pub fn show_config(
    config: &Config,
    save: bool,
    path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        let path = path
            .or_else(Config::default_path)
            .ok_or("no config directory available")?;
        config.save(&path)?;
        println!("Saved to {}", path.display());
    }

    Ok(())
}
