//! Headless viewer: drives a controller against a recording surface and logs
//! what a renderer would show.

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use life3d_viewer::prelude::*;

fn print_help() {
    println!("life3d-viewer - headless 3D Life viewer");
    println!();
    println!("Usage:");
    println!("  life3d-viewer local [size] [pattern] [seconds]   animate an in-process universe");
    println!("  life3d-viewer stream [origin] [seconds]          render snapshots from lifed");
    println!();
    println!("LIFE3D_VIEWER_CONFIG points at an optional JSON config file.");
}

fn load_config() -> Result<ViewerConfig> {
    match std::env::var_os("LIFE3D_VIEWER_CONFIG") {
        Some(path) => ViewerConfig::load(&PathBuf::from(path)),
        None => Ok(ViewerConfig::default()),
    }
}

fn log_status(viewer: &SyncController, surface: &RecordingSurface) {
    let status = viewer.status();
    info!(
        state = %status.state,
        generation = status.generation,
        population = status.population,
        visible = surface.visible,
        fps = status.fps,
        connection = ?status.connection,
        error = status.last_error.as_deref().unwrap_or(""),
        "frame"
    );
}

/// Presents at the configured rate for `seconds`, logging once a second.
async fn present_loop(
    viewer: &mut SyncController,
    seconds: u64,
    on_refresh: impl Fn(&mut SyncController),
) {
    let fps = viewer.config().fps.max(1);
    let mut refresh = tokio::time::interval(Duration::from_millis(1000 / fps as u64));
    let mut surface = RecordingSurface::default();
    for frame in 0..seconds * fps as u64 {
        refresh.tick().await;
        on_refresh(viewer);
        viewer.present(&mut surface);
        if frame % fps as u64 == 0 {
            log_status(viewer, &surface);
        }
    }
}

async fn run_local(config: ViewerConfig, size: u32, pattern: &str, seconds: u64) -> Result<()> {
    let mut viewer = SyncController::local(
        local_engine(Rule::B6_S567),
        RenderProjector::new(1),
        config,
    );
    viewer.initialize(Dimensions::cube(size)?).await?;
    viewer.load_pattern_centered(pattern).await?;
    viewer.toggle_animation().await?;
    present_loop(&mut viewer, seconds, |_| {}).await;
    viewer.dispose();
    Ok(())
}

async fn run_stream(config: ViewerConfig, origin: &str, seconds: u64) -> Result<()> {
    let url = stream_url(origin, &config.stream_path)?;
    info!(%url, "connecting");
    let channel = StreamChannel::connect(url, WsConnector, (), config.reconnect_delay());
    let mut viewer = SyncController::streaming(channel, RenderProjector::new(1), config);
    present_loop(&mut viewer, seconds, |viewer| {
        viewer.render_tick();
    })
    .await;
    viewer.dispose();
    Ok(())
}

fn parse_or<T: std::str::FromStr>(arg: Option<&String>, default: T, what: &str) -> T {
    match arg {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            eprintln!("Invalid {what}: {s}");
            std::process::exit(2);
        }),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = load_config()?;
    let local = LocalSet::new();

    match args.get(1).map(String::as_str) {
        None | Some("local") => {
            let size = parse_or(args.get(2), config.initial_size, "size");
            let pattern = args.get(3).map(String::as_str).unwrap_or("glider");
            let seconds = parse_or(args.get(4), 5u64, "duration");
            local
                .run_until(run_local(config, size, pattern, seconds))
                .await?;
        }
        Some("stream") => {
            let origin = args
                .get(2)
                .map(String::as_str)
                .unwrap_or("http://127.0.0.1:8080");
            let seconds = parse_or(args.get(3), 10u64, "duration");
            local.run_until(run_stream(config, origin, seconds)).await?;
        }
        Some("--help" | "-h" | "help") => print_help(),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    }
    Ok(())
}
