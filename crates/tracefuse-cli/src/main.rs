//! tracefuse: CLI for decomposing path data and exercising endpoint
//! snapping and fusion.
//!
//! Loads a path into a draw session (running its compute host on a
//! background thread), then optionally runs nearest-endpoint lookups and
//! endpoint drags against it. Useful for:
//!
//! - Checking how artwork decomposes into fragments and shared endpoints
//! - Tuning attach distance and marker sizes at different zoom levels
//! - Reproducing merge behavior when one endpoint is dropped on another
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin tracefuse -- [OPTIONS] [PATH_DATA]
//! ```
//!
//! Set `RUST_LOG=debug` to see per-request timings from the host.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::cell::RefCell;
use std::fmt::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracefuse_core::{
    Bucket, EndpointFusion, Point, Scale, SessionConfig, SpatialEndpointIndex, decompose_path,
};
use tracefuse_host::{
    DrawSessionController, HostError, InitPathResponse, NearestResponse, PathSpec,
};
use tracing_subscriber::EnvFilter;

/// Decompose path data into fragments and query their endpoints.
///
/// Path data is taken from the positional argument or `--file`.
#[derive(Parser)]
#[command(name = "tracefuse", version)]
struct Cli {
    /// Path data (`M L H V C S Q T A Z`).
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    path_data: Option<String>,

    /// Read path data from a file instead.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Transform list applied before decomposition, e.g. `"translate(10 0) scale(2)"`.
    #[arg(long)]
    transform: Option<String>,

    /// View zoom factor.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Find the nearest endpoint to X Y. May be repeated.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    nearest: Vec<f64>,

    /// Drag the endpoint nearest FROM_X FROM_Y and drop it at TO_X TO_Y.
    /// May be repeated; drags run after lookups.
    #[arg(
        long,
        num_args = 4,
        value_names = ["FROM_X", "FROM_Y", "TO_X", "TO_Y"],
        allow_negative_numbers = true
    )]
    drag: Vec<f64>,

    /// Snap distance in screen units.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_ATTACH_DISTANCE)]
    attach_distance: f64,

    /// Minimum spacing between clicks in screen units.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_MIN_POINT_SPACING)]
    min_point_spacing: f64,

    /// Endpoint marker radius in screen units.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_MARKER_RADIUS)]
    marker_radius: f64,

    /// Outline stroke width in screen units.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_OUTLINE_WIDTH)]
    outline_width: f64,

    /// Hit-test overlay stroke width in screen units.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_HIT_WIDTH)]
    hit_width: f64,

    /// Buckets scanned between inbox checks during a lookup.
    #[arg(long, default_value_t = SessionConfig::DEFAULT_SCAN_CHUNK, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    scan_chunk: usize,

    /// Write an SVG of the final fragments and endpoints to this file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Output the report as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Full session config as a JSON string.
    ///
    /// When provided, all other config flags are ignored.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`SessionConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual config flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SessionConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        SessionConfig {
            attach_distance: cli.attach_distance,
            min_point_spacing: cli.min_point_spacing,
            marker_radius: cli.marker_radius,
            outline_width: cli.outline_width,
            hit_width: cli.hit_width,
            scan_chunk: cli.scan_chunk,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn path_data_from_cli(cli: &Cli) -> Result<String, String> {
    match (&cli.path_data, &cli.file) {
        (Some(data), _) => Ok(data.clone()),
        (None, Some(file)) => std::fs::read_to_string(file)
            .map_err(|e| format!("Error reading {}: {e}", file.display())),
        (None, None) => Err("no path data given".to_owned()),
    }
}

/// A lookup and its answer.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Lookup {
    cursor: [f64; 2],
    #[serde(flatten)]
    response: NearestResponse,
}

/// A drag and whether it found an endpoint to move.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Drag {
    from: [f64; 2],
    to: [f64; 2],
    moved: Option<[f64; 2]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde(flatten)]
    loaded: InitPathResponse,
    lookups: Vec<Lookup>,
    drags: Vec<Drag>,
    /// Marker layer after all drags.
    final_endpoint_marker_markup: String,
}

impl Report {
    fn text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Fragments: {}", self.loaded.fragments.len());
        for fragment in &self.loaded.fragments {
            let points: Vec<String> = fragment
                .points()
                .iter()
                .map(|p| format!("({}, {})", p.x, p.y))
                .collect();
            let _ = writeln!(
                out,
                "  #{} {:?}{} {}",
                fragment.id(),
                fragment.kind(),
                if fragment.is_closed() { " (close)" } else { "" },
                points.join(" "),
            );
        }
        for lookup in &self.lookups {
            let [x, y] = lookup.cursor;
            let distance = lookup.response.distance;
            if let Some(point) = &lookup.response.nearest_point {
                let owners: Vec<String> = point
                    .owners
                    .iter()
                    .map(|(fragment, role)| format!("{fragment}:{role}"))
                    .collect();
                let [px, py] = point.coordinate;
                let _ = writeln!(
                    out,
                    "Nearest to ({x}, {y}): ({px}, {py}) at {distance:.5} [{}]",
                    owners.join(", "),
                );
            } else {
                let _ = writeln!(out, "Nearest to ({x}, {y}): nothing within {distance:.5}");
            }
        }
        for drag in &self.drags {
            let [fx, fy] = drag.from;
            let [tx, ty] = drag.to;
            if let Some([mx, my]) = drag.moved {
                let _ = writeln!(
                    out,
                    "Drag ({fx}, {fy}) -> ({tx}, {ty}): moved endpoint at ({mx}, {my})"
                );
            } else {
                let _ = writeln!(out, "Drag ({fx}, {fy}) -> ({tx}, {ty}): no endpoint in reach");
            }
        }
        let _ = write!(
            out,
            "Endpoint markers: {}",
            self.final_endpoint_marker_markup.matches("<circle").count()
        );
        out
    }
}

/// Poll `session` until `slot` is filled.
fn wait<T>(
    session: &mut DrawSessionController,
    slot: &Rc<RefCell<Option<T>>>,
) -> Result<T, HostError> {
    loop {
        session.poll()?;
        if let Some(value) = slot.borrow_mut().take() {
            return Ok(value);
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn slot<T>() -> (Rc<RefCell<Option<T>>>, impl FnOnce(T) + 'static)
where
    T: 'static,
{
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    (slot, move |value| *sink.borrow_mut() = Some(value))
}

/// Run every requested operation through a fresh draw session.
fn run(
    cli: &Cli,
    config: &SessionConfig,
    spec: PathSpec,
    local: &mut SpatialEndpointIndex,
) -> Result<Report, HostError> {
    let mut session = DrawSessionController::new(config.clone())?;

    let (loaded, on_loaded) = slot::<InitPathResponse>();
    session.init_path(spec, on_loaded)?;
    let loaded = wait(&mut session, &loaded)?;

    let mut lookups = Vec::new();
    for pair in cli.nearest.chunks_exact(2) {
        let (answer, on_answer) = slot::<NearestResponse>();
        session.find_nearest_point(pair[0], pair[1], on_answer)?;
        lookups.push(Lookup {
            cursor: [pair[0], pair[1]],
            response: wait(&mut session, &answer)?,
        });
    }

    let mut drags = Vec::new();
    for quad in cli.drag.chunks_exact(4) {
        let (answer, on_answer) = slot::<NearestResponse>();
        session.find_nearest_point(quad[0], quad[1], on_answer)?;
        let origin = wait(&mut session, &answer)?.nearest_point;
        let moved = origin.as_ref().map(|o| o.coordinate);
        if let Some(origin) = origin {
            // Mirror the fusion locally so the SVG reflects it.
            EndpointFusion::fuse(local, &Bucket::from(&origin), Point::new(quad[2], quad[3]));
            session.update_end_point(origin, quad[2], quad[3])?;
        }
        drags.push(Drag {
            from: [quad[0], quad[1]],
            to: [quad[2], quad[3]],
            moved,
        });
    }

    let (markup, on_markup) = slot::<String>();
    session.render_endpoints(on_markup)?;
    let final_endpoint_marker_markup = wait(&mut session, &markup)?;
    session.terminate();

    Ok(Report {
        loaded,
        lookups,
        drags,
        final_endpoint_marker_markup,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let scale = match Scale::new(cli.scale) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let path_data = match path_data_from_cli(&cli) {
        Ok(data) => data,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let spec = PathSpec {
        transform: cli.transform.clone(),
        path: path_data,
        scale,
    };
    let mut local = SpatialEndpointIndex::new();
    let fragments = decompose_path(&spec.path, spec.transform.as_deref(), &mut local);

    let report = match run(&cli, &config, spec, &mut local) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Session error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", report.text());
    }

    if let Some(ref svg_path) = cli.svg {
        let svg = tracefuse_markup::to_svg_document(&fragments, &local, scale, &config);
        match std::fs::write(svg_path, &svg) {
            Ok(()) => {
                eprintln!("SVG written to {} ({} bytes)", svg_path.display(), svg.len());
            }
            Err(e) => {
                eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
