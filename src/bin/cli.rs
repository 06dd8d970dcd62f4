//! CLI client for the face-detection service.
//!
//! Usage:
//!   facedetect <image>                      # Human-readable results table
//!   facedetect --sample group --json        # JSON output
//!   facedetect <image> --annotate out.png   # Save the preview with face boxes
//!   facedetect --check                      # Check the API and exit

use clap::Parser;
use facedetect_client::{
    ApiStatus, Config, Preset, Readout, RetainedView, SampleLocation, Session, Size, TableRow,
    ViewState, NO_FACES,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "facedetect")]
#[command(author, version, about = "Detect faces through a remote face-detection service", long_about = None)]
struct Args {
    /// Input image file
    #[arg(required_unless_present_any = ["sample", "check"], conflicts_with = "sample")]
    image: Option<PathBuf>,

    /// Use a bundled sample instead of a file (portrait, group, family)
    #[arg(long)]
    sample: Option<String>,

    /// Base URL of the detection API
    #[arg(long, env = "FACE_DETECT_API_URL")]
    api_url: Option<String>,

    /// Directory holding the bundled samples
    #[arg(long, conflicts_with = "samples_url")]
    samples_dir: Option<PathBuf>,

    /// Base URL serving the bundled samples
    #[arg(long)]
    samples_url: Option<String>,

    /// Parameter preset applied before any explicit value (accuracy, balanced, speed)
    #[arg(long)]
    preset: Option<Preset>,

    /// Minimum face size in pixels
    #[arg(long)]
    min_size: Option<u32>,

    /// Pyramid scale factor (> 1.0)
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Neighbours required to keep a detection
    #[arg(long)]
    min_neighbors: Option<u32>,

    /// Displayed width for the overlay (default: natural width)
    #[arg(long, requires = "display_height")]
    display_width: Option<u32>,

    /// Displayed height for the overlay (default: natural height)
    #[arg(long, requires = "display_width")]
    display_height: Option<u32>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the displayed image with the face overlay as PNG
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// Only check whether the API is reachable
    #[arg(long)]
    check: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    image: String,
    width: u32,
    height: u32,
    file_size: String,
    state: ViewState,
    parameters: ParametersOutput,
    face_count: String,
    processing_time: String,
    faces: Vec<TableRow>,
}

#[derive(Serialize)]
struct ParametersOutput {
    min_size: u32,
    scale_factor: f64,
    min_neighbors: u32,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config(args: &Args) -> Config {
    let mut config = Config::from_env();
    if let Some(ref url) = args.api_url {
        config = config.with_api_base_url(url.clone());
    }
    if let Some(ref dir) = args.samples_dir {
        config.samples = SampleLocation::Dir(dir.clone());
    } else if let Some(ref url) = args.samples_url {
        config.samples = SampleLocation::parse(url);
    }
    config
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = config(args);
    let mut session = Session::connect(&config, RetainedView::new())?;

    if args.check {
        let status = session.check_api_status();
        println!("{}: {}", config.api_base_url, status.label());
        return match status {
            ApiStatus::Online => Ok(()),
            ApiStatus::Offline(reason) => Err(reason.into()),
            other => Err(other.label().into()),
        };
    }

    if let Some(preset) = args.preset {
        session.apply_preset(preset);
    }
    if let Some(min_size) = args.min_size {
        session.set_min_size(min_size);
    }
    if let Some(scale_factor) = args.scale_factor {
        session.set_scale_factor(scale_factor);
    }
    if let Some(min_neighbors) = args.min_neighbors {
        session.set_min_neighbors(min_neighbors);
    }

    match (&args.image, &args.sample) {
        (Some(path), _) => session.select_path(path)?,
        (None, Some(name)) => session.load_sample(name)?,
        (None, None) => return Err("no image given".into()),
    }

    let (name, natural) = match session.asset() {
        Some(asset) => (asset.name.clone(), asset.natural_size()),
        None => return Err("no image loaded".into()),
    };
    let display = match (args.display_width, args.display_height) {
        (Some(width), Some(height)) => Size::new(width, height),
        _ => natural,
    };
    session.set_display_size(display);

    if args.verbose {
        eprintln!(
            "Detecting faces in {} via {}...",
            name,
            session.client().detect_url()
        );
    }
    session.detect()?;

    let view = session.view();
    let params = session.params();
    let readout = |r: Readout| view.readout(r).unwrap_or_default().to_string();
    let output = Output {
        image: name,
        width: natural.width,
        height: natural.height,
        file_size: readout(Readout::FileSize),
        state: view.state(),
        parameters: ParametersOutput {
            min_size: params.min_size,
            scale_factor: params.scale_factor,
            min_neighbors: params.min_neighbors,
        },
        face_count: readout(Readout::FaceCount),
        processing_time: readout(Readout::ProcessingTime),
        faces: view
            .rows()
            .iter()
            .filter(|row| matches!(row, TableRow::Face { .. }))
            .cloned()
            .collect(),
    };

    if let Some(ref path) = args.annotate {
        let annotated = view.composite().ok_or("nothing to annotate")?;
        annotated.save(path)?;
        if args.verbose {
            eprintln!("Annotated image written to {:?}", path);
        }
    }

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        if args.verbose {
            eprintln!("Output written to {:?}", path);
        }
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!(
        "Image: {} ({}x{}, {})\n",
        output.image, output.width, output.height, output.file_size
    ));
    s.push_str(&format!(
        "Parameters: minSize={} scaleFactor={:.2} minNeighbors={}\n",
        output.parameters.min_size, output.parameters.scale_factor, output.parameters.min_neighbors
    ));
    s.push_str(&format!("Faces detected: {}\n", output.face_count));
    s.push_str(&format!("Processing time: {}\n", output.processing_time));
    s.push('\n');

    if output.faces.is_empty() {
        s.push_str(NO_FACES);
        s.push('\n');
        return s;
    }

    s.push_str(&TableRow::HEADERS.join("\t"));
    s.push('\n');
    for row in &output.faces {
        s.push_str(&row.cells().join("\t"));
        s.push('\n');
    }

    s
}
