use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, LevelFilter, Metadata, Record};
use serde_json::{Map, Value};
use textwall_render::{EffectParams, GlyphGrid, PixelCanvas, TextWall};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(author, version, about = "Render animated text-wall effects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play the effect in the terminal
    Preview(PreviewArgs),
    /// Write a sequence of plain-text frames to disk
    Render(RenderArgs),
    /// Save a single frame as a PNG
    Snapshot(SnapshotArgs),
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Number of frames to play
    #[arg(long, default_value_t = 1)]
    frames: u32,
    /// Playback rate
    #[arg(long, default_value_t = 30.0)]
    fps: f32,
    /// Print characters only, without color escapes
    #[arg(long, default_value_t = false)]
    plain: bool,
    #[command(flatten)]
    settings: RenderSettings,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Output directory for frame files
    #[arg(short, long)]
    out_dir: PathBuf,
    #[arg(long, default_value_t = 60)]
    frames: u32,
    /// Frame rate used to timestamp the frames
    #[arg(long, default_value_t = 30.0)]
    fps: f32,
    #[command(flatten)]
    settings: RenderSettings,
}

#[derive(Parser, Debug)]
struct SnapshotArgs {
    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,
    /// Timestamp of the captured frame in milliseconds
    #[arg(long, default_value_t = 2000.0)]
    at_ms: f64,
    /// Frame rate used to run the effect up to the timestamp
    #[arg(long, default_value_t = 30.0)]
    fps: f32,
    #[command(flatten)]
    settings: RenderSettings,
}

#[derive(Parser, Debug, Clone)]
struct RenderSettings {
    /// Effect variant; selects the parameter preset
    #[arg(long, value_enum)]
    variant: Option<VariantChoice>,
    /// TOML file with effect parameters
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Viewport width in pixels
    #[arg(long)]
    width: Option<f32>,
    /// Viewport height in pixels
    #[arg(long)]
    height: Option<f32>,
    /// Cell edge in pixels
    #[arg(long)]
    cell_size: Option<f32>,
    /// Highlighted phrase; `\n` starts a new line
    #[arg(long)]
    text: Option<String>,
    /// Character script for random fill
    #[arg(long)]
    script: Option<String>,
    /// Directory of text files used as the fixed fill, read in path order
    #[arg(long)]
    sources_dir: Option<PathBuf>,
    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum, env = "TEXTWALL_LOG", default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum VariantChoice {
    Shimmer,
    Sweep,
    Rain,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => preview(args),
        Commands::Render(args) => render(args),
        Commands::Snapshot(args) => snapshot(args),
    }
}

fn preview(args: PreviewArgs) -> Result<()> {
    let mut wall = args.settings.build_wall()?;
    let mut surface = GlyphGrid::blank(0, 0);
    let interval = frame_interval_ms(args.fps);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for index in 0..args.frames.max(1) {
        wall.frame(f64::from(index) * interval, &mut surface);
        if args.frames > 1 {
            write!(out, "\x1b[H\x1b[2J")?;
        }
        if args.plain {
            for row in surface.rows() {
                writeln!(out, "{}", row)?;
            }
        } else {
            for row in surface.ansi_rows() {
                writeln!(out, "{}", row)?;
            }
        }
        out.flush()?;

        if index + 1 < args.frames {
            thread::sleep(Duration::from_secs_f64(interval / 1000.0));
        }
    }

    Ok(())
}

fn render(args: RenderArgs) -> Result<()> {
    let mut wall = args.settings.build_wall()?;
    let mut surface = GlyphGrid::blank(0, 0);
    let interval = frame_interval_ms(args.fps);
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create output directory {:?}", args.out_dir))?;

    let progress = ProgressBar::new(u64::from(args.frames));
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames")?
            .progress_chars("=> "),
    );

    for index in 0..args.frames {
        wall.frame(f64::from(index) * interval, &mut surface);

        let frame_path = args.out_dir.join(format!("frame_{:04}.txt", index));
        let mut file =
            File::create(&frame_path).with_context(|| format!("failed to create {:?}", frame_path))?;
        for row in surface.rows() {
            writeln!(file, "{}", row)?;
        }
        progress.inc(1);
    }

    progress.finish_with_message(format!("Frames written to {:?} (fps {:.2})", args.out_dir, args.fps));
    Ok(())
}

fn snapshot(args: SnapshotArgs) -> Result<()> {
    let mut wall = args.settings.build_wall()?;
    let cell_px = wall.params().cell_size.round() as u32;
    let mut canvas = PixelCanvas::new(0, 0, cell_px);
    let interval = frame_interval_ms(args.fps);

    let mut now = 0.0;
    while now < args.at_ms {
        wall.frame(now, &mut canvas);
        now += interval;
    }
    wall.frame(args.at_ms, &mut canvas);

    canvas.save_png(&args.output).with_context(|| format!("failed to write {:?}", args.output))?;
    info!("snapshot at {} ms written to {:?}", args.at_ms, args.output);
    Ok(())
}

fn frame_interval_ms(fps: f32) -> f64 {
    1000.0 / f64::from(fps.max(1.0))
}

impl RenderSettings {
    fn build_wall(&self) -> Result<TextWall> {
        init_logging(self.log_level.to_filter())?;
        let params = self.to_params()?;
        debug!("effect parameters: {:?}", params);
        Ok(TextWall::new(params, self.seed))
    }

    /// Layers the flags over the config file, if any.
    fn to_params(&self) -> Result<EffectParams> {
        let mut bag = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
                let value: Value = toml::from_str(&text).with_context(|| format!("failed to parse {:?}", path))?;
                match value {
                    Value::Object(map) => map,
                    _ => anyhow::bail!("config {:?} is not a table", path),
                }
            },
            None => Map::new(),
        };

        if let Some(variant) = self.variant {
            bag.insert("variant".into(), Value::from(variant.name()));
        }
        if let Some(width) = self.width {
            bag.insert("viewport_width".into(), Value::from(width));
        }
        if let Some(height) = self.height {
            bag.insert("viewport_height".into(), Value::from(height));
        }
        if let Some(cell_size) = self.cell_size {
            bag.insert("cell_size".into(), Value::from(cell_size));
        }
        if let Some(text) = &self.text {
            bag.insert("highlight_text".into(), Value::from(text.as_str()));
        }
        if let Some(script) = &self.script {
            bag.insert("script".into(), Value::from(script.as_str()));
        }
        if let Some(dir) = &self.sources_dir {
            let sources = load_sources(dir)?;
            bag.insert("fill_mode".into(), Value::from("fixed"));
            bag.insert("sources".into(), Value::from(sources));
        }

        EffectParams::from_value(&Value::Object(bag)).context("invalid effect parameters")
    }
}

impl VariantChoice {
    fn name(self) -> &'static str {
        match self {
            VariantChoice::Shimmer => "shimmer",
            VariantChoice::Sweep => "sweep",
            VariantChoice::Rain => "rain",
        }
    }
}

impl LogLevel {
    fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn load_sources(path: &Path) -> Result<Vec<String>> {
    let mut entries: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect();
    entries.sort();
    if entries.is_empty() {
        anyhow::bail!("no source files found in {:?}", path);
    }

    let mut sources = Vec::with_capacity(entries.len());
    for entry in entries {
        let text = fs::read_to_string(&entry).with_context(|| format!("failed to read {:?}", entry))?;
        sources.push(text);
    }
    Ok(sources)
}

/// Writes library and CLI log records to stderr.
struct StderrLogger {
    level: LevelFilter,
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("textwall")
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _ = writeln!(io::stderr(), "[{:<5}] [{}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

fn init_logging(level: LevelFilter) -> Result<()> {
    log::set_boxed_logger(Box::new(StderrLogger { level }))
        .map(|()| log::set_max_level(level))
        .context("failed to install logger")
}
