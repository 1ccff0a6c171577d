use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use drift_core::config::{AppConfig, FrameEffect};
use drift_core::types::{MontageFormat, RunId, WalkPlan, WalkRequest};
use drift_engine::session::{WalkResult, WalkStage};
use drift_runtime::ConfigStore;
use drift_runtime::defaults::{DEFAULT_STOPS, default_config_path, output_path};
use drift_runtime::secrets::load_dotenv;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Video,
    Frames,
}

impl From<FormatArg> for MontageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Video => MontageFormat::Video,
            FormatArg::Frames => MontageFormat::Frames,
        }
    }
}

/// Ask a language model for a walk through a city and turn it into a
/// narrated street-view montage.
#[derive(Debug, Parser)]
#[command(name = "drift", version)]
struct Cli {
    /// City to drift through
    #[arg(long, required_unless_present = "write_config")]
    city: Option<String>,

    /// Mood or theme for the walk
    #[arg(long)]
    theme: Option<String>,

    /// Number of stops to ask for
    #[arg(long, default_value_t = DEFAULT_STOPS)]
    stops: usize,

    /// Video file or frame directory (default: drift-<run>.mp4 / drift-<run>/)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output kind; overrides the config file
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// JSON config file (default: ./drift.json if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip speech synthesis
    #[arg(long)]
    no_narration: bool,

    /// Apply the psychedelic frame effect
    #[arg(long)]
    psychedelic: bool,

    /// Also render the walking route to this PNG
    #[arg(long, value_name = "PNG")]
    route_map: Option<PathBuf>,

    /// Parallel fetches across stops
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print each stop's narration as well as its name
    #[arg(long)]
    print_plan: bool,

    /// Save the effective config (file plus flags) to FILE and exit
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, cfg: &mut AppConfig) {
        if let Some(format) = self.format {
            cfg.montage.format = format.into();
        }
        if self.no_narration {
            cfg.speech.enabled = false;
        }
        if self.psychedelic {
            cfg.montage.effect = FrameEffect::Psychedelic;
        }
        if let Some(n) = self.concurrency {
            cfg.fetch_concurrency = n.max(1);
        }
    }

    fn request(&self) -> anyhow::Result<WalkRequest> {
        let city = self.city.as_deref().context("--city is required")?;
        let req = WalkRequest::new(city.trim(), self.stops);
        Ok(match &self.theme {
            Some(theme) => req.with_theme(theme.as_str()),
            None => req,
        })
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut cfg = match &cli.config {
        Some(path) => ConfigStore::at_path(path).load()?,
        None => ConfigStore::at_path(default_config_path()).load_or_default()?,
    };
    cli.apply_overrides(&mut cfg);
    Ok(cfg)
}

fn print_plan(plan: &WalkPlan, with_narration: bool) {
    if let Some(title) = &plan.title {
        println!("{title}");
    }
    if with_narration {
        if let Some(intro) = &plan.intro {
            println!("  {intro}");
        }
    }
    for (i, w) in plan.waypoints.iter().enumerate() {
        match w.location {
            Some(p) => println!("{:>2}. {} ({p})", i + 1, w.name),
            None => println!("{:>2}. {}", i + 1, w.name),
        }
        if with_narration {
            if let Some(n) = &w.narration {
                println!("    {n}");
            }
        }
    }
}

fn print_summary(result: &WalkResult) {
    let c = &result.counts;
    println!(
        "images: {} fetched, {} missing; narration: {} ok, {} failed",
        c.images_fetched, c.images_missing, c.narrations_ok, c.narrations_failed
    );
    let t = &result.timings;
    println!(
        "timings: llm={:?}ms resolve={:?}ms images={:?}ms narration={:?}ms assembly={:?}ms",
        t.completion_ms, t.resolve_ms, t.images_ms, t.narration_ms, t.assembly_ms
    );
    if let Some(m) = &result.montage {
        println!(
            "montage: {} ({} scenes, {} frames, {:.1}s, {})",
            m.path.display(),
            m.scenes,
            m.frames,
            m.duration_secs,
            if m.has_audio { "narrated" } else { "silent" }
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    if let Some(path) = &cli.write_config {
        ConfigStore::at_path(path).save(&cfg)?;
        println!("config: {}", path.display());
        return Ok(());
    }
    let request = cli.request()?;

    let run = RunId::new();
    let output = output_path(cli.output.clone(), cfg.montage.format, &run);
    log::info!(
        "run {}: {} stops through {} -> {}",
        run.short(),
        request.stops,
        request.city,
        output.display()
    );

    let engine = drift_runtime::build_engine_from_config(&cfg, cli.route_map.is_some())?;
    let result = engine
        .run_walk_with_hook(request, &output, |stage| async move {
            eprintln!("[drift] {stage}");
        })
        .await?;

    print_plan(&result.plan, cli.print_plan);

    if let (Some(path), Some(png)) = (&cli.route_map, &result.route_map_png) {
        tokio::fs::write(path, png).await?;
        println!("route map: {}", path.display());
    } else if cli.route_map.is_some() {
        log::warn!("no route map was rendered (fewer than two located stops?)");
    }

    print_summary(&result);

    if result.stage == WalkStage::Failed {
        anyhow::bail!(
            "montage assembly failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
