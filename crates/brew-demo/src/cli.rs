use std::io::Write;
use std::path::{Path, PathBuf};

use brew_core::charts::format_share;
use brew_core::{BrewConfig, ProfileTable};
use brew_runtime::{RecordingAudio, Session};
use clap::{Args, Parser, Subcommand};

use crate::error::{DemoError, Result};
use crate::logging;
use crate::script::{Pacing, Script, ScriptName, replay};

#[derive(Debug, Parser)]
#[command(
    name = "brew-demo",
    about = "Headless host for the Brew Logic presentation engine",
    version
)]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Log engine internals at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a scripted interaction and print what happened.
    Run(RunArgs),

    /// Print the item profile table.
    Profiles(SourceArgs),

    /// Validate a configuration file and print the effective timing.
    #[command(name = "check-config")]
    CheckConfig {
        /// TOML or JSON configuration file.
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// TOML or JSON engine configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// TOML or JSON profile table replacing the built-in menu.
    #[arg(long)]
    pub profiles: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Script to replay.
    #[arg(long, value_enum, default_value_t = ScriptName::Tour)]
    pub script: ScriptName,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Pace virtual time against the wall clock.
    #[arg(long)]
    pub realtime: bool,

    /// Wall-clock speed-up when pacing in real time.
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs, cli.verbose)?;
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Run(args) => run_script(&args, &mut out),
        Commands::Profiles(source) => print_profiles(&source, &mut out),
        Commands::CheckConfig { path } => check_config(&path, &mut out),
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Load configuration from `path`, picking the format by extension.
pub fn load_config(path: Option<&Path>) -> Result<BrewConfig> {
    let Some(path) = path else {
        return Ok(BrewConfig::default());
    };
    match extension(path) {
        Some("toml") => Ok(BrewConfig::from_toml_file(path)?),
        Some("json") => Ok(BrewConfig::from_json_str(&std::fs::read_to_string(path)?)?),
        _ => Err(DemoError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load a profile table from `path`, or the built-in menu.
pub fn load_profiles(path: Option<&Path>) -> Result<ProfileTable> {
    let Some(path) = path else {
        return Ok(ProfileTable::builtin());
    };
    let content = std::fs::read_to_string(path)?;
    match extension(path) {
        Some("toml") => Ok(ProfileTable::from_toml_str(&content)?),
        Some("json") => Ok(ProfileTable::from_json_str(&content)?),
        _ => Err(DemoError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn run_script(args: &RunArgs, out: &mut impl Write) -> Result<()> {
    if !(args.speed.is_finite() && args.speed > 0.0) {
        return Err(DemoError::invalid(format!(
            "speed must be a positive number, got {}",
            args.speed
        )));
    }
    let config = load_config(args.source.config.as_deref())?;
    let profiles = load_profiles(args.source.profiles.as_deref())?;
    tracing::info!(target: "brew.demo", config = %config.to_jsonl(), items = profiles.len(), "session config");

    let frame = config.overlay.frame_interval();
    let (audio, log) = RecordingAudio::new();
    let mut session = Session::new(config, profiles, Box::new(audio));
    session.load();

    let pacing = if args.realtime {
        Pacing::Realtime {
            speed: args.speed,
            frame,
        }
    } else {
        Pacing::Instant
    };
    let script = Script::builtin(args.script);
    let report = replay(&mut session, &script, pacing);
    session.teardown();

    if args.json {
        let mut value = report.to_json();
        value["audio_calls"] = serde_json::Value::from(log.calls().len());
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(out, "script        {}", report.script)?;
        writeln!(out, "ended at      {} ms", report.end.as_millis())?;
        writeln!(out, "active panel  {}", report.active_panel)?;
        for (item, readout) in &report.completions {
            writeln!(out, "poured        {item} -> {readout}")?;
        }
        writeln!(out, "fill height   {:.3}", report.fill_height)?;
        writeln!(
            out,
            "overlay       {}",
            report.overlay_source.as_deref().unwrap_or("hidden")
        )?;
        writeln!(out, "audio calls   {}", log.calls().len())?;
    }
    Ok(())
}

fn print_profiles(source: &SourceArgs, out: &mut impl Write) -> Result<()> {
    let config = load_config(source.config.as_deref())?;
    let profiles = load_profiles(source.profiles.as_deref())?;
    writeln!(out, "{:<12} {:>7} {:>7} {:>9} {:>5}", "item", "share", "fill", "peak", "favs")?;
    for (id, profile) in profiles.iter() {
        writeln!(
            out,
            "{:<12} {:>7} {:>7.2} {:>9} {:>5}",
            id,
            format_share(profile.sales_share),
            config.pour.fill_height(profile.sales_share),
            profile.peak_period().unwrap_or("-"),
            profile.favorite_count,
        )?;
    }
    Ok(())
}

fn check_config(path: &Path, out: &mut impl Write) -> Result<()> {
    let config = load_config(Some(path))?;
    let t = &config.timing;
    writeln!(out, "ok: {}", path.display())?;
    writeln!(
        out,
        "pour window {} ms = lead-in {} ms + streams..finish {} ms (fill {} ms)",
        t.cue_clip_ms,
        t.pre_drip_delay_ms,
        t.finish_offset().as_millis(),
        t.fill_duration().as_millis(),
    )?;
    writeln!(out, "{}", config.to_jsonl())?;
    Ok(())
}
