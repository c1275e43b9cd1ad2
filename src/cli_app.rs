//! Top-level CLI definition and dispatch.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;

use crate::audio::{CommandSampler, parse_max_amplitude};
use crate::cli::install::{
    InstallOptions, UninstallOptions, format_install_report, format_uninstall_report,
    run_install_sequence, run_uninstall_cleanup,
};
use crate::core::config::{Config, DEFAULT_CONFIG_PATH, MonitorOverrides};
use crate::core::errors::{NoisedError, Result};
use crate::core::preflight;
use crate::daemon::loop_main::{BANNER_TIME_FORMAT, RunState, exceeds_threshold};
use crate::daemon::service::run_monitor;
use crate::daemon::signals::SignalGuard;
use crate::daemon::supervisor::{LaunchSpec, Supervisor};
use crate::logger;

/// Noise detector: samples a microphone and pushes an alert when it gets loud.
#[derive(Parser)]
#[command(name = "noised", version, about)]
pub struct Cli {
    /// Configuration file (default: /etc/noised/config.toml when present).
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Monitor settings that override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct MonitorArgs {
    /// Sound card id of the microphone.
    #[arg(short = 'm', long, value_name = "SOUND_CARD_ID")]
    pub microphone: Option<String>,
    /// Sample duration in seconds.
    #[arg(short = 's', long = "sample", value_name = "SECONDS")]
    pub sample: Option<u32>,
    /// Activation noise threshold in (0, 1], e.g. 0.1.
    #[arg(short = 'n', long, value_name = "NOISE_THRESHOLD")]
    pub threshold: Option<f64>,
    /// Alert destination (notification user key).
    #[arg(short = 'e', long, visible_alias = "email", value_name = "DESTINATION")]
    pub destination: Option<String>,
    /// Log configuration and every reading.
    #[arg(short, long)]
    pub verbose: bool,
}

impl MonitorArgs {
    fn overrides(&self) -> MonitorOverrides {
        MonitorOverrides {
            microphone: self.microphone.clone(),
            sample_secs: self.sample,
            threshold: self.threshold,
            destination: self.destination.clone(),
            verbose: self.verbose,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Start the monitor in the background.
    Start(MonitorArgs),
    /// Stop the background monitor.
    Stop,
    /// Ask the background monitor to log a liveness line.
    Probe,
    /// Run the monitor in the foreground (used by systemd).
    Run(MonitorArgs),
    /// Detached child started by `start`.
    #[command(hide = true)]
    Daemon(MonitorArgs),
    /// List sound cards.
    Detect,
    /// Record one sample from a sound card and print the analysis.
    Test {
        /// Sound card id to test.
        card: String,
        /// Sample duration in seconds.
        #[arg(short = 's', long = "sample", value_name = "SECONDS")]
        sample: Option<u32>,
    },
    /// Print the effective configuration.
    Config,
    /// Install the systemd unit and default config.
    Install {
        /// Show the plan without changing anything.
        #[arg(long)]
        dry_run: bool,
        /// Directory for the unit file.
        #[arg(long, value_name = "DIR", default_value = "/etc/systemd/system")]
        unit_dir: PathBuf,
        /// Binary path used in ExecStart (default: this executable).
        #[arg(long, value_name = "PATH")]
        binary: Option<PathBuf>,
    },
    /// Remove the systemd unit (and config unless kept).
    Uninstall {
        /// Show the plan without changing anything.
        #[arg(long)]
        dry_run: bool,
        /// Keep the configuration file.
        #[arg(long)]
        keep_config: bool,
        /// Directory holding the unit file.
        #[arg(long, value_name = "DIR", default_value = "/etc/systemd/system")]
        unit_dir: PathBuf,
    },
    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Dispatch CLI commands.
///
/// # Errors
/// Returns an error if the subcommand fails.
pub fn run(cli: &Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match &cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "noised", &mut io::stdout());
            Ok(())
        }
        Command::Install {
            dry_run,
            unit_dir,
            binary,
        } => install(config_path, *dry_run, unit_dir, binary.as_deref()),
        Command::Uninstall {
            dry_run,
            keep_config,
            unit_dir,
        } => {
            let report = run_uninstall_cleanup(&UninstallOptions {
                keep_config: *keep_config,
                dry_run: *dry_run,
                config_path: resolved_config_path(config_path),
                unit_dir: unit_dir.clone(),
            });
            print!("{}", format_uninstall_report(&report));
            if report.succeeded() {
                Ok(())
            } else {
                Err(NoisedError::Runtime {
                    details: "uninstall did not complete".to_string(),
                })
            }
        }
        Command::Config => {
            let config = Config::load(config_path)?;
            print!("{}", redacted(&config).to_toml()?);
            Ok(())
        }
        Command::Detect => {
            let config = Config::load(config_path)?;
            println!("Detecting your soundcard...");
            print!("{}", read_cards(&config.tools.cards)?);
            Ok(())
        }
        Command::Test { card, sample } => {
            let config = load_with_logging(config_path)?;
            test_card(&config, card, *sample)
        }
        Command::Start(args) => {
            let config = load_with_logging(config_path)?;
            start(&config, config_path, args)
        }
        Command::Stop => {
            let config = load_with_logging(config_path)?;
            let record = Supervisor::new(&config.paths.pid_file).stop()?;
            println!("Sent stop signal to pid {}", record.pid);
            Ok(())
        }
        Command::Probe => {
            let config = load_with_logging(config_path)?;
            let record = Supervisor::new(&config.paths.pid_file).probe()?;
            println!(
                "Sent probe to pid {}; check {}",
                record.pid,
                config.paths.log_file.display()
            );
            Ok(())
        }
        Command::Run(args) => serve(config_path, args, true),
        Command::Daemon(args) => serve(config_path, args, false),
    }
}

/// Foreground monitor. Stop and probe handlers go in before any other work,
/// so a signal arriving during startup never takes the default action.
fn serve(config_path: Option<&Path>, args: &MonitorArgs, banner: bool) -> Result<()> {
    let run_state = RunState::new();
    let _signals = SignalGuard::install(run_state.clone())?;
    let config = load_with_logging(config_path)?;
    let monitor = config.monitor_config(&args.overrides())?;
    if banner {
        print_banner();
    }
    run_monitor(&config, monitor, run_state)?;
    Ok(())
}

fn load_with_logging(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load(config_path)?;
    logger::init(&config.paths.log_file, &config.logging);
    Ok(config)
}

fn resolved_config_path(config_path: Option<&Path>) -> PathBuf {
    config_path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf)
}

fn print_banner() {
    println!(
        "Audio sensing started on {}",
        Local::now().format(BANNER_TIME_FORMAT)
    );
}

fn start(config: &Config, config_path: Option<&Path>, args: &MonitorArgs) -> Result<()> {
    preflight::check(&config.tools)?;
    config.validate_alert()?;
    let monitor = config.monitor_config(&args.overrides())?;

    print_banner();
    let launch = LaunchSpec::for_current_exe(config_path, &monitor)?;
    let record = Supervisor::new(&config.paths.pid_file).start(&launch)?;
    println!(
        "{} noised running as pid {} (record: {})",
        "started".green().bold(),
        record.pid,
        record.path.display()
    );
    Ok(())
}

fn test_card(config: &Config, card: &str, sample: Option<u32>) -> Result<()> {
    preflight::check(&config.tools)?;
    let secs = u64::from(sample.unwrap_or(config.monitor.sample_secs).max(1));
    println!("Testing soundcard {card} for {secs}s");
    let sampler = CommandSampler::for_card(
        card,
        secs,
        &config.monitor.format,
        &config.tools,
        &config.paths,
    );
    sampler.capture()?;
    let report = sampler.analyze()?;
    print!("{report}");
    match parse_max_amplitude(&report) {
        Ok(amplitude) => {
            let verdict = if exceeds_threshold(amplitude, config.monitor.threshold) {
                "would alert".red().bold()
            } else {
                "quiet".green()
            };
            println!(
                "peak amplitude {amplitude:.6} vs threshold {}: {verdict}",
                config.monitor.threshold
            );
        }
        Err(e) => println!("{} {e}", "warning:".yellow().bold()),
    }
    Ok(())
}

fn install(
    config_path: Option<&Path>,
    dry_run: bool,
    unit_dir: &Path,
    binary: Option<&Path>,
) -> Result<()> {
    let target = resolved_config_path(config_path);
    let config = if target.exists() {
        Config::load(Some(&target))?
    } else {
        Config::default()
    };
    let binary = match binary {
        Some(path) => path.to_path_buf(),
        None => std::env::current_exe().map_err(|e| NoisedError::Runtime {
            details: format!("cannot locate own executable: {e}"),
        })?,
    };
    let report = run_install_sequence(&InstallOptions {
        config,
        config_path: target,
        unit_dir: unit_dir.to_path_buf(),
        binary,
        dry_run,
    });
    print!("{}", format_install_report(&report));
    if report.succeeded() {
        Ok(())
    } else {
        Err(NoisedError::Runtime {
            details: "install did not complete".to_string(),
        })
    }
}

/// Sound card listing from the enumeration interface.
pub fn read_cards(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|_| NoisedError::EnvironmentMissing {
        what: "sound card enumeration",
        path: path.to_path_buf(),
        hint: String::new(),
    })
}

fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if !shown.alert.token.is_empty() {
        shown.alert.token = "<redacted>".to_string();
    }
    shown
}
