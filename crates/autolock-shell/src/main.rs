//! Autolock Shell - terminal host for the biometric auto-lock session guard
//!
//! Lifecycle transitions are typed on stdin (`resume`, `pause`, ...) and the
//! lock overlay is rendered as one status line per state change. With the
//! `fprintd` backend the prompt is a real fingerprint scan; `simulate`
//! answers every prompt with a fixed outcome after a short delay.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use autolock_core::{AuthOutcome, ErrorPolicy, GuardConfig, LockState};
use autolock_guard::{
    AuthenticationGateway, CapabilityProbe, Collaborators, FprintdGateway, FprintdProbe,
    GuardHandle, JsonPreferenceStore, LifecycleBus, PreferenceStore, ScriptedGateway,
    SessionGuardCoordinator, StaticProbe,
};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod input;

use input::{ShellCommand, HELP};

#[derive(Parser)]
#[command(name = "autolock-shell")]
#[command(about = "Hide app content behind a fingerprint prompt whenever it returns to the foreground", long_about = None)]
#[command(version)]
struct Cli {
    /// Starting point for the guard settings
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Time after an unlock during which resumes do not re-lock (overrides the preset)
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Unlock when the platform reports an error instead of staying locked
    #[arg(long)]
    fail_open: bool,

    /// Preference file (defaults to the user config directory)
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Where prompts are answered
    #[arg(long, value_enum, default_value_t = Backend::Simulate)]
    backend: Backend,

    /// Outcome of every simulated prompt
    #[arg(long, value_enum, default_value_t = Simulated::Success)]
    simulate: Simulated,

    /// Delay before a simulated prompt resolves
    #[arg(long, default_value_t = 1500)]
    simulate_delay_ms: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// 2s cooldown
    Default,
    /// Short cooldown for hosts without slow overlays
    Strict,
    /// Long cooldown for hosts whose prompt takes a while to settle
    Relaxed,
}

impl Preset {
    /// Base config; the error policy is only ever changed by `--fail-open`
    fn config(self) -> GuardConfig {
        match self {
            Preset::Default => GuardConfig::default(),
            Preset::Strict => GuardConfig::strict(),
            Preset::Relaxed => GuardConfig::relaxed(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// fprintd-list / fprintd-verify
    Fprintd,
    /// Built-in scripted prompt
    Simulate,
}

#[derive(Clone, Copy, ValueEnum)]
enum Simulated {
    /// Fingerprint matched
    Success,
    /// Fingerprint did not match
    Fail,
    /// Prompt dismissed
    Cancel,
    /// Sensor failure
    Error,
}

impl From<Simulated> for AuthOutcome {
    fn from(outcome: Simulated) -> Self {
        match outcome {
            Simulated::Success => AuthOutcome::Success,
            Simulated::Fail => AuthOutcome::Failed,
            Simulated::Cancel => AuthOutcome::Cancelled,
            Simulated::Error => AuthOutcome::Error("simulated sensor error".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the overlay lines stay readable on stdout
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("autolock=info".parse()?))
        .init();

    let cli = Cli::parse();
    let result = run(cli).await;

    if let Err(e) = &result {
        tracing::error!("Shell error: {}", e);
    }

    result
}

async fn run(cli: Cli) -> Result<()> {
    let store = match cli.prefs {
        Some(path) => JsonPreferenceStore::new(path),
        None => JsonPreferenceStore::at_default_location()?,
    };
    tracing::info!("Preferences at {}", store.path().display());
    let store: Arc<dyn PreferenceStore> = Arc::new(store);

    let (probe, gateway): (Arc<dyn CapabilityProbe>, Arc<dyn AuthenticationGateway>) =
        match cli.backend {
            Backend::Fprintd => (Arc::new(FprintdProbe::new()), Arc::new(FprintdGateway::new())),
            Backend::Simulate => (
                Arc::new(StaticProbe(true)),
                Arc::new(ScriptedGateway::with_fallback(
                    cli.simulate.into(),
                    Duration::from_millis(cli.simulate_delay_ms),
                )),
            ),
        };

    let mut base = cli.preset.config();
    if let Some(cooldown_ms) = cli.cooldown_ms {
        base = base.with_cooldown(Duration::from_millis(cooldown_ms));
    }
    if cli.fail_open {
        base = base.with_error_policy(ErrorPolicy::FailOpen);
    }

    let bus = LifecycleBus::new();
    let handle = SessionGuardCoordinator::start(
        base,
        Collaborators {
            probe,
            gateway,
            store,
        },
        &bus,
    )?;
    let overlay = spawn_overlay(&handle);

    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ShellCommand>() {
            Ok(ShellCommand::Signal(signal)) => {
                bus.emit(signal);
            }
            Ok(ShellCommand::Retry) => handle.retry(),
            Ok(ShellCommand::Cancel) => handle.cancel(),
            Ok(ShellCommand::Enable) => set_enabled(&handle, true).await,
            Ok(ShellCommand::Disable) => set_enabled(&handle, false).await,
            Ok(ShellCommand::Status) => {
                handle.sync().await?;
                println!("{}", serde_json::to_string_pretty(&handle.snapshot())?);
            }
            Ok(ShellCommand::Help) => println!("{}", HELP),
            Ok(ShellCommand::Quit) => break,
            Err(e) => eprintln!("{}", e),
        }
    }

    handle.shutdown().await?;
    // The overlay ends once the guard drops its snapshot sender
    let _ = overlay.await;
    Ok(())
}

async fn set_enabled(handle: &GuardHandle, enabled: bool) {
    match handle.set_enabled(enabled).await {
        Ok(()) => println!("auto-lock {}", if enabled { "enabled" } else { "disabled" }),
        Err(e) => eprintln!("could not save preference: {}", e),
    }
}

/// Print one overlay line whenever the lock state changes
fn spawn_overlay(handle: &GuardHandle) -> JoinHandle<()> {
    let mut snapshots = handle.subscribe();
    tokio::spawn(async move {
        let mut shown = None;
        loop {
            let state = snapshots.borrow_and_update().state;
            if shown != Some(state) {
                println!("{}", overlay_line(state));
                shown = Some(state);
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    })
}

fn overlay_line(state: LockState) -> &'static str {
    match state {
        LockState::Unlocked => "[unlocked] content visible",
        LockState::Locked => "[locked] content hidden, type `retry` to authenticate",
        LockState::Authenticating => "[authenticating] waiting for fingerprint",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_never_change_error_policy() {
        for preset in [Preset::Default, Preset::Strict, Preset::Relaxed] {
            let config = preset.config();
            assert_eq!(config.error_policy, ErrorPolicy::FailSecure);
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_parse_preset_with_overrides() {
        let cli = Cli::try_parse_from([
            "autolock-shell",
            "--preset",
            "relaxed",
            "--cooldown-ms",
            "900",
            "--fail-open",
        ])
        .unwrap();

        assert!(matches!(cli.preset, Preset::Relaxed));
        assert_eq!(cli.cooldown_ms, Some(900));
        assert!(cli.fail_open);
    }
}
