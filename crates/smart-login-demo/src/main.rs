#![deny(unsafe_code)]
//! Smart Login demo binary.
//!
//! Runs one complete login session against simulated device services:
//! 1. An incoming call is recorded by the call observer
//! 2. The session starts its automatic sources (spin, light, caller)
//! 3. The user taps the proximity and voice rows
//! 4. A premature login is denied
//! 5. The caller name is typed and the login succeeds
//!
//! No device is required. All collaborators are simulated.

mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use smart_login_gate::{AggregationController, LoginOutcome, SessionUpdate};
use smart_login_sources::simulated::{
    SimulatedContacts, SimulatedLocation, SimulatedPermissions, SimulatedRadio,
    SimulatedRecognizer, SimulatedSensors,
};
use smart_login_sources::{
    build_sources, CallObserver, FactStore, InMemoryFactStore, JsonFactStore, Peer, PhoneState,
    Platform, RecognitionOutcome, SensorKind, SensorReading,
};
use smart_login_types::{Condition, ConditionId, Notice};
use tokio::sync::broadcast;
use tokio::time::{timeout_at, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::DemoConfig;

/// Smart Login demo CLI
#[derive(Parser)]
#[command(name = "smart-login-demo")]
#[command(about = "Run a scripted Smart Login session on simulated devices", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SMART_LOGIN_CONFIG")]
    config: Option<String>,

    /// Caller name typed by the user (defaults to the recorded caller)
    #[arg(long)]
    caller: Option<String>,

    /// Log level
    #[arg(long, env = "SMART_LOGIN_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "SMART_LOGIN_LOG_JSON")]
    json: bool,
}

// ── Formatting Helpers ──────────────────────────────────────────────────

const BANNER: &str = r#"
 ╔═══════════════════════════════════════════════════════════════╗
 ║                 Smart Login  --  Demo                         ║
 ║                                                               ║
 ║   Five independent signals, one login gate.                   ║
 ╚═══════════════════════════════════════════════════════════════╝
"#;

/// Upper bound for any single wait; longer than the scan timeout.
const STEP_DEADLINE: Duration = Duration::from_secs(15);

const NANOS_PER_SECOND: i64 = 1_000_000_000;

fn section(title: &str) {
    let width: usize = 60;
    let pad = width.saturating_sub(title.len() + 4);
    let left = pad / 2;
    let right = pad - left;
    println!();
    println!(" ┌{}┐", "─".repeat(width));
    println!(" │{}  {}  {}│", " ".repeat(left), title, " ".repeat(right));
    println!(" └{}┘", "─".repeat(width));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn warn(msg: &str) {
    println!("   [!!]  {}", msg);
}

// ── Presentation ────────────────────────────────────────────────────────

/// Prints session updates and keeps the latest row per condition.
struct Presenter {
    updates: broadcast::Receiver<SessionUpdate>,
    rows: HashMap<ConditionId, Condition>,
    last_login: Option<LoginOutcome>,
}

impl Presenter {
    fn new(updates: broadcast::Receiver<SessionUpdate>) -> Self {
        Self {
            updates,
            rows: HashMap::new(),
            last_login: None,
        }
    }

    fn show(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Snapshot(conditions) => {
                for condition in conditions {
                    info(&format!(
                        "{:<28} {}",
                        condition.id.display_name(),
                        condition.display_status
                    ));
                    self.rows.insert(condition.id, condition);
                }
            }
            SessionUpdate::ConditionChanged(change) => {
                let line = format!(
                    "#{} {:<25} {}",
                    change.index,
                    change.condition.id.display_name(),
                    change.condition.display_status
                );
                if change.condition.passed {
                    ok(&line);
                } else {
                    info(&line);
                }
                self.rows.insert(change.condition.id, change.condition);
            }
            SessionUpdate::Notice(Notice::Toast { message, .. }) => warn(&message),
            SessionUpdate::Notice(Notice::Remediation { title, message, .. }) => {
                warn(&format!("{}: {}", title, message))
            }
            SessionUpdate::Login(outcome) => self.last_login = Some(outcome),
            SessionUpdate::Rejected(err) => warn(&format!("Rejected: {}", err)),
        }
    }

    fn passed(&self, id: ConditionId) -> bool {
        self.rows.get(&id).is_some_and(|c| c.passed)
    }

    /// Print updates until `done` holds or the deadline passes.
    async fn until(&mut self, done: impl Fn(&Self) -> bool) -> Result<bool> {
        let deadline = Instant::now() + STEP_DEADLINE;
        while !done(self) {
            match timeout_at(deadline, self.updates.recv()).await {
                Ok(Ok(update)) => self.show(update),
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn(&format!("Skipped {} updates", n))
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => bail!("session ended"),
                Err(_) => return Ok(false),
            }
        }
        Ok(true)
    }

    async fn login(&mut self) -> Result<LoginOutcome> {
        self.last_login = None;
        if !self.until(|p| p.last_login.is_some()).await? {
            bail!("no login outcome within {:?}", STEP_DEADLINE);
        }
        self.last_login.context("login outcome missing")
    }
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }

    let config = DemoConfig::load(cli.config.as_deref())?;

    println!("{}", BANNER);
    run_demo(config, cli.caller).await?;

    println!();
    println!(" ════════════════════════════════════════════════════════════════");
    println!("  Demo complete.");
    println!(" ════════════════════════════════════════════════════════════════");
    println!();
    Ok(())
}

fn open_facts(config: &DemoConfig) -> Result<Arc<dyn FactStore>> {
    Ok(match &config.fact_store_path {
        Some(path) => Arc::new(
            JsonFactStore::open(path)
                .with_context(|| format!("opening fact store {}", path.display()))?,
        ),
        None => Arc::new(InMemoryFactStore::new()),
    })
}

fn simulated_platform(config: &DemoConfig, facts: Arc<dyn FactStore>) -> Platform {
    let scenario = &config.scenario;

    // 3 rad/s sampled once a second: enough for two turns after five samples.
    let spins = (0..=6)
        .map(|i| SensorReading::gyroscope(i * NANOS_PER_SECOND, 3.0))
        .collect();

    Platform {
        permissions: Arc::new(SimulatedPermissions::prompting()),
        radio: Arc::new(
            SimulatedRadio::new().with_connected(vec![Peer::named(scenario.peer_name.clone())]),
        ),
        location: Arc::new(SimulatedLocation::new(true)),
        sensors: Arc::new(
            SimulatedSensors::new()
                .with_script(SensorKind::Gyroscope, spins)
                .with_script(
                    SensorKind::Light,
                    vec![SensorReading::light(NANOS_PER_SECOND, scenario.lux)],
                ),
        ),
        recognizer: Arc::new(SimulatedRecognizer::new(vec![
            RecognitionOutcome::Transcript(scenario.transcript.clone()),
        ])),
        facts,
    }
}

async fn run_demo(config: DemoConfig, typed_caller: Option<String>) -> Result<()> {
    // ── Phase A: Incoming Call ──────────────────────────────────────
    section("Phase A: Incoming Call");

    let facts = open_facts(&config)?;
    let scenario = config.scenario.clone();
    let observer = CallObserver::new(
        Arc::new(
            SimulatedContacts::new()
                .with_contact(scenario.caller_number.clone(), scenario.caller_name.clone()),
        ),
        facts.clone(),
    );
    match observer.on_phone_state(&PhoneState::Ringing {
        number: Some(scenario.caller_number.clone()),
    })? {
        Some(name) => ok(&format!("Recorded caller  name={}", name)),
        None => warn("Caller not in contacts"),
    }

    // ── Phase B: Session Start ──────────────────────────────────────
    section("Phase B: Session Start");

    let platform = simulated_platform(&config, facts);
    let sources = build_sources(&config.sources, &platform);
    let controller = AggregationController::new(&config.gate, sources)?;
    info(&format!("Session id={}", controller.session_id()));

    let (handle, updates, task) = controller.spawn()?;
    let mut presenter = Presenter::new(updates);

    // ── Phase C: User Taps ──────────────────────────────────────────
    section("Phase C: Proximity and Voice");

    handle.tap(ConditionId::BluetoothDevice).await?;
    handle.tap(ConditionId::VoiceCommand).await?;

    let four = [
        ConditionId::BluetoothDevice,
        ConditionId::VoiceCommand,
        ConditionId::DeviceSpin,
        ConditionId::RoomBright,
    ];
    if !presenter
        .until(|p| four.iter().all(|id| p.passed(*id)))
        .await?
    {
        warn("Not every signal passed in time");
    }

    // ── Phase D: Early Login ────────────────────────────────────────
    section("Phase D: Early Login");

    handle.attempt_login().await?;
    match presenter.login().await? {
        LoginOutcome::Denied => ok("Denied while the caller name is missing"),
        LoginOutcome::Authenticated => warn("Gate opened early"),
    }

    // ── Phase E: Caller Name ────────────────────────────────────────
    section("Phase E: Caller Name");

    let typed = typed_caller.unwrap_or(scenario.caller_name);
    handle
        .text_changed(ConditionId::CallMatch, typed.clone())
        .await?;
    presenter
        .until(|p| p.passed(ConditionId::CallMatch))
        .await?;

    handle.attempt_login().await?;
    match presenter.login().await? {
        LoginOutcome::Authenticated => ok(&format!("Login successful as caller {:?}", typed)),
        LoginOutcome::Denied => warn("Login failed"),
    }

    handle.shutdown().await?;
    let state = task.await.context("session task failed")?;
    info(&format!("Final session state: {:?}", state));
    Ok(())
}
