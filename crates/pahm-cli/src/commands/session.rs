use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use pahm_core::{
    data_dir, AnalyticsSink, AttentionKey, AudioPort, Clock, Config, DeadlineScheduler,
    InhibitorWakeLock, MemoryStore, PracticeSession, RecoveryStore, SessionConfiguration,
    SessionPorts, SessionReport, SqliteStore, SystemClock, UnsupportedWakeLock, UserGesture,
    Visibility, WakeLockPort,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::CliResult;

/// Upper bound on a driver sleep when nothing is scheduled (paused).
const IDLE_WAKE: Duration = Duration::from_secs(60);

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start an interactive session. Reads commands from stdin, one per line:
    /// a position name (present, likes, worry, ...) records a tap; also
    /// pause, resume, hide, show, accept, decline and quit.
    Start(StartArgs),
}

#[derive(Args)]
pub struct StartArgs {
    /// Session length in minutes (at least 30)
    #[arg(long)]
    minutes: Option<u32>,
    /// Stage label shown in the report
    #[arg(long)]
    stage: Option<String>,
    /// Posture
    #[arg(long)]
    posture: Option<String>,
    /// Disable audio cues
    #[arg(long)]
    no_audio: bool,
    /// Do not hold a display wake lock
    #[arg(long)]
    no_wake_lock: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Tap(AttentionKey),
    Pause,
    Resume,
    Hide,
    Show,
    Accept,
    Decline,
    Quit,
}

impl FromStr for Input {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(Input::Pause),
            "resume" => Ok(Input::Resume),
            "hide" => Ok(Input::Hide),
            "show" => Ok(Input::Show),
            "accept" => Ok(Input::Accept),
            "decline" => Ok(Input::Decline),
            "quit" | "stop" => Ok(Input::Quit),
            other => AttentionKey::from_str(other)
                .map(Input::Tap)
                .map_err(|_| format!("unknown command: {other}")),
        }
    }
}

/// Appends every session report to `history.jsonl` in the data directory.
struct HistoryLog {
    path: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry<'a> {
    recorded_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    report: &'a SessionReport,
}

impl HistoryLog {
    fn open_default() -> Self {
        let path = match data_dir() {
            Ok(dir) => Some(dir.join("history.jsonl")),
            Err(err) => {
                tracing::warn!(error = %err, "session history disabled");
                None
            }
        };
        Self { path }
    }

    fn append(&self, report: &SessionReport) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let entry = HistoryEntry {
            recorded_at: chrono::Utc::now(),
            report,
        };
        let line = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")
    }
}

impl AnalyticsSink for HistoryLog {
    fn record_session(&mut self, report: &SessionReport) {
        if let Err(err) = self.append(report) {
            tracing::warn!(error = %err, "failed to append session history");
        }
    }
}

#[cfg(feature = "rodio-output")]
fn audio_port() -> Box<dyn AudioPort> {
    Box::new(pahm_core::audio::RodioAudio::new())
}

#[cfg(not(feature = "rodio-output"))]
fn audio_port() -> Box<dyn AudioPort> {
    Box::new(pahm_core::SilentAudio)
}

fn build_session(
    config: &Config,
    args: StartArgs,
) -> Result<PracticeSession, Box<dyn std::error::Error>> {
    let session_config = SessionConfiguration::new(
        args.minutes.unwrap_or(config.session.default_minutes),
        args.stage
            .unwrap_or_else(|| config.session.default_stage.clone()),
        args.posture
            .unwrap_or_else(|| config.session.default_posture.clone()),
    )?;

    let mut options = config.session_options();
    if args.no_audio {
        options.audio_enabled = false;
    }
    if args.no_wake_lock {
        options.wake_lock_enabled = false;
    }

    let wake_lock: Box<dyn WakeLockPort> = if options.wake_lock_enabled {
        Box::new(InhibitorWakeLock::for_current_os())
    } else {
        Box::new(UnsupportedWakeLock)
    };
    let store: Box<dyn RecoveryStore> = match SqliteStore::open_default() {
        Ok(store) => Box::new(store),
        Err(err) => {
            tracing::warn!(error = %err, "recovery store unavailable, using memory");
            Box::new(MemoryStore::new())
        }
    };

    let ports = SessionPorts {
        clock: Arc::new(SystemClock),
        scheduler: Box::new(DeadlineScheduler::new()),
        wake_lock,
        audio: audio_port(),
        store,
        analytics: Box::new(HistoryLog::open_default()),
    };
    Ok(PracticeSession::new(session_config, ports, options))
}

fn emit(session: &mut PracticeSession) -> CliResult {
    for event in session.drain_events() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn apply(session: &mut PracticeSession, input: Input) {
    match input {
        Input::Tap(key) => {
            let count = session.tally().get(key).saturating_add(1);
            if !session.on_attention_tap(key, count) {
                eprintln!("tap ignored: session is not running");
            }
        }
        Input::Pause => session.pause(),
        Input::Resume => session.resume(),
        Input::Hide => session.on_visibility(Visibility::Hidden),
        Input::Show => session.on_visibility(Visibility::Visible),
        Input::Accept => {
            if !session.accept_recovery() {
                eprintln!("no recovery prompt pending");
            }
        }
        Input::Decline => {
            if !session.decline_recovery() {
                eprintln!("no recovery prompt pending");
            }
        }
        Input::Quit => session.complete_early(),
    }
}

async fn drive(mut session: PracticeSession) -> CliResult {
    let clock = SystemClock;
    session.start(&UserGesture::from_input());
    session.check_for_recovery();
    emit(&mut session)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    while !session.is_finished() {
        let wait = session
            .next_deadline()
            .map(|deadline| Duration::from_millis(deadline.saturating_sub(clock.now_ms())))
            .unwrap_or(IDLE_WAKE)
            .min(IDLE_WAKE);

        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match line.parse::<Input>() {
                    Ok(input) => apply(&mut session, input),
                    Err(message) => eprintln!("{message}"),
                },
                None => stdin_open = false,
            },
            () = tokio::time::sleep(wait) => session.poll(),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                let saved = session.on_unload();
                emit(&mut session)?;
                if saved {
                    eprintln!("session saved for recovery");
                }
                return Ok(());
            }
        }
        emit(&mut session)?;
    }

    // Dropping the session closes the output stream; let the chime ring out.
    let tail = session.audio_tail();
    if !tail.is_zero() {
        tokio::time::sleep(tail).await;
    }
    Ok(())
}

pub fn run(action: SessionAction) -> CliResult {
    match action {
        SessionAction::Start(args) => {
            let config = Config::load()?;
            let session = build_session(&config, args)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(drive(session));
            // The stdin reader thread may still be blocked on a read.
            runtime.shutdown_background();
            result
        }
    }
}
