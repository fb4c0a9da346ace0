//! # PAHM Core Library
//!
//! Session engine for the PAHM meditation practice timer. All behaviour lives
//! here; the `pahm` CLI is a thin driver that feeds input and lifecycle
//! signals in and renders the [`Event`]s that come out.
//!
//! ## Architecture
//!
//! - **Timer**: epoch-based countdown. Remaining time is always recomputed
//!   from the start instant, so suspended processes and throttled callbacks
//!   never cause drift. The caller drives it through [`PracticeSession::poll`].
//! - **Recovery**: advisory snapshot written to durable storage when the app
//!   is backgrounded or closed, offered back on return.
//! - **Tally**: the nine-position attention matrix (PAHM) and its summary.
//! - **Ports**: [`Clock`], [`Scheduler`], [`WakeLockPort`], [`AudioPort`],
//!   [`RecoveryStore`] and [`AnalyticsSink`] isolate every platform facility.
//!
//! ## Key Components
//!
//! - [`PracticeSession`]: owns every per-session component
//! - [`RobustTimer`]: timer state machine
//! - [`RecoveryMonitor`]: lifecycle and recovery state machine
//! - [`Config`]: TOML configuration

pub mod audio;
pub mod clock;
pub mod error;
pub mod events;
pub mod recovery;
pub mod session;
pub mod storage;
pub mod tally;
pub mod timer;
pub mod wake_lock;

pub use audio::{AudioManager, AudioPermission, AudioPort, SilentAudio, UserGesture};
pub use clock::{Clock, DeadlineScheduler, ManualClock, Scheduler, SystemClock, TaskId};
pub use error::{
    AudioError, ConfigError, CoreError, Result, StorageError, ValidationError, WakeLockError,
};
pub use events::Event;
pub use recovery::{
    LifecycleState, MemoryStore, RecoveryMonitor, RecoveryPrompt, RecoverySnapshot,
    RecoveryStore, SqliteStore,
};
pub use session::{
    AnalyticsSink, CollectingAnalytics, NoopAnalytics, PracticeSession, SessionOptions,
    SessionPorts, SessionReport, StartSequence, Visibility,
};
pub use storage::{data_dir, Config};
pub use tally::{AttentionKey, AttentionTally, AttentionTallyAggregator, PahmMatrix};
pub use timer::{RobustTimer, SessionConfiguration, TimerPhase, TimerSnapshot, TimerState};
pub use wake_lock::{InhibitorWakeLock, UnsupportedWakeLock, WakeLockManager, WakeLockPort};
