//! Best-effort screen wake lock.
//!
//! A wake lock is a UX enhancement and never blocks a session: every failure
//! degrades to "no wake lock". If the platform drops the lock on its own
//! (app switch, inhibitor process killed) the manager notices on the next
//! [`WakeLockManager::refresh`] and clears its handle. It does not reacquire;
//! the session does that when the app returns to the foreground.

use std::process::{Child, Command, Stdio};

use crate::error::WakeLockError;

/// Opaque platform lock handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeLockHandle(pub u64);

/// Platform side of the wake lock.
pub trait WakeLockPort {
    fn is_supported(&self) -> bool;
    fn acquire(&mut self) -> Result<WakeLockHandle, WakeLockError>;
    fn release(&mut self, handle: WakeLockHandle) -> Result<(), WakeLockError>;
    /// Whether the platform released the lock without being asked.
    fn was_released(&mut self, handle: WakeLockHandle) -> bool;
}

/// Platform without a wake-lock capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedWakeLock;

impl WakeLockPort for UnsupportedWakeLock {
    fn is_supported(&self) -> bool {
        false
    }

    fn acquire(&mut self) -> Result<WakeLockHandle, WakeLockError> {
        Err(WakeLockError::Unsupported)
    }

    fn release(&mut self, _handle: WakeLockHandle) -> Result<(), WakeLockError> {
        Ok(())
    }

    fn was_released(&mut self, _handle: WakeLockHandle) -> bool {
        true
    }
}

/// Keeps the display awake by holding an OS idle-inhibitor child process
/// (`systemd-inhibit` on Linux, `caffeinate` on macOS). The process exiting
/// on its own counts as a platform release.
#[derive(Debug)]
pub struct InhibitorWakeLock {
    program: Option<(String, Vec<String>)>,
    child: Option<(WakeLockHandle, Child)>,
    next_handle: u64,
}

impl InhibitorWakeLock {
    /// Inhibitor for the current OS, unsupported elsewhere.
    pub fn for_current_os() -> Self {
        let program = if cfg!(target_os = "macos") {
            Some(("caffeinate".to_string(), vec!["-d".to_string()]))
        } else if cfg!(target_os = "linux") {
            Some((
                "systemd-inhibit".to_string(),
                [
                    "--what=idle",
                    "--who=pahm",
                    "--why=Practice session in progress",
                    "sleep",
                    "infinity",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ))
        } else {
            None
        };
        Self {
            program,
            child: None,
            next_handle: 0,
        }
    }

    /// Inhibitor running an arbitrary command.
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: Some((program.into(), args)),
            child: None,
            next_handle: 0,
        }
    }
}

impl WakeLockPort for InhibitorWakeLock {
    fn is_supported(&self) -> bool {
        self.program.is_some()
    }

    fn acquire(&mut self) -> Result<WakeLockHandle, WakeLockError> {
        let (program, args) = self.program.as_ref().ok_or(WakeLockError::Unsupported)?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        self.next_handle += 1;
        let handle = WakeLockHandle(self.next_handle);
        if let Some((_, mut old)) = self.child.replace((handle, child)) {
            let _ = old.kill();
            let _ = old.wait();
        }
        Ok(handle)
    }

    fn release(&mut self, handle: WakeLockHandle) -> Result<(), WakeLockError> {
        match self.child.take() {
            Some((held, mut child)) if held == handle => {
                let _ = child.kill();
                child.wait()?;
                Ok(())
            }
            other => {
                self.child = other;
                Ok(())
            }
        }
    }

    fn was_released(&mut self, handle: WakeLockHandle) -> bool {
        match self.child.as_mut() {
            Some((held, child)) if *held == handle => !matches!(child.try_wait(), Ok(None)),
            _ => true,
        }
    }
}

impl Drop for InhibitorWakeLock {
    fn drop(&mut self) {
        if let Some((_, mut child)) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Session-scoped owner of at most one wake-lock handle.
pub struct WakeLockManager {
    port: Box<dyn WakeLockPort>,
    handle: Option<WakeLockHandle>,
}

impl WakeLockManager {
    pub fn new(port: Box<dyn WakeLockPort>) -> Self {
        Self { port, handle: None }
    }

    pub fn is_supported(&self) -> bool {
        self.port.is_supported()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Try to hold the lock. Returns whether a lock is held afterwards.
    pub fn request_wake_lock(&mut self) -> bool {
        if !self.port.is_supported() {
            tracing::debug!("wake lock unsupported");
            return false;
        }
        if self.handle.is_some() && !self.refresh() {
            return true;
        }
        match self.port.acquire() {
            Ok(handle) => {
                tracing::info!(handle = handle.0, "wake lock acquired");
                self.handle = Some(handle);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "wake lock request failed");
                false
            }
        }
    }

    /// Detect a platform-initiated release. Returns `true` when the lock was
    /// lost since the last check.
    pub fn refresh(&mut self) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        if self.port.was_released(handle) {
            tracing::info!(handle = handle.0, "wake lock released by platform");
            self.handle = None;
            return true;
        }
        false
    }

    /// Release the lock if held. Idempotent. Returns whether a lock was
    /// actually released.
    pub fn release_wake_lock(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        if let Err(err) = self.port.release(handle) {
            tracing::warn!(error = %err, "wake lock release failed");
        } else {
            tracing::info!(handle = handle.0, "wake lock released");
        }
        true
    }
}

impl Drop for WakeLockManager {
    fn drop(&mut self) {
        self.release_wake_lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Platform {
        acquired: u64,
        released: Vec<WakeLockHandle>,
        dropped_externally: bool,
        reject: bool,
    }

    struct FakePort(Rc<RefCell<Platform>>);

    impl WakeLockPort for FakePort {
        fn is_supported(&self) -> bool {
            true
        }
        fn acquire(&mut self) -> Result<WakeLockHandle, WakeLockError> {
            let mut p = self.0.borrow_mut();
            if p.reject {
                return Err(WakeLockError::Rejected("battery saver".into()));
            }
            p.acquired += 1;
            p.dropped_externally = false;
            Ok(WakeLockHandle(p.acquired))
        }
        fn release(&mut self, handle: WakeLockHandle) -> Result<(), WakeLockError> {
            self.0.borrow_mut().released.push(handle);
            Ok(())
        }
        fn was_released(&mut self, _handle: WakeLockHandle) -> bool {
            self.0.borrow().dropped_externally
        }
    }

    fn manager() -> (Rc<RefCell<Platform>>, WakeLockManager) {
        let platform = Rc::new(RefCell::new(Platform::default()));
        let mgr = WakeLockManager::new(Box::new(FakePort(platform.clone())));
        (platform, mgr)
    }

    #[test]
    fn unsupported_platform_returns_false() {
        let mut mgr = WakeLockManager::new(Box::new(UnsupportedWakeLock));
        assert!(!mgr.is_supported());
        assert!(!mgr.request_wake_lock());
        assert!(!mgr.is_active());
        assert!(!mgr.release_wake_lock());
    }

    #[test]
    fn request_is_idempotent_while_held() {
        let (platform, mut mgr) = manager();
        assert!(mgr.request_wake_lock());
        assert!(mgr.request_wake_lock());
        assert_eq!(platform.borrow().acquired, 1);
    }

    #[test]
    fn release_is_idempotent() {
        let (platform, mut mgr) = manager();
        mgr.request_wake_lock();
        assert!(mgr.release_wake_lock());
        assert!(!mgr.release_wake_lock());
        assert_eq!(platform.borrow().released.len(), 1);
    }

    #[test]
    fn platform_release_clears_handle_without_reacquiring() {
        let (platform, mut mgr) = manager();
        mgr.request_wake_lock();
        platform.borrow_mut().dropped_externally = true;
        assert!(mgr.refresh());
        assert!(!mgr.is_active());
        assert_eq!(platform.borrow().acquired, 1);
        assert!(mgr.request_wake_lock());
        assert_eq!(platform.borrow().acquired, 2);
    }

    #[test]
    fn rejected_request_degrades_silently() {
        let (platform, mut mgr) = manager();
        platform.borrow_mut().reject = true;
        assert!(!mgr.request_wake_lock());
        assert!(!mgr.is_active());
    }

    #[test]
    fn drop_releases_lock() {
        let (platform, mut mgr) = manager();
        mgr.request_wake_lock();
        drop(mgr);
        assert_eq!(platform.borrow().released, vec![WakeLockHandle(1)]);
    }

    #[test]
    fn inhibitor_with_missing_program_fails_gracefully() {
        let port = InhibitorWakeLock::with_command("pahm-no-such-inhibitor", Vec::new());
        let mut mgr = WakeLockManager::new(Box::new(port));
        assert!(mgr.is_supported());
        assert!(!mgr.request_wake_lock());
    }
}
