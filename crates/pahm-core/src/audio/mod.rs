//! Permission-gated, procedurally synthesized audio cues.
//!
//! Cues are generated from oscillator voices rather than samples, so there
//! are no assets to load. Playback is fire-and-forget: the port queues the
//! voice and returns, and failures are logged, never surfaced.

#[cfg(feature = "rodio-output")]
mod rodio_output;
mod voice;

#[cfg(feature = "rodio-output")]
pub use rodio_output::RodioAudio;
pub use voice::{Voice, VoiceSamples, SAMPLE_RATE};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// C5, E5, G5.
pub const CHIME_NOTES_HZ: [f32; 3] = [523.25, 659.25, 783.99];

/// Offset between successive chime notes.
pub const CHIME_STAGGER: Duration = Duration::from_millis(200);

/// Time from queuing the completion chime until its last note has decayed.
/// Drivers keep the output device open at least this long before exiting.
pub fn completion_sound_length() -> Duration {
    let last_offset = CHIME_STAGGER * (CHIME_NOTES_HZ.len() as u32 - 1);
    CHIME_NOTES_HZ
        .into_iter()
        .map(|hz| Voice::chime(hz).duration)
        .max()
        .map_or(last_offset, |note| last_offset + note)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioPermission {
    Unrequested,
    Granted,
    Denied,
}

/// Proof that a call runs inside a user-initiated input handler. Output
/// devices may only be unlocked from one.
#[derive(Debug)]
pub struct UserGesture {
    _private: (),
}

impl UserGesture {
    /// Construct from an input handler (key press, click, tap).
    pub fn from_input() -> Self {
        Self { _private: () }
    }
}

/// Platform audio output.
pub trait AudioPort {
    fn is_supported(&self) -> bool;
    /// Open or resume the output device.
    fn resume(&mut self) -> Result<(), AudioError>;
    /// Queue `voice` to start after `start_after`. Must not block on playback.
    fn play(&mut self, voice: &Voice, start_after: Duration) -> Result<(), AudioError>;
}

/// No audio output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioPort for SilentAudio {
    fn is_supported(&self) -> bool {
        false
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Err(AudioError::Unsupported)
    }

    fn play(&mut self, _voice: &Voice, _start_after: Duration) -> Result<(), AudioError> {
        Err(AudioError::Unsupported)
    }
}

/// Session-scoped owner of the audio output.
pub struct AudioManager {
    port: Box<dyn AudioPort>,
    permission: AudioPermission,
    enabled: bool,
}

impl AudioManager {
    pub fn new(port: Box<dyn AudioPort>) -> Self {
        Self {
            port,
            permission: AudioPermission::Unrequested,
            enabled: true,
        }
    }

    /// Disabled managers deny permission without touching the device.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn permission(&self) -> AudioPermission {
        self.permission
    }

    pub fn is_supported(&self) -> bool {
        self.port.is_supported()
    }

    /// Unlock the output device with an inaudible calibration tone. Runs at
    /// most once; later calls return the recorded outcome.
    pub fn request_permission(&mut self, _gesture: &UserGesture) -> AudioPermission {
        if self.permission != AudioPermission::Unrequested {
            return self.permission;
        }
        if !self.enabled {
            self.permission = AudioPermission::Denied;
            tracing::debug!("audio feedback disabled by configuration");
            return self.permission;
        }
        let unlocked = self
            .port
            .resume()
            .and_then(|()| self.port.play(&Voice::calibration(), Duration::ZERO));
        self.permission = match unlocked {
            Ok(()) => {
                tracing::info!("audio permission granted");
                AudioPermission::Granted
            }
            Err(err) => {
                tracing::warn!(error = %err, "audio permission denied");
                AudioPermission::Denied
            }
        };
        self.permission
    }

    /// Short swept chirp acknowledging a tap. Returns whether it was queued.
    pub fn play_tap_sound(&mut self, volume: f32) -> bool {
        if self.permission != AudioPermission::Granted {
            return false;
        }
        match self.port.play(&Voice::tap(volume), Duration::ZERO) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "tap sound failed");
                false
            }
        }
    }

    /// Three staggered chime notes marking the end of a session. Returns the
    /// number of notes queued.
    pub fn play_completion_sound(&mut self) -> usize {
        if self.permission != AudioPermission::Granted {
            return 0;
        }
        let mut queued = 0;
        for (i, hz) in CHIME_NOTES_HZ.into_iter().enumerate() {
            match self.port.play(&Voice::chime(hz), CHIME_STAGGER * i as u32) {
                Ok(()) => queued += 1,
                Err(err) => tracing::warn!(error = %err, note = i, "chime note failed"),
            }
        }
        queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn completion_sound_length_covers_last_note() {
        assert_eq!(completion_sound_length(), Duration::from_millis(1600));
    }

    #[derive(Default)]
    struct Device {
        resumes: u32,
        played: Vec<(Voice, Duration)>,
        fail_resume: bool,
        fail_play: bool,
    }

    struct FakePort(Rc<RefCell<Device>>);

    impl AudioPort for FakePort {
        fn is_supported(&self) -> bool {
            true
        }
        fn resume(&mut self) -> Result<(), AudioError> {
            let mut d = self.0.borrow_mut();
            d.resumes += 1;
            if d.fail_resume {
                return Err(AudioError::Unavailable("no device".into()));
            }
            Ok(())
        }
        fn play(&mut self, voice: &Voice, start_after: Duration) -> Result<(), AudioError> {
            let mut d = self.0.borrow_mut();
            if d.fail_play {
                return Err(AudioError::Playback("underrun".into()));
            }
            d.played.push((voice.clone(), start_after));
            Ok(())
        }
    }

    fn manager() -> (Rc<RefCell<Device>>, AudioManager) {
        let device = Rc::new(RefCell::new(Device::default()));
        (device.clone(), AudioManager::new(Box::new(FakePort(device))))
    }

    #[test]
    fn permission_granted_plays_calibration() {
        let (device, mut audio) = manager();
        let granted = audio.request_permission(&UserGesture::from_input());
        assert_eq!(granted, AudioPermission::Granted);
        let d = device.borrow();
        assert_eq!(d.played.len(), 1);
        assert_eq!(d.played[0].0.peak_gain, 0.0);
    }

    #[test]
    fn permission_requested_once() {
        let (device, mut audio) = manager();
        device.borrow_mut().fail_resume = true;
        assert_eq!(
            audio.request_permission(&UserGesture::from_input()),
            AudioPermission::Denied
        );
        device.borrow_mut().fail_resume = false;
        assert_eq!(
            audio.request_permission(&UserGesture::from_input()),
            AudioPermission::Denied
        );
        assert_eq!(device.borrow().resumes, 1);
    }

    #[test]
    fn unsupported_output_is_denied() {
        let mut audio = AudioManager::new(Box::new(SilentAudio));
        assert_eq!(
            audio.request_permission(&UserGesture::from_input()),
            AudioPermission::Denied
        );
        assert!(!audio.play_tap_sound(0.5));
        assert_eq!(audio.play_completion_sound(), 0);
    }

    #[test]
    fn disabled_manager_never_touches_device() {
        let (device, audio) = manager();
        let mut audio = audio.with_enabled(false);
        assert_eq!(
            audio.request_permission(&UserGesture::from_input()),
            AudioPermission::Denied
        );
        assert_eq!(device.borrow().resumes, 0);
    }

    #[test]
    fn tap_requires_permission() {
        let (device, mut audio) = manager();
        assert!(!audio.play_tap_sound(0.3));
        audio.request_permission(&UserGesture::from_input());
        assert!(audio.play_tap_sound(0.3));
        assert_eq!(device.borrow().played.last().unwrap().0, Voice::tap(0.3));
    }

    #[test]
    fn playback_failure_is_swallowed() {
        let (device, mut audio) = manager();
        audio.request_permission(&UserGesture::from_input());
        device.borrow_mut().fail_play = true;
        assert!(!audio.play_tap_sound(0.3));
        assert_eq!(audio.play_completion_sound(), 0);
        assert_eq!(audio.permission(), AudioPermission::Granted);
    }

    #[test]
    fn chime_notes_are_staggered() {
        let (device, mut audio) = manager();
        audio.request_permission(&UserGesture::from_input());
        assert_eq!(audio.play_completion_sound(), 3);
        let d = device.borrow();
        let offsets: Vec<u128> = d.played[1..].iter().map(|(_, at)| at.as_millis()).collect();
        assert_eq!(offsets, vec![0, 200, 400]);
        assert_eq!(d.played[3].0.start_hz, 783.99);
    }
}
