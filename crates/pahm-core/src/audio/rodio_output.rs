use std::time::Duration;

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

use super::voice::{Voice, VoiceSamples, SAMPLE_RATE};
use super::AudioPort;
use crate::error::AudioError;

impl Source for VoiceSamples {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration())
    }
}

/// Plays voices on the default output device.
///
/// The output stream is opened lazily on `resume`; each voice gets its own
/// detached sink so playback never blocks the caller.
#[derive(Default)]
pub struct RodioAudio {
    output: Option<(OutputStream, OutputStreamHandle)>,
}

impl RodioAudio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioPort for RodioAudio {
    fn is_supported(&self) -> bool {
        true
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.output.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| AudioError::Unavailable(e.to_string()))?;
            self.output = Some((stream, handle));
        }
        Ok(())
    }

    fn play(&mut self, voice: &Voice, start_after: Duration) -> Result<(), AudioError> {
        let (_, handle) = self.output.as_ref().ok_or(AudioError::Unavailable(
            "output stream not resumed".to_string(),
        ))?;
        let sink = Sink::try_new(handle).map_err(|e| AudioError::Playback(e.to_string()))?;
        sink.append(voice.render(SAMPLE_RATE).delay(start_after));
        sink.detach();
        Ok(())
    }
}
