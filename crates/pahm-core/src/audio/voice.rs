use std::f32::consts::PI;
use std::time::Duration;

/// Sample rate used when rendering voices.
pub const SAMPLE_RATE: u32 = 44_100;

/// Quietest gain an exponential envelope decays to.
const GAIN_FLOOR: f32 = 0.001;

/// One oscillator with an exponential frequency sweep and an exponential
/// gain decay, the procedural equivalent of oscillator + gain node.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub start_hz: f32,
    pub end_hz: f32,
    /// Time the sweep takes to reach `end_hz`; the pitch then holds.
    pub sweep: Duration,
    pub peak_gain: f32,
    pub duration: Duration,
}

impl Voice {
    /// Short downward chirp played on each attention tap.
    pub fn tap(volume: f32) -> Self {
        Self {
            start_hz: 880.0,
            end_hz: 440.0,
            sweep: Duration::from_millis(80),
            peak_gain: volume.clamp(0.0, 1.0),
            duration: Duration::from_millis(150),
        }
    }

    /// Silent tone used to unlock the output device.
    pub fn calibration() -> Self {
        Self {
            start_hz: 440.0,
            end_hz: 440.0,
            sweep: Duration::ZERO,
            peak_gain: 0.0,
            duration: Duration::from_millis(10),
        }
    }

    /// A single sustained chime note.
    pub fn chime(frequency_hz: f32) -> Self {
        Self {
            start_hz: frequency_hz,
            end_hz: frequency_hz,
            sweep: Duration::ZERO,
            peak_gain: 0.25,
            duration: Duration::from_millis(1200),
        }
    }

    pub fn frequency_at(&self, t: f32) -> f32 {
        let sweep = self.sweep.as_secs_f32();
        if sweep <= 0.0 || t >= sweep || self.start_hz <= 0.0 || self.end_hz <= 0.0 {
            return if t >= sweep { self.end_hz } else { self.start_hz };
        }
        self.start_hz * (self.end_hz / self.start_hz).powf(t / sweep)
    }

    pub fn gain_at(&self, t: f32) -> f32 {
        let duration = self.duration.as_secs_f32();
        if self.peak_gain <= 0.0 || duration <= 0.0 || t >= duration {
            return 0.0;
        }
        if self.peak_gain <= GAIN_FLOOR {
            return self.peak_gain;
        }
        self.peak_gain * (GAIN_FLOOR / self.peak_gain).powf(t / duration)
    }

    pub fn sample_count(&self, sample_rate: u32) -> usize {
        (self.duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
    }

    /// Render as mono `f32` samples.
    pub fn render(&self, sample_rate: u32) -> VoiceSamples {
        VoiceSamples {
            voice: self.clone(),
            sample_rate,
            index: 0,
            total: self.sample_count(sample_rate),
            phase: 0.0,
        }
    }
}

/// Mono sample stream for a [`Voice`].
#[derive(Debug, Clone)]
pub struct VoiceSamples {
    voice: Voice,
    sample_rate: u32,
    index: usize,
    total: usize,
    phase: f32,
}

impl VoiceSamples {
    pub fn rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        self.voice.duration
    }
}

impl Iterator for VoiceSamples {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total {
            return None;
        }
        let t = self.index as f32 / self.sample_rate as f32;
        let sample = self.phase.sin() * self.voice.gain_at(t);
        // Phase accumulation keeps the sweep continuous.
        self.phase += 2.0 * PI * self.voice.frequency_at(t) / self.sample_rate as f32;
        if self.phase > 2.0 * PI {
            self.phase -= 2.0 * PI;
        }
        self.index += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for VoiceSamples {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_sweeps_down() {
        let v = Voice::tap(0.5);
        assert_eq!(v.frequency_at(0.0), 880.0);
        assert!((v.frequency_at(0.04) - 622.25).abs() < 1.0);
        assert_eq!(v.frequency_at(0.1), 440.0);
    }

    #[test]
    fn envelope_decays_to_silence() {
        let v = Voice::tap(0.8);
        assert!((v.gain_at(0.0) - 0.8).abs() < 1e-6);
        assert!(v.gain_at(0.1) < v.gain_at(0.05));
        assert_eq!(v.gain_at(0.2), 0.0);
    }

    #[test]
    fn calibration_is_inaudible() {
        let samples: Vec<f32> = Voice::calibration().render(SAMPLE_RATE).collect();
        assert_eq!(samples.len(), 441);
        assert!(samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn render_length_matches_duration() {
        let v = Voice::chime(523.25);
        let samples = v.render(SAMPLE_RATE);
        assert_eq!(samples.len(), 52_920);
        assert!(samples.clone().all(|s| s.abs() <= 0.25 + 1e-6));
    }

    #[test]
    fn volume_is_clamped() {
        assert_eq!(Voice::tap(3.0).peak_gain, 1.0);
        assert_eq!(Voice::tap(-1.0).peak_gain, 0.0);
    }
}
