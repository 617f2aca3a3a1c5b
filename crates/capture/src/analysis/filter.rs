//! IIR band-pass design and filtering as a chain of second-order sections

use crate::{CaptureError, ChannelTrace};
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Highest order accepted for either edge
pub const MAX_ORDER: usize = 10;

/// Points on the default response grid
pub const RESPONSE_POINTS: usize = 4096;

/// Band-pass as a Butterworth high-pass followed by a Butterworth low-pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub sample_rate_hz: f64,
    pub hp_cut_hz: f64,
    pub lp_cut_hz: f64,
    pub hp_order: usize,
    pub lp_order: usize,
}

impl FilterSpec {
    /// 3 Hz / order 2 high-pass with a 60 Hz / order 4 low-pass
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            hp_cut_hz: 3.0,
            lp_cut_hz: 60.0,
            hp_order: 2,
            lp_order: 4,
        }
    }

    fn validate(&self) -> Result<(), CaptureError> {
        let fs = self.sample_rate_hz;
        if !(fs.is_finite() && fs > 0.0) {
            return invalid(format!("sample rate {} Hz", fs));
        }
        for (name, cut, order) in [
            ("high-pass", self.hp_cut_hz, self.hp_order),
            ("low-pass", self.lp_cut_hz, self.lp_order),
        ] {
            if !(cut > 0.0 && cut < fs / 2.0) {
                return invalid(format!(
                    "{} cutoff {} Hz outside (0, {}) Hz",
                    name,
                    cut,
                    fs / 2.0
                ));
            }
            if order == 0 || order > MAX_ORDER {
                return invalid(format!("{} order {} outside 1..={}", name, order, MAX_ORDER));
            }
        }
        if self.hp_cut_hz >= self.lp_cut_hz {
            return invalid(format!(
                "high-pass cutoff {} Hz must be below low-pass cutoff {} Hz",
                self.hp_cut_hz, self.lp_cut_hz
            ));
        }
        Ok(())
    }
}

fn invalid<T>(message: String) -> Result<T, CaptureError> {
    Err(CaptureError::InvalidFilter(message))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    LowPass,
    HighPass,
}

/// One second-order section, normalised so that `a0 == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Bilinear-transformed second-order section with prewarped cutoff
    fn second_order(edge: Edge, cutoff: f64, fs: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / fs;
        let cos = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        let b = match edge {
            Edge::LowPass => [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            Edge::HighPass => [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
        };
        Self {
            b: [b[0] / a0, b[1] / a0, b[2] / a0],
            a: [1.0, -2.0 * cos / a0, (1.0 - alpha) / a0],
        }
    }

    /// First-order section stored with zero second taps
    fn first_order(edge: Edge, cutoff: f64, fs: f64) -> Self {
        let k = (PI * cutoff / fs).tan();
        let a1 = (k - 1.0) / (k + 1.0);
        let b = match edge {
            Edge::LowPass => [k / (1.0 + k), k / (1.0 + k), 0.0],
            Edge::HighPass => [1.0 / (1.0 + k), -1.0 / (1.0 + k), 0.0],
        };
        Self {
            b,
            a: [1.0, a1, 0.0],
        }
    }

    /// Complex gain at normalised angular frequency `w` (rad/sample)
    pub fn response(&self, w: f64) -> Complex<f64> {
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b[0] + z1 * self.b[1] + z2 * self.b[2];
        let den = self.a[0] + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }
}

/// Butterworth cascade: one section per pole pair, plus a first-order
/// section for odd orders
fn butterworth(edge: Edge, order: usize, cutoff: f64, fs: f64) -> Vec<Biquad> {
    let mut sections: Vec<Biquad> = (0..order / 2)
        .map(|k| {
            let q = 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2 * order) as f64).sin());
            Biquad::second_order(edge, cutoff, fs, q)
        })
        .collect();
    if order % 2 == 1 {
        sections.push(Biquad::first_order(edge, cutoff, fs));
    }
    sections
}

/// Sampled frequency response of a chain
#[derive(Debug, Clone, Default)]
pub struct FrequencyResponse {
    /// Grid frequencies in Hz, from 0 up to (excluding) Nyquist
    pub freqs: Vec<f64>,
    pub gains: Vec<Complex<f64>>,
}

impl FrequencyResponse {
    /// Magnitude in dB, floored at -240 dB
    pub fn magnitude_db(&self) -> Vec<f64> {
        self.gains
            .iter()
            .map(|h| 20.0 * h.norm().max(1e-12).log10())
            .collect()
    }

    /// Group delay in seconds at each grid frequency: the negative slope of
    /// the unwrapped phase against angular frequency
    pub fn group_delay(&self) -> Vec<f64> {
        let phase = unwrap_phase(&self.gains.iter().map(|h| h.arg()).collect::<Vec<_>>());
        let omega: Vec<f64> = self.freqs.iter().map(|f| 2.0 * PI * f).collect();
        let dphase = gradient(&phase);
        let domega = gradient(&omega);
        dphase
            .iter()
            .zip(&domega)
            .map(|(dp, dw)| -dp / (dw + 1e-12))
            .collect()
    }
}

/// Cascade of sections applied in order
#[derive(Debug, Clone)]
pub struct FilterChain {
    sections: Vec<Biquad>,
    sample_rate_hz: f64,
}

impl FilterChain {
    /// Design the high-pass then low-pass chain
    pub fn design(spec: &FilterSpec) -> Result<Self, CaptureError> {
        spec.validate()?;
        let fs = spec.sample_rate_hz;
        let mut sections = butterworth(Edge::HighPass, spec.hp_order, spec.hp_cut_hz, fs);
        sections.extend(butterworth(Edge::LowPass, spec.lp_order, spec.lp_cut_hz, fs));
        Ok(Self {
            sections,
            sample_rate_hz: fs,
        })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Causal filtering from a zero initial state
    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        let mut out = signal.to_vec();
        for section in &self.sections {
            run_section(section, &mut out);
        }
        out
    }

    /// Filter one captured channel
    pub fn apply_trace(&self, trace: &ChannelTrace) -> Vec<f64> {
        self.apply(&trace_signal(trace))
    }

    /// Zero-phase filtering: forward, then backward over the reversed
    /// output. The signal is extended by odd reflection at both ends to
    /// tame edge transients.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }
        let pad = (3 * (2 * self.sections.len() + 1)).min(n - 1);

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * signal[0] - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=pad).map(|i| 2.0 * signal[n - 1] - signal[n - 1 - i]));

        let mut forward = self.apply(&extended);
        forward.reverse();
        let mut backward = self.apply(&forward);
        backward.reverse();
        backward[pad..pad + n].to_vec()
    }

    /// Complex gain at `freq_hz`
    pub fn response_at(&self, freq_hz: f64) -> Complex<f64> {
        let w = 2.0 * PI * freq_hz / self.sample_rate_hz;
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(w))
    }

    /// Response on `points` evenly spaced frequencies from DC
    pub fn frequency_response(&self, points: usize) -> FrequencyResponse {
        let nyquist = self.sample_rate_hz / 2.0;
        let freqs: Vec<f64> = (0..points)
            .map(|i| i as f64 * nyquist / points as f64)
            .collect();
        let gains = freqs.iter().map(|&f| self.response_at(f)).collect();
        FrequencyResponse { freqs, gains }
    }
}

/// Transposed direct form II, in place
fn run_section(section: &Biquad, data: &mut [f64]) {
    let [b0, b1, b2] = section.b;
    let [_, a1, a2] = section.a;
    let (mut z1, mut z2) = (0.0, 0.0);
    for x in data.iter_mut() {
        let input = *x;
        let y = b0 * input + z1;
        z1 = b1 * input - a1 * y + z2;
        z2 = b2 * input - a2 * y;
        *x = y;
    }
}

/// Samples of a trace as floating point
pub fn trace_signal(trace: &ChannelTrace) -> Vec<f64> {
    trace.y.iter().map(|&v| f64::from(v)).collect()
}

fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(phase.len());
    let mut offset = 0.0;
    let mut prev: Option<f64> = None;
    for &p in phase {
        if let Some(last) = prev {
            let delta = p - last;
            if delta > PI {
                offset -= 2.0 * PI * ((delta + PI) / (2.0 * PI)).floor();
            } else if delta < -PI {
                offset += 2.0 * PI * ((-delta + PI) / (2.0 * PI)).floor();
            }
        }
        out.push(p + offset);
        prev = Some(p);
    }
    out
}

/// Central differences inside, one-sided at the ends
fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| match i {
                0 => values[1] - values[0],
                i if i == n - 1 => values[n - 1] - values[n - 2],
                i => (values[i + 1] - values[i - 1]) / 2.0,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 1000.0;

    fn chain() -> FilterChain {
        FilterChain::design(&FilterSpec::new(FS)).unwrap()
    }

    fn sine(freq: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_design_section_count() {
        assert_eq!(chain().sections().len(), 3);

        let mut spec = FilterSpec::new(FS);
        spec.hp_order = 3;
        spec.lp_order = 5;
        assert_eq!(FilterChain::design(&spec).unwrap().sections().len(), 2 + 3);
    }

    #[test]
    fn test_magnitude_response() {
        let chain = chain();

        assert!((chain.response_at(20.0).norm() - 1.0).abs() < 0.02);
        // Both edges sit at -3 dB
        assert!((chain.response_at(3.0).norm() - 0.5f64.sqrt()).abs() < 0.02);
        assert!((chain.response_at(60.0).norm() - 0.5f64.sqrt()).abs() < 0.02);
        assert!(chain.response_at(0.5).norm() < 0.05);
        assert!(chain.response_at(300.0).norm() < 0.01);
    }

    #[test]
    fn test_odd_order_cutoff() {
        let mut spec = FilterSpec::new(FS);
        spec.hp_order = 1;
        spec.lp_order = 3;
        let chain = FilterChain::design(&spec).unwrap();

        assert!((chain.response_at(60.0).norm() - 0.5f64.sqrt()).abs() < 0.03);
        assert!(chain.response_at(400.0).norm() < 0.01);
    }

    #[test]
    fn test_passband_and_stopband_sines() {
        let chain = chain();

        let passed = chain.apply(&sine(20.0, 3000));
        let stopped = chain.apply(&sine(200.0, 3000));

        // Skip the start-up transient
        assert!((rms(&passed[1000..]) - 0.5f64.sqrt()).abs() < 0.02);
        assert!(rms(&stopped[1000..]) < 0.01);
    }

    #[test]
    fn test_apply_trace_removes_offset() {
        let trace = ChannelTrace {
            x: (0..4000).collect(),
            y: vec![512; 4000],
        };

        let filtered = chain().apply_trace(&trace);

        assert_eq!(filtered.len(), 4000);
        assert!(filtered[3000..].iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_filtfilt_has_no_lag() {
        let chain = chain();
        let input = sine(20.0, 4000);

        let zero_phase = chain.filtfilt(&input);

        assert_eq!(zero_phase.len(), input.len());
        for i in 1000..3000 {
            assert!((zero_phase[i] - input[i]).abs() < 0.05, "sample {}", i);
        }
    }

    #[test]
    fn test_group_delay_positive_in_band() {
        let response = chain().frequency_response(RESPONSE_POINTS);
        let delay = response.group_delay();

        assert_eq!(delay.len(), RESPONSE_POINTS);
        for (f, d) in response.freqs.iter().zip(&delay) {
            if (10.0..=50.0).contains(f) {
                assert!(*d > 0.0 && *d < 0.05, "{} s at {} Hz", d, f);
            }
        }
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let mut spec = FilterSpec::new(FS);
        spec.lp_cut_hz = 600.0;
        assert!(matches!(FilterChain::design(&spec), Err(CaptureError::InvalidFilter(_))));

        let mut spec = FilterSpec::new(FS);
        spec.hp_cut_hz = 80.0;
        assert!(FilterChain::design(&spec).is_err());

        let mut spec = FilterSpec::new(FS);
        spec.lp_order = 0;
        assert!(FilterChain::design(&spec).is_err());

        assert!(FilterChain::design(&FilterSpec::new(0.0)).is_err());
    }

    #[test]
    fn test_unwrap_phase() {
        let wrapped = [3.0, -3.0, 3.0];
        let unwrapped = unwrap_phase(&wrapped);
        assert!((unwrapped[1] - (2.0 * PI - 3.0)).abs() < 1e-9);
        assert!((unwrapped[2] - 3.0).abs() < 1e-9);
    }
}
