//! FFT amplitude spectrum and Welch power spectral density

use crate::CaptureError;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Longest Welch segment
pub const MAX_SEGMENT: usize = 4096;

/// Fewest samples a PSD estimate is computed from
pub const MIN_PSD_SAMPLES: usize = 16;

/// One-sided spectrum: frequencies in Hz and a value per frequency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub values: Vec<f64>,
}

impl Spectrum {
    /// Frequency and value of the largest bin above DC
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.freqs
            .iter()
            .zip(&self.values)
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&f, &v)| (f, v))
    }
}

/// FFT-based spectral estimates at a fixed sample rate
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f64>,
    sample_rate: f64,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            planner: FftPlanner::new(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Amplitude spectrum `|X| / N` of the mean-removed signal
    pub fn amplitude(&mut self, signal: &[f64]) -> Result<Spectrum, CaptureError> {
        let n = signal.len();
        if n == 0 {
            return Err(CaptureError::SignalTooShort { needed: 1, actual: 0 });
        }
        let mean = signal.iter().sum::<f64>() / n as f64;
        let mut buffer: Vec<Complex<f64>> =
            signal.iter().map(|&x| Complex::new(x - mean, 0.0)).collect();
        self.planner.plan_fft_forward(n).process(&mut buffer);

        let bins = n / 2 + 1;
        Ok(Spectrum {
            freqs: rfft_freqs(bins, n, self.sample_rate),
            values: buffer[..bins].iter().map(|c| c.norm() / n as f64).collect(),
        })
    }

    /// Welch PSD in units²/Hz: Hann segments of up to [`MAX_SEGMENT`]
    /// samples, half overlap, mean removed per segment, segments averaged
    pub fn welch_psd(&mut self, signal: &[f64]) -> Result<Spectrum, CaptureError> {
        let n = signal.len();
        if n < MIN_PSD_SAMPLES {
            return Err(CaptureError::SignalTooShort {
                needed: MIN_PSD_SAMPLES,
                actual: n,
            });
        }

        let segment = n.min(MAX_SEGMENT);
        let step = segment - segment / 2;
        let window: Vec<f64> = (0..segment)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / segment as f64).cos())
            .collect();
        let scale = 1.0 / (self.sample_rate * window.iter().map(|w| w * w).sum::<f64>());
        let fft = self.planner.plan_fft_forward(segment);

        let bins = segment / 2 + 1;
        let mut density = vec![0.0; bins];
        let mut segments = 0usize;
        let mut buffer = vec![Complex::new(0.0, 0.0); segment];

        let mut start = 0;
        while start + segment <= n {
            let chunk = &signal[start..start + segment];
            let mean = chunk.iter().sum::<f64>() / segment as f64;
            for ((slot, &x), &w) in buffer.iter_mut().zip(chunk).zip(&window) {
                *slot = Complex::new((x - mean) * w, 0.0);
            }
            fft.process(&mut buffer);

            for (k, acc) in density.iter_mut().enumerate() {
                let mut power = buffer[k].norm_sqr() * scale;
                let nyquist = segment % 2 == 0 && k == bins - 1;
                if k != 0 && !nyquist {
                    power *= 2.0;
                }
                *acc += power;
            }
            segments += 1;
            start += step;
        }

        for value in &mut density {
            *value /= segments as f64;
        }

        Ok(Spectrum {
            freqs: rfft_freqs(bins, segment, self.sample_rate),
            values: density,
        })
    }
}

/// Trapezoidal integral of a PSD over `[low_hz, high_hz]`
pub fn band_power(psd: &Spectrum, low_hz: f64, high_hz: f64) -> f64 {
    let (freqs, values): (Vec<f64>, Vec<f64>) = psd
        .freqs
        .iter()
        .zip(&psd.values)
        .filter(|(f, _)| **f >= low_hz && **f <= high_hz)
        .map(|(&f, &v)| (f, v))
        .unzip();

    freqs
        .windows(2)
        .zip(values.windows(2))
        .map(|(f, v)| (f[1] - f[0]) * (v[0] + v[1]) / 2.0)
        .sum()
}

fn rfft_freqs(bins: usize, n: usize, sample_rate: f64) -> Vec<f64> {
    (0..bins).map(|k| k as f64 * sample_rate / n as f64).collect()
}
