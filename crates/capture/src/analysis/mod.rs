//! Offline signal analysis of captured channels
//!
//! Band-pass filtering, spectra, and a report of what the filter costs in
//! latency and gains in signal-to-noise ratio.

mod filter;
mod spectrum;

pub use filter::{
    trace_signal, Biquad, FilterChain, FilterSpec, FrequencyResponse, MAX_ORDER, RESPONSE_POINTS,
};
pub use spectrum::{band_power, Spectrum, SpectrumAnalyzer, MAX_SEGMENT, MIN_PSD_SAMPLES};

use crate::CaptureError;
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

/// Floor added to band powers before taking their ratio
const POWER_FLOOR: f64 = 1e-12;

/// Latency and noise figures of a filter applied to one signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyReport {
    /// Mean group delay across the signal band
    pub group_delay_ms: f64,
    /// Delay of the causal output behind the zero-phase output
    pub latency_ms: f64,
    pub snr_raw_db: f64,
    pub snr_filtered_db: f64,
    /// Filtered minus raw SNR
    pub snr_gain_db: f64,
}

/// Filter `signal` and measure the result against the band
/// `[band_low_hz, band_high_hz]`.
///
/// Noise is everything outside the band up to Nyquist.
pub fn analyze_latency_and_snr(
    chain: &FilterChain,
    signal: &[f64],
    band_low_hz: f64,
    band_high_hz: f64,
) -> Result<LatencyReport, CaptureError> {
    if signal.len() < MIN_PSD_SAMPLES {
        return Err(CaptureError::SignalTooShort {
            needed: MIN_PSD_SAMPLES,
            actual: signal.len(),
        });
    }
    if band_low_hz >= band_high_hz {
        return Err(CaptureError::InvalidFilter(format!(
            "signal band {}..{} Hz is empty",
            band_low_hz, band_high_hz
        )));
    }

    let fs = chain.sample_rate_hz();
    let response = chain.frequency_response(RESPONSE_POINTS);
    let in_band: Vec<f64> = response
        .freqs
        .iter()
        .zip(response.group_delay())
        .filter(|(f, _)| (band_low_hz..=band_high_hz).contains(*f))
        .map(|(_, delay)| delay)
        .collect();
    let group_delay_ms = if in_band.is_empty() {
        0.0
    } else {
        in_band.iter().sum::<f64>() / in_band.len() as f64 * 1000.0
    };

    let filtered = chain.apply(signal);
    let zero_phase = chain.filtfilt(signal);
    let lag = best_lag(&zero_phase, &filtered);
    let latency_ms = -(lag as f64) / fs * 1000.0;

    let mut analyzer = SpectrumAnalyzer::new(fs);
    let snr_raw_db = snr_db(&analyzer.welch_psd(signal)?, band_low_hz, band_high_hz, fs);
    let snr_filtered_db = snr_db(&analyzer.welch_psd(&filtered)?, band_low_hz, band_high_hz, fs);

    let report = LatencyReport {
        group_delay_ms,
        latency_ms,
        snr_raw_db,
        snr_filtered_db,
        snr_gain_db: snr_filtered_db - snr_raw_db,
    };
    debug!("Filter analysis over {} samples: {:?}", signal.len(), report);
    Ok(report)
}

fn snr_db(psd: &Spectrum, low: f64, high: f64, fs: f64) -> f64 {
    let signal = band_power(psd, low, high);
    let noise = band_power(psd, 0.0, low) + band_power(psd, high, fs / 2.0);
    10.0 * ((signal + POWER_FLOOR) / (noise + POWER_FLOOR)).log10()
}

/// Lag `k` maximising `sum a[n + k] * b[n]`, over all overlapping lags
fn best_lag(a: &[f64], b: &[f64]) -> isize {
    let n = a.len().max(b.len());
    if n == 0 {
        return 0;
    }
    let size = (2 * n - 1).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let padded = |x: &[f64]| {
        let mut buffer = vec![Complex::new(0.0, 0.0); size];
        for (slot, &v) in buffer.iter_mut().zip(x) {
            *slot = Complex::new(v, 0.0);
        }
        buffer
    };
    let mut fa = padded(a);
    let mut fb = padded(b);
    forward.process(&mut fa);
    forward.process(&mut fb);

    let mut cross: Vec<Complex<f64>> = fa.iter().zip(&fb).map(|(x, y)| x * y.conj()).collect();
    inverse.process(&mut cross);

    // Index k holds lag k, index size - m holds lag -m
    let max_lag = n as isize - 1;
    (-max_lag..=max_lag)
        .map(|lag| {
            let index = if lag >= 0 { lag as usize } else { size - lag.unsigned_abs() };
            (lag, cross[index].re)
        })
        .max_by(|x, y| x.1.total_cmp(&y.1))
        .map_or(0, |(lag, _)| lag)
}
