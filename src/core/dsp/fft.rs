//! Frame layout and short-time Fourier transform

use std::sync::Arc;

use log::debug;
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};

use super::windows::hann_window;
use crate::core::cancel::CancelToken;
use crate::error::{ForensicError, Result};

/// Frames processed between two cancellation checks
pub const CANCEL_CHECK_INTERVAL: usize = 64;

/// Effective window/hop geometry for a signal of a given length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub window: usize,
    pub hop: usize,
    pub frames: usize,
    /// True when the requested window was longer than the signal
    pub clamped: bool,
}

impl FrameLayout {
    /// Clamp the window to the signal (never below 2 samples) and derive the frame count.
    ///
    /// When the window had to be clamped, the hop becomes `min(hop, max(1, window / 4))`.
    /// Signals shorter than the window are zero-padded into a single frame, so the frame
    /// count is always `(sample_count - window) / hop + 1` with saturating subtraction.
    pub fn resolve(sample_count: usize, n_fft: usize, hop: usize) -> Self {
        let requested = n_fft.max(2);
        let window = requested.min(sample_count).max(2);
        let clamped = window < requested;
        let hop = if clamped {
            hop.max(1).min((window / 4).max(1))
        } else {
            hop.max(1)
        };
        let frames = sample_count.saturating_sub(window) / hop + 1;

        Self {
            window,
            hop,
            frames,
            clamped,
        }
    }

    /// Number of non-negative frequency bins
    pub fn bins(&self) -> usize {
        self.window / 2 + 1
    }

    /// Centre frequency of every bin in Hz
    pub fn bin_frequencies(&self, sample_rate: u32) -> Vec<f64> {
        (0..self.bins())
            .map(|k| k as f64 * sample_rate as f64 / self.window as f64)
            .collect()
    }

    /// Copy frame `index` into `out`, zero-padding past the end of the signal
    pub fn fill_frame(&self, samples: &[f64], index: usize, out: &mut [f64]) {
        let start = index * self.hop;
        for (i, slot) in out.iter_mut().enumerate().take(self.window) {
            *slot = samples.get(start + i).copied().unwrap_or(0.0);
        }
    }
}

/// Windowed real FFT over successive frames
pub struct StftProcessor {
    layout: FrameLayout,
    window: Vec<f64>,
    fft: Arc<dyn RealToComplex<f64>>,
}

impl StftProcessor {
    pub fn new(layout: FrameLayout) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(layout.window);
        Self {
            layout,
            window: hann_window(layout.window),
            fft,
        }
    }

    /// Resolve the layout for `samples` and build a processor for it
    pub fn for_signal(samples: &[f64], n_fft: usize, hop: usize) -> Self {
        let layout = FrameLayout::resolve(samples.len(), n_fft, hop);
        debug!(
            "STFT layout: window={} hop={} frames={} clamped={}",
            layout.window, layout.hop, layout.frames, layout.clamped
        );
        Self::new(layout)
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Complex spectrum of every frame, frame-major (`frames x bins`)
    pub fn complex_frames(
        &self,
        samples: &[f64],
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<Complex64>>> {
        let mut input = self.fft.make_input_vec();
        let mut frames = Vec::with_capacity(self.layout.frames);

        for index in 0..self.layout.frames {
            if index % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
            self.layout.fill_frame(samples, index, &mut input);
            for (s, w) in input.iter_mut().zip(&self.window) {
                *s *= w;
            }
            let mut spectrum = self.fft.make_output_vec();
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|e| ForensicError::computation(format!("FFT failed: {}", e)))?;
            frames.push(spectrum);
        }

        Ok(frames)
    }

    /// Magnitude spectrum of every frame, frame-major (`frames x bins`)
    pub fn magnitude_frames(&self, samples: &[f64], cancel: &CancelToken) -> Result<Vec<Vec<f64>>> {
        Ok(self
            .complex_frames(samples, cancel)?
            .into_iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect())
    }
}

/// One-sided spectrum of the whole signal (`n / 2 + 1` bins)
pub fn real_spectrum(samples: &[f64]) -> Result<Vec<Complex64>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(samples.len());
    let mut input = samples.to_vec();
    let mut spectrum = fft.make_output_vec();
    fft.process(&mut input, &mut spectrum)
        .map_err(|e| ForensicError::computation(format!("FFT failed: {}", e)))?;
    Ok(spectrum)
}
