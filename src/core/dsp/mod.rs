//! Digital Signal Processing utilities shared by the spectral engine and the detectors

pub mod chroma;
pub mod fft;
pub mod hilbert;
pub mod mel;
pub mod stats;
pub mod wavelet;
pub mod windows;

pub use fft::{real_spectrum, FrameLayout, StftProcessor};
pub use stats::{summarise, SummaryStatistics, SUMMARY_FIELDS};
pub use windows::hann_window;
