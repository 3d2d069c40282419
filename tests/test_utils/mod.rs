#![allow(dead_code)]

use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::process::Command;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_frequencipher"))
}

pub fn run_frequencipher<P: AsRef<std::ffi::OsStr>>(file_path: P) -> Command {
    let mut cmd = Command::new(get_binary_path());
    cmd.arg(file_path);
    cmd
}

pub fn sine(frequency: f64, amplitude: f64, seconds: f64, sample_rate: u32) -> Vec<f64> {
    let n = (seconds * sample_rate as f64) as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f64 / sample_rate as f64).sin())
        .collect()
}

pub fn white_noise(amplitude: f64, seconds: f64, sample_rate: u32, seed: u64) -> Vec<f64> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let n = (seconds * sample_rate as f64) as usize;
    (0..n).map(|_| amplitude * rng.gen_range(-1.0..1.0)).collect()
}

/// Signal followed by its own reversal
pub fn palindrome(half: &[f64]) -> Vec<f64> {
    half.iter().chain(half.iter().rev()).copied().collect()
}

/// Write interleaved 16-bit PCM
pub fn write_wav(path: &Path, channels: &[Vec<f64>], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    let frames = channels.first().map_or(0, |c| c.len());
    for i in 0..frames {
        for channel in channels {
            let value = (channel[i].clamp(-1.0, 1.0) * 32767.0) as i16;
            writer.write_sample(value).expect("Failed to write sample");
        }
    }
    writer.finalize().expect("Failed to finalize WAV");
}

pub fn write_mono_wav(dir: &Path, name: &str, samples: &[f64], sample_rate: u32) -> PathBuf {
    let path = dir.join(name);
    write_wav(&path, &[samples.to_vec()], sample_rate);
    path
}
