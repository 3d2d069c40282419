// src/core/decoder.rs
//
// Ingestion: decode a file with Symphonia, optionally downmix and resample it,
// then remove DC and peak-normalize so the buffer satisfies the core's contract.

use log::{debug, info};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::audio::{downmix_channels, AudioBuffer, Samples};
use crate::error::{IngestionError, SUPPORTED_FORMATS};

const RESAMPLE_CHUNK: usize = 1024;

/// Ingestion options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Resample to this rate; `None` keeps the file's native rate
    pub target_sample_rate: Option<u32>,
    /// Average all channels into one
    pub downmix_to_mono: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            target_sample_rate: Some(44100),
            downmix_to_mono: true,
        }
    }
}

/// Load an audio file into a normalized [`AudioBuffer`]
pub fn load(
    path: &Path,
    target_sample_rate: Option<u32>,
    downmix_to_mono: bool,
) -> Result<AudioBuffer, IngestionError> {
    load_with_options(
        path,
        &LoadOptions {
            target_sample_rate,
            downmix_to_mono,
        },
    )
}

pub fn load_with_options(path: &Path, options: &LoadOptions) -> Result<AudioBuffer, IngestionError> {
    if !path.exists() {
        return Err(IngestionError::NotFound(path.to_path_buf()));
    }
    check_extension(path)?;

    let size = std::fs::metadata(path)
        .map_err(|e| IngestionError::decode(path, e))?
        .len();
    if size == 0 {
        return Err(IngestionError::Empty(path.to_path_buf()));
    }

    let decoded = decode_channels(path)?;
    if decoded.channels.first().map_or(true, |c| c.is_empty()) {
        return Err(IngestionError::Empty(path.to_path_buf()));
    }
    info!(
        "Decoded {}: {} channel(s), {} Hz, {} frames",
        path.display(),
        decoded.channels.len(),
        decoded.sample_rate,
        decoded.channels[0].len()
    );

    let mut channels = decoded.channels;
    if options.downmix_to_mono && channels.len() > 1 {
        channels = vec![downmix_channels(&channels)];
    }

    let mut sample_rate = decoded.sample_rate;
    if let Some(target) = options.target_sample_rate {
        if target != sample_rate && target > 0 {
            debug!("Resampling {} Hz -> {} Hz", sample_rate, target);
            channels = resample(&channels, sample_rate, target)?;
            sample_rate = target;
        }
    }

    for channel in channels.iter_mut() {
        remove_dc(channel);
    }
    peak_normalize(&mut channels);

    let samples = if channels.len() == 1 {
        Samples::Mono(channels.pop().unwrap_or_default())
    } else {
        Samples::Multi(channels)
    };

    AudioBuffer::new(samples, sample_rate)
        .map(|b| b.with_source(path))
        .map_err(|e| IngestionError::decode(path, e))
}

fn check_extension(path: &Path) -> Result<(), IngestionError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    if SUPPORTED_FORMATS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(IngestionError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: if extension.is_empty() {
                "<none>".to_string()
            } else {
                extension
            },
        })
    }
}

struct DecodedAudio {
    channels: Vec<Vec<f64>>,
    sample_rate: u32,
}

/// Decode every packet of the first audio track into channel-major f64 data
fn decode_channels(path: &Path) -> Result<DecodedAudio, IngestionError> {
    let file = File::open(path).map_err(|e| IngestionError::decode(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| IngestionError::decode(path, format!("failed to probe format: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| IngestionError::decode(path, "no supported audio track found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| IngestionError::decode(path, "file does not specify a sample rate"))?;
    let channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
    if channel_count == 0 {
        return Err(IngestionError::decode(path, "file reports 0 audio channels"));
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| IngestionError::decode(path, format!("failed to create decoder: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match probed.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(IngestionError::decode(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(IngestionError::decode(path, e)),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    Ok(DecodedAudio {
        channels: deinterleave(&interleaved, channel_count),
        sample_rate,
    })
}

/// Split interleaved frames into channel-major vectors; a trailing partial frame is dropped
fn deinterleave(interleaved: &[f32], channel_count: usize) -> Vec<Vec<f64>> {
    let frames = interleaved.len() / channel_count;
    (0..channel_count)
        .map(|ch| {
            (0..frames)
                .map(|i| interleaved[i * channel_count + ch] as f64)
                .collect()
        })
        .collect()
}

fn resample(
    channels: &[Vec<f64>],
    from: u32,
    to: u32,
) -> Result<Vec<Vec<f64>>, IngestionError> {
    let resample_err = |reason: String| IngestionError::Resample { target: to, reason };
    let ratio = to as f64 / from as f64;
    let frames = channels.first().map_or(0, |c| c.len());
    let expected = (frames as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f64>::new(ratio, 1.0, params, RESAMPLE_CHUNK, channels.len())
            .map_err(|e| resample_err(e.to_string()))?;

    let mut output: Vec<Vec<f64>> = vec![Vec::with_capacity(expected); channels.len()];
    let mut push = |chunk: Vec<Vec<f64>>| {
        for (out, part) in output.iter_mut().zip(chunk) {
            out.extend(part);
        }
    };

    let mut pos = 0;
    while pos + RESAMPLE_CHUNK <= frames {
        let chunk: Vec<&[f64]> = channels.iter().map(|c| &c[pos..pos + RESAMPLE_CHUNK]).collect();
        push(resampler.process(&chunk[..], None).map_err(|e| resample_err(e.to_string()))?);
        pos += RESAMPLE_CHUNK;
    }
    if pos < frames {
        let tail: Vec<&[f64]> = channels.iter().map(|c| &c[pos..]).collect();
        push(
            resampler
                .process_partial(Some(&tail[..]), None)
                .map_err(|e| resample_err(e.to_string()))?,
        );
    }
    // Flush the filter delay line
    push(
        resampler
            .process_partial::<&[f64]>(None, None)
            .map_err(|e| resample_err(e.to_string()))?,
    );

    let delay = resampler.output_delay();
    Ok(output
        .into_iter()
        .map(|c| {
            let mut trimmed: Vec<f64> = c.into_iter().skip(delay).collect();
            trimmed.resize(expected, 0.0);
            trimmed
        })
        .collect())
}

fn remove_dc(channel: &mut [f64]) {
    if channel.is_empty() {
        return;
    }
    let mean = channel.iter().sum::<f64>() / channel.len() as f64;
    channel.iter_mut().for_each(|s| *s -= mean);
}

/// Scale all channels jointly so the loudest sample sits at |1.0|; silence is left alone
fn peak_normalize(channels: &mut [Vec<f64>]) {
    let peak = channels
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f64, |acc, s| acc.max(s.abs()));
    if peak > 0.0 && peak.is_finite() {
        for s in channels.iter_mut().flat_map(|c| c.iter_mut()) {
            *s /= peak;
        }
    }
}
