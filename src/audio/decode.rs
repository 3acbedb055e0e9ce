//! # Audio Decoding
//!
//! Converts an uploaded clip into the 16kHz mono float samples that
//! Whisper expects.
//!
//! ## Steps:
//! 1. **Probe** the container (`symphonia`), using the file extension as a hint
//! 2. **Decode** packets of the first audio track into interleaved `f32`
//! 3. **Downmix** interleaved channels by averaging each frame
//! 4. **Resample** to 16kHz with a windowed-sinc resampler (`rubato`)
//!
//! ## Supported Inputs:
//! WAV/PCM, FLAC, MP3, AAC/M4A, Ogg Vorbis and Vorbis-in-WebM. Opus streams
//! (the usual browser recording codec) have no decoder in symphonia and are
//! reported as `AudioError::Unsupported`.

use super::AudioError;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Sample rate expected by the speech model.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

const RESAMPLE_CHUNK: usize = 1024;

/// Decode the audio file at `path`.
pub fn decode_audio_file(path: &Path) -> Result<Vec<f32>, AudioError> {
    let file = File::open(path)?;

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    decode_source(Box::new(file), &hint)
}

fn decode_source(source: Box<dyn MediaSource>, hint: &Hint) -> Result<Vec<f32>, AudioError> {
    let stream = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::InvalidFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::InvalidFormat("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Unsupported("stream does not declare a sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Unsupported(e.to_string()))?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::InvalidFormat(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet costs a few milliseconds of audio, not the clip
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioError::InvalidFormat(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            return Err(AudioError::Unsupported("stream declares zero channels".to_string()));
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        mono.extend(downmix(buffer.samples(), channels));
    }

    if mono.is_empty() {
        return Err(AudioError::Empty);
    }

    tracing::debug!(
        codec = ?codec_params.codec,
        sample_rate = source_rate,
        frames = mono.len(),
        "Decoded audio upload"
    );

    resample(&mono, source_rate, TARGET_SAMPLE_RATE)
}

/// Average interleaved frames down to a single channel.
/// A trailing partial frame is dropped.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampling of a mono signal.
///
/// The input is fed in fixed chunks with the last one zero-padded; the
/// output is cut back to `len * to_rate / from_rate` samples.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let expected_len = (samples.len() as f64 * ratio).round() as usize;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let mut output = Vec::with_capacity(expected_len + RESAMPLE_CHUNK);
    for chunk in samples.chunks(RESAMPLE_CHUNK) {
        let mut input = chunk.to_vec();
        input.resize(RESAMPLE_CHUNK, 0.0);

        let waves_in = vec![input];
        let resampled = resampler
            .process(&waves_in, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if let Some(channel) = resampled.into_iter().next() {
            output.extend(channel);
        }
    }

    output.truncate(expected_len);
    Ok(output)
}
