//! Audio decode glue.
//!
//! Turns container bytes (WAV, MP3, ...) into the mono float buffer the
//! engine consumes: symphonia decode, channel-average mixdown, sinc
//! resampling to the engine rate. This sits outside the core pipeline; the
//! engine itself only ever sees sample buffers.

use std::io::Cursor;

use rayon::{iter::ParallelIterator, slice::ParallelSlice};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, WindowFunction};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions},
    formats::{FormatOptions, FormatReader, Track},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported or corrupt container: {0}")]
    Format(#[from] symphonia::core::errors::Error),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("track is missing codec parameters")]
    MissingParams,

    #[error("resampler construction failed: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),
}

/// Decode container bytes to a mono buffer at `target_rate`.
pub fn decode_to_mono(bytes: &[u8], target_rate: u32) -> Result<Vec<f32>, DecodeError> {
    let (samples, rate, channels) = decode_audio(bytes)?;
    let mono = to_mono(&samples, channels);
    resample(&mono, rate, target_rate)
}

/// Scale a buffer so its peak amplitude is 1. Silence passes through.
pub fn normalize(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak == 0.0 {
        return samples.to_vec();
    }
    samples.iter().map(|s| s / peak).collect()
}

fn decode_audio(bytes: &[u8]) -> Result<(Vec<f32>, u32, usize), DecodeError> {
    let cursor = Cursor::new(bytes.to_vec());
    let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format: Box<dyn FormatReader> = probed.format;

    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let sample_rate = track.codec_params.sample_rate.ok_or(DecodeError::MissingParams)?;
    let channels = track
        .codec_params
        .channels
        .ok_or(DecodeError::MissingParams)?
        .count();
    let track_id = track.id;

    let mut decoder = make_decoder(track)?;
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break, // end of stream
        };
        if packet.track_id() != track_id {
            continue;
        }

        // skip undecodable packets rather than failing the whole file
        let Ok(decoded) = decoder.decode(&packet) else {
            continue;
        };

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    Ok((samples, sample_rate, channels))
}

fn make_decoder(track: &Track) -> Result<Box<dyn Decoder>, DecodeError> {
    Ok(symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?)
}

fn to_mono(input: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return input.to_vec();
    }
    input
        .par_chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }

    let chunk_size = 1024;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        oversampling_factor: 64,
        interpolation: rubato::SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        2.0,
        params,
        chunk_size,
        1,
    )?;

    let mut output = Vec::new();
    let mut position = 0;

    while position + chunk_size <= input.len() {
        let chunk = vec![input[position..position + chunk_size].to_vec()];
        let result = resampler.process(&chunk, None)?;
        output.extend_from_slice(&result[0]);
        position += chunk_size;
    }

    let remaining = input.len() - position;
    if remaining > 0 {
        let mut padded = vec![0.0; chunk_size];
        padded[..remaining].copy_from_slice(&input[position..]);
        let result = resampler.process(&[padded], None)?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output)
}
