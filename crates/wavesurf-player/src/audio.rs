//! WAV decoding into renderer channel data

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use wavesurf_core::AudioChannelData;

/// Decode a WAV file to normalized float channels
pub fn load_wav(path: &Path) -> Result<AudioChannelData> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        bail!("{:?}: invalid WAV header", path);
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Failed to decode {:?}", path))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Failed to decode {:?}", path))?
        }
    };

    log::info!(
        "Loaded {:?}: {} ch, {} Hz, {} frames",
        path,
        spec.channels,
        spec.sample_rate,
        samples.len() / spec.channels as usize
    );
    Ok(AudioChannelData::from_interleaved(
        &samples,
        spec.channels as usize,
        spec.sample_rate,
    ))
}

/// Decode on the blocking pool
pub async fn load_wav_async(path: PathBuf) -> std::result::Result<AudioChannelData, String> {
    tokio::task::spawn_blocking(move || load_wav(&path).map_err(|e| format!("{:#}", e)))
        .await
        .map_err(|e| e.to_string())?
}
