//! WAV reading and writing with planar buffers

use std::path::Path;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// A decoded source: one `Vec` per channel
#[derive(Debug, Clone)]
pub struct PlanarAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl PlanarAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Adapt to `count` channels: mono is duplicated, extra channels dropped
    pub fn fit_channels(mut self, count: usize) -> Result<Self> {
        match (self.channels.len(), count) {
            (n, c) if n == c => {}
            (1, c) => {
                let mono = self.channels.remove(0);
                self.channels = vec![mono; c];
            }
            (n, c) if n > c => self.channels.truncate(c),
            (n, c) => bail!("Cannot feed a {}-channel group from {} channels", c, n),
        }
        Ok(self)
    }
}

/// Read a WAV file into planar `f32` buffers
pub fn read(path: &Path) -> Result<PlanarAudio> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let spec = reader.spec();
    let channel_count = spec.channels as usize;
    if channel_count == 0 {
        bail!("{:?} has no channels", path);
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("Failed to decode {:?}", path))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<Vec<f32>, _>>()
                .with_context(|| format!("Failed to decode {:?}", path))?
        }
    };

    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    log::info!(
        "Read {:?}: {} ch, {} Hz, {} frames",
        path,
        channel_count,
        spec.sample_rate,
        frames
    );
    Ok(PlanarAudio {
        sample_rate: spec.sample_rate,
        channels,
    })
}

/// Write planar buffers as a 32-bit float WAV file
pub fn write(path: &Path, sample_rate: u32, channels: &[Vec<f32>]) -> Result<()> {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let frames = channels.first().map(Vec::len).unwrap_or(0);

    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;
    for i in 0..frames {
        for channel in channels {
            writer
                .write_sample(channel[i])
                .with_context(|| format!("Failed to write {:?}", path))?;
        }
    }
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize {:?}", path))?;

    log::info!("Wrote {:?}: {} ch, {} frames", path, channels.len(), frames);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let left = vec![0.0, 0.25, -0.5];
        let right = vec![1.0, -1.0, 0.125];

        write(&path, 44100, &[left.clone(), right.clone()]).unwrap();
        let audio = read(&path).unwrap();

        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.frames(), 3);
        assert_eq!(audio.channels, vec![left, right]);
    }

    #[test]
    fn test_int_samples_are_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(-32768i16).unwrap();
        writer.finalize().unwrap();

        let audio = read(&path).unwrap();
        assert!((audio.channels[0][0] - 0.5).abs() < 1e-6);
        assert!((audio.channels[0][1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_channels() {
        let mono = PlanarAudio {
            sample_rate: 48000,
            channels: vec![vec![0.5; 4]],
        };
        let stereo = mono.clone().fit_channels(2).unwrap();
        assert_eq!(stereo.channels.len(), 2);
        assert_eq!(stereo.channels[1], vec![0.5; 4]);

        let back = stereo.clone().fit_channels(1).unwrap();
        assert_eq!(back.channels.len(), 1);

        let quad = PlanarAudio {
            sample_rate: 48000,
            channels: vec![vec![0.0; 4]; 2],
        };
        assert!(quad.fit_channels(4).is_err());
    }
}
