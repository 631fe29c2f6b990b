use std::io::{Cursor, Read};

use anyhow::Context;

use super::frame::StereoFrame;

#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // decoded, resampled to the engine rate
}

impl SampleBuffer {
    // Decode WAV bytes fetched from the asset store
    pub fn decode_wav(bytes: &[u8], target_rate: u32) -> anyhow::Result<Self> {
        Self::decode_reader(Cursor::new(bytes), target_rate)
    }

    pub fn decode_reader<R: Read>(reader: R, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::new(reader).context("not a readable WAV stream")?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            anyhow::bail!("WAV header declares zero channels");
        }
        if spec.sample_format == hound::SampleFormat::Int && !(1..=32).contains(&spec.bits_per_sample) {
            anyhow::bail!("WAV header declares {} bits per integer sample", spec.bits_per_sample);
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        // mono is duplicated, anything past two channels is dropped
        let frames: Vec<StereoFrame> = samples
            .chunks_exact(channels)
            .map(|c| StereoFrame {
                left: c[0],
                right: if channels > 1 { c[1] } else { c[0] },
            })
            .collect();

        let data = if spec.sample_rate != target_rate {
            resample_linear(&frames, spec.sample_rate, target_rate)
        } else {
            frames
        };
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || frames.is_empty() || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let last = frames.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            if idx >= last {
                return frames[last];
            }
            let frac = (src_pos - idx as f64) as f32;
            let (a, b) = (frames[idx], frames[idx + 1]);
            StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::wav_bytes;
    use super::*;

    #[test]
    fn mono_is_duplicated_to_both_sides() {
        let bytes = wav_bytes(44_100, &[16_384, -16_384]);
        let buf = SampleBuffer::decode_wav(&bytes, 44_100).unwrap();
        assert_eq!(buf.len(), 2);
        assert!((buf.data[0].left - 0.5).abs() < 1e-3);
        assert_eq!(buf.data[0].left, buf.data[0].right);
    }

    #[test]
    fn resamples_to_engine_rate() {
        let bytes = wav_bytes(22_050, &[0; 100]);
        let buf = SampleBuffer::decode_wav(&bytes, 44_100).unwrap();
        assert_eq!(buf.len(), 200);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(SampleBuffer::decode_wav(b"definitely not riff data", 44_100).is_err());
    }

    #[test]
    fn zero_bit_header_is_an_error() {
        let mut bytes = wav_bytes(8_000, &[100; 4]);
        // bits_per_sample sits at offset 34 of the canonical header
        bytes[34] = 0;
        bytes[35] = 0;
        assert!(SampleBuffer::decode_wav(&bytes, 8_000).is_err());
    }
}
