//! Planar PSNR kernel.
//!
//! Computes a decibel value per video component:
//! `10 * log10(max_value^2 / mse)`, with positive infinity for identical
//! components. Only uncompressed planar formats are supported; packed and
//! compressed payloads have no per-component value layout to measure.

use gsf_core::{Error, Result, VideoHeader};

fn component_mse<F>(a: &[u8], b: &[u8], value_size: usize, read: F) -> f64
where
    F: Fn(&[u8]) -> f64,
{
    let count = a.len() / value_size;
    if count == 0 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..count {
        let offset = i * value_size;
        let va = read(&a[offset..offset + value_size]);
        let vb = read(&b[offset..offset + value_size]);
        let diff = va - vb;
        acc += diff * diff;
    }
    acc / count as f64
}

/// PSNR per component for two payloads of the same planar format.
///
/// Both buffers must hold at least the total component length the header
/// declares.
pub fn compute_planar_psnr(a: &[u8], b: &[u8], video: &VideoHeader) -> Result<Vec<f64>> {
    if video.format.is_compressed() {
        return Err(Error::ValueOutOfRange(format!(
            "PSNR is not defined for compressed format {}",
            video.format.name()
        )));
    }
    if !video.format.is_planar() || video.components.is_empty() {
        return Err(Error::ValueOutOfRange(format!(
            "PSNR requires planar components, format is {}",
            video.format.name()
        )));
    }

    let total = video.total_length() as usize;
    if a.len() < total || b.len() < total {
        return Err(Error::TruncatedPayload {
            expected: total as u64,
            actual: a.len().min(b.len()) as u64,
        });
    }

    let value_size = video.format.bytes_per_value() as usize;
    let max_value = ((1u64 << video.format.active_bits()) - 1) as f64;

    let mut result = Vec::with_capacity(video.components.len());
    for (offset, comp) in video
        .component_offsets()
        .iter()
        .zip(&video.components)
    {
        let start = *offset as usize;
        let end = start + comp.length as usize;
        let mse = match value_size {
            1 => component_mse(&a[start..end], &b[start..end], 1, |raw| raw[0] as f64),
            2 => component_mse(&a[start..end], &b[start..end], 2, |raw| {
                u16::from_le_bytes([raw[0], raw[1]]) as f64
            }),
            4 => component_mse(&a[start..end], &b[start..end], 4, |raw| {
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64
            }),
            other => {
                return Err(Error::ValueOutOfRange(format!(
                    "unsupported value size {} bytes",
                    other
                )))
            }
        };
        if mse == 0.0 {
            result.push(f64::INFINITY);
        } else {
            result.push(10.0 * ((max_value * max_value) / mse).log10());
        }
    }
    Ok(result)
}
