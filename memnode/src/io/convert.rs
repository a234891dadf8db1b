//! Element-wise precision conversion of raw tensor bytes
//!
//! Bytes are native-endian, like the rest of the crate. Conversion goes
//! through `f32`; integer targets saturate.

use half::{bf16, f16};

use super::memory::Precision;

/// Decode `bytes` of the given precision into `f32` values.
///
/// A trailing partial element is ignored.
#[must_use]
pub fn decode_f32(bytes: &[u8], precision: Precision) -> Vec<f32> {
    match precision {
        Precision::F32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Precision::I32 => bytes
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as f32)
            .collect(),
        Precision::F16 => bytes
            .chunks_exact(2)
            .map(|c| f16::from_bits(u16::from_ne_bytes([c[0], c[1]])).to_f32())
            .collect(),
        Precision::BF16 => bytes
            .chunks_exact(2)
            .map(|c| bf16::from_bits(u16::from_ne_bytes([c[0], c[1]])).to_f32())
            .collect(),
        Precision::I8 => bytes.iter().map(|b| f32::from(*b as i8)).collect(),
        Precision::U8 => bytes.iter().map(|b| f32::from(*b)).collect(),
    }
}

/// Encode `f32` values into bytes of the given precision
#[must_use]
pub fn encode_f32(values: &[f32], precision: Precision) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * precision.size_in_bytes());
    for v in values {
        match precision {
            Precision::F32 => out.extend_from_slice(&v.to_ne_bytes()),
            Precision::I32 => out.extend_from_slice(&(*v as i32).to_ne_bytes()),
            Precision::F16 => out.extend_from_slice(&f16::from_f32(*v).to_bits().to_ne_bytes()),
            Precision::BF16 => {
                out.extend_from_slice(&bf16::from_f32(*v).to_bits().to_ne_bytes());
            }
            Precision::I8 => out.push((*v as i8) as u8),
            Precision::U8 => out.push(*v as u8),
        }
    }
    out
}

/// Re-encode `bytes` from one precision to another
#[must_use]
pub fn convert(bytes: &[u8], from: Precision, to: Precision) -> Vec<u8> {
    if from == to {
        return bytes.to_vec();
    }
    encode_f32(&decode_f32(bytes, from), to)
}
