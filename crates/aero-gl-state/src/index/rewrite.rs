//! CPU-side index rewriting for primitive modes the native driver lacks.
//!
//! Triangle fans become triangle lists and line loops become closed line strips. Primitive
//! restart splits the input into independent runs first.

use crate::error::{Result, StateError};
use crate::gl::DrawElementsType;

/// Restart index for indices of `index_type`.
pub const fn restart_index(index_type: DrawElementsType) -> u32 {
    match index_type {
        DrawElementsType::UnsignedByte => 0xFF,
        DrawElementsType::UnsignedShort => 0xFFFF,
        DrawElementsType::UnsignedInt => 0xFFFF_FFFF,
    }
}

/// Reads `count` little-endian indices from `bytes`.
pub fn decode_indices(index_type: DrawElementsType, bytes: &[u8], count: u32) -> Result<Vec<u32>> {
    let size = index_type.byte_size();
    let len = (count as usize)
        .checked_mul(size)
        .ok_or(StateError::InvalidIndexData("index count overflows"))?;
    let bytes = bytes
        .get(..len)
        .ok_or(StateError::InvalidIndexData("index range exceeds the index data"))?;
    let indices = match index_type {
        DrawElementsType::UnsignedByte => bytes.iter().map(|&b| u32::from(b)).collect(),
        DrawElementsType::UnsignedShort => bytes
            .chunks_exact(2)
            .map(|c| u32::from(u16::from_le_bytes([c[0], c[1]])))
            .collect(),
        DrawElementsType::UnsignedInt => bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    };
    Ok(indices)
}

fn runs(indices: &[u32], restart: Option<u32>) -> impl Iterator<Item = &[u32]> {
    indices
        .split(move |&index| Some(index) == restart)
        .filter(|run| !run.is_empty())
}

/// Expands a triangle fan into a triangle list: triangle `i` is `(0, i, i + 1)` within each run.
pub fn expand_triangle_fan(indices: &[u32], restart: Option<u32>) -> Vec<u32> {
    let mut out = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for run in runs(indices, restart) {
        if run.len() < 3 {
            continue;
        }
        for i in 1..run.len() - 1 {
            out.extend_from_slice(&[run[0], run[i], run[i + 1]]);
        }
    }
    out
}

/// Closes every run of a line loop by repeating its first index. Runs are separated by
/// `strip_cut` in the output.
pub fn close_line_loop(indices: &[u32], restart: Option<u32>, strip_cut: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(indices.len() + 1);
    for run in runs(indices, restart) {
        if !out.is_empty() {
            out.push(strip_cut);
        }
        out.extend_from_slice(run);
        out.push(run[0]);
    }
    out
}

/// Widens 8-bit indices to 16 bits, keeping the restart index a restart index.
pub fn widen_u8_indices(indices: &mut [u32], primitive_restart: bool) {
    if !primitive_restart {
        return;
    }
    for index in indices {
        if *index == restart_index(DrawElementsType::UnsignedByte) {
            *index = restart_index(DrawElementsType::UnsignedShort);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_width() {
        assert_eq!(
            decode_indices(DrawElementsType::UnsignedByte, &[1, 2, 3], 2).unwrap(),
            [1, 2]
        );
        assert_eq!(
            decode_indices(DrawElementsType::UnsignedShort, &[1, 0, 0, 1], 2).unwrap(),
            [1, 256]
        );
        assert_eq!(
            decode_indices(DrawElementsType::UnsignedInt, &[0, 0, 1, 0], 1).unwrap(),
            [65536]
        );
        assert!(matches!(
            decode_indices(DrawElementsType::UnsignedShort, &[0; 3], 2),
            Err(StateError::InvalidIndexData(_))
        ));
    }

    #[test]
    fn triangle_fan_expands_per_run() {
        assert_eq!(
            expand_triangle_fan(&[10, 11, 12, 13], None),
            [10, 11, 12, 10, 12, 13]
        );
        let restart = Some(0xFFFF);
        assert_eq!(
            expand_triangle_fan(&[0, 1, 2, 0xFFFF, 5, 6, 0xFFFF, 7, 8, 9], restart),
            [0, 1, 2, 7, 8, 9]
        );
        assert!(expand_triangle_fan(&[0, 1], None).is_empty());
    }

    #[test]
    fn line_loop_repeats_first_index() {
        assert_eq!(close_line_loop(&[3, 4, 5], None, 0xFFFF), [3, 4, 5, 3]);
        assert_eq!(
            close_line_loop(&[1, 2, 0xFF, 4, 5], Some(0xFF), 0xFFFF),
            [1, 2, 1, 0xFFFF, 4, 5, 4]
        );
    }

    #[test]
    fn widening_keeps_restart() {
        let mut indices = vec![0xFF, 3];
        widen_u8_indices(&mut indices, true);
        assert_eq!(indices, [0xFFFF, 3]);
        let mut indices = vec![0xFF];
        widen_u8_indices(&mut indices, false);
        assert_eq!(indices, [0xFF]);
    }
}
