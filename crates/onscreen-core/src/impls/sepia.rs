use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio_util::sync::CancellationToken;

use crate::domain::{FailureKind, StageFailure};
use crate::ports::TransformEngine;

/// Sepia tone over raw RGB8 triplets.
///
/// Pixels are processed in chunks; the token is checked and the task yields
/// between chunks.
#[derive(Debug, Clone)]
pub struct SepiaTransform {
    chunk_pixels: usize,
}

impl SepiaTransform {
    pub fn new(chunk_pixels: usize) -> Self {
        Self {
            chunk_pixels: chunk_pixels.max(1),
        }
    }
}

impl Default for SepiaTransform {
    fn default() -> Self {
        Self::new(4096)
    }
}

/// Classic sepia matrix in per-mille, clamped to 255.
fn sepia(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (u32::from(r), u32::from(g), u32::from(b));
    let mix = |kr: u32, kg: u32, kb: u32| ((kr * r + kg * g + kb * b) / 1000).min(255) as u8;
    [mix(393, 769, 189), mix(349, 686, 168), mix(272, 534, 131)]
}

#[async_trait]
impl TransformEngine for SepiaTransform {
    async fn transform(
        &self,
        raw: &Bytes,
        cancel: &CancellationToken,
    ) -> Result<Bytes, StageFailure> {
        if raw.is_empty() {
            return Err(StageFailure::new(FailureKind::InvalidInput, "empty payload"));
        }
        if raw.len() % 3 != 0 {
            return Err(StageFailure::new(
                FailureKind::InvalidInput,
                format!("{} bytes is not RGB8", raw.len()),
            ));
        }

        let mut out = BytesMut::with_capacity(raw.len());
        for chunk in raw.chunks(self.chunk_pixels * 3) {
            if cancel.is_cancelled() {
                return Err(StageFailure::new(FailureKind::Processing, "cancelled"));
            }
            for px in chunk.chunks_exact(3) {
                out.extend_from_slice(&sepia(px[0], px[1], px[2]));
            }
            tokio::task::yield_now().await;
        }
        Ok(out.freeze())
    }
}
