//! Artifact extraction and validation
//!
//! A raw extraction is only accepted once its structure checks out: frame
//! history non-empty, every frame exactly width*height RGBA pixels, raster
//! present. Anything else is a generation bug, not a transient fault; it is
//! reported loudly and never auto-retried. No best-effort partial artifact
//! is ever forwarded downstream.

use crate::engine::RawExtraction;
use crate::error::RenderError;

const BYTES_PER_PIXEL: usize = 4;

/// A validated generation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// Ordered per-frame RGBA buffers, all of identical dimensions
    pub frames: Vec<Vec<u8>>,
    /// Raster snapshot (PNG bytes) of the final canvas state
    pub raster: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl GeneratedArtifact {
    /// Expected byte length of every frame buffer
    #[inline]
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

/// Validates raw extractions into [`GeneratedArtifact`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactExtractor;

impl ArtifactExtractor {
    /// Create an extractor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Structurally validate a raw extraction.
    ///
    /// # Errors
    ///
    /// [`RenderError::ExtractionValidation`] if dimensions are zero, the
    /// frame history is empty, any frame's length disagrees with the
    /// declared dimensions, or the raster is empty.
    pub fn validate(&self, raw: RawExtraction) -> Result<GeneratedArtifact, RenderError> {
        let fail = |reason: String| {
            tracing::error!(%reason, "extraction validation failed");
            Err(RenderError::ExtractionValidation(reason))
        };

        if raw.width == 0 || raw.height == 0 {
            return fail(format!("zero dimensions {}x{}", raw.width, raw.height));
        }
        if raw.frames.is_empty() {
            return fail("empty frame history".to_string());
        }

        let expected = raw.width as usize * raw.height as usize * BYTES_PER_PIXEL;
        for (i, frame) in raw.frames.iter().enumerate() {
            if frame.len() != expected {
                return fail(format!(
                    "frame {i} has {} bytes, expected {expected} for {}x{}",
                    frame.len(),
                    raw.width,
                    raw.height
                ));
            }
        }

        if raw.raster.is_empty() {
            return fail("empty raster snapshot".to_string());
        }

        Ok(GeneratedArtifact {
            frames: raw.frames,
            raster: raw.raster,
            width: raw.width,
            height: raw.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(frames: Vec<Vec<u8>>) -> RawExtraction {
        RawExtraction {
            width: 2,
            height: 1,
            frames,
            raster: vec![1, 2, 3],
        }
    }

    #[test]
    fn accepts_well_formed_extraction() {
        let artifact = ArtifactExtractor::new()
            .validate(raw(vec![vec![0; 8], vec![255; 8]]))
            .unwrap();
        assert_eq!(artifact.frames.len(), 2);
        assert_eq!(artifact.frame_len(), 8);
    }

    #[test]
    fn rejects_empty_frame_history() {
        let err = ArtifactExtractor::new().validate(raw(vec![])).unwrap_err();
        assert!(matches!(err, RenderError::ExtractionValidation(_)));
        assert!(!err.is_session_retryable());
    }

    #[test]
    fn rejects_dimension_mismatch() {
        // Second frame is one pixel short.
        let err = ArtifactExtractor::new()
            .validate(raw(vec![vec![0; 8], vec![0; 4]]))
            .unwrap_err();
        assert!(err.to_string().contains("frame 1"));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let mut r = raw(vec![vec![]]);
        r.width = 0;
        assert!(ArtifactExtractor::new().validate(r).is_err());
    }

    #[test]
    fn rejects_empty_raster() {
        let mut r = raw(vec![vec![0; 8]]);
        r.raster.clear();
        assert!(ArtifactExtractor::new().validate(r).is_err());
    }
}
