//! Vector tracing
//!
//! Pure and stateless: decodes the raster snapshot, applies a
//! fixed-parameter color quantization, merges horizontal pixel runs into
//! subpaths, and emits a scalable vector document. No network, no shared
//! state; deterministic for a given raster, so failures here are retried
//! independently of the expensive render step.

use crate::error::RenderError;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Per-channel quantization bucket width; channels posterize to the bucket
/// midpoint
const QUANT_STEP: u8 = 64;

/// Pixels with alpha below this are treated as background and not traced
const ALPHA_THRESHOLD: u8 = 128;

#[inline]
fn quantize(channel: u8) -> u8 {
    (channel / QUANT_STEP) * QUANT_STEP + QUANT_STEP / 2
}

/// Derives a vector document from a raster snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorTracer;

impl VectorTracer {
    /// Create a tracer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Trace PNG raster bytes into an SVG document.
    ///
    /// # Errors
    ///
    /// [`RenderError::Trace`] if the raster bytes cannot be decoded.
    pub fn trace(&self, raster: &[u8]) -> Result<String, RenderError> {
        let decoded = image::load_from_memory(raster)
            .map_err(|e| RenderError::Trace(format!("raster decode: {e}")))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();

        // One path per quantized color; BTreeMap keeps emission order
        // independent of pixel scan order.
        let mut paths: BTreeMap<[u8; 3], String> = BTreeMap::new();

        for y in 0..height {
            let mut x = 0;
            while x < width {
                let pixel = decoded.get_pixel(x, y).0;
                if pixel[3] < ALPHA_THRESHOLD {
                    x += 1;
                    continue;
                }
                let color = [quantize(pixel[0]), quantize(pixel[1]), quantize(pixel[2])];

                // Extend the run while the quantized color holds.
                let mut run = 1;
                while x + run < width {
                    let next = decoded.get_pixel(x + run, y).0;
                    if next[3] < ALPHA_THRESHOLD
                        || [quantize(next[0]), quantize(next[1]), quantize(next[2])] != color
                    {
                        break;
                    }
                    run += 1;
                }

                let d = paths.entry(color).or_default();
                let _ = write!(d, "M{x} {y}h{run}v1h-{run}z");
                x += run;
            }
        }

        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" shape-rendering="crispEdges">"#
        );
        for (color, d) in &paths {
            let _ = write!(
                svg,
                r##"<path fill="#{:02x}{:02x}{:02x}" d="{d}"/>"##,
                color[0], color[1], color[2]
            );
        }
        svg.push_str("</svg>");
        Ok(svg)
    }
}
