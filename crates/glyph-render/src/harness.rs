//! Render harness composition
//!
//! The generative script reads its inputs from globals at invocation time,
//! not from call parameters, so the harness binds seed, mutation list and
//! palette *before* the script text is injected. The canvas surface is
//! likewise declared up front; the script reads sizing from the environment.
//!
//! Slot values are JSON-encoded with `<`/`>` rewritten to unicode escapes,
//! so a palette entry like `"</script>"` cannot break out of the binding
//! block.

use crate::error::RenderError;
use glyph_chain::TokenGenerationInput;

/// Canvas width used unless an explicit override is requested
pub const DEFAULT_CANVAS_WIDTH: u32 = 1200;

/// Canvas element id the sandbox extracts from; diagnostic chrome outside
/// this element is never captured
pub const CANVAS_ELEMENT_ID: &str = "glyph-canvas";

const TEMPLATE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><style>html,body{margin:0;background:#000}</style></head>
<body>
<canvas id="glyph-canvas" width="__CANVAS_WIDTH__" height="__CANVAS_WIDTH__"></canvas>
<script>
window.glyphSeed = __SEED__;
window.glyphMutations = __MUTATIONS__;
window.glyphPalette = __PALETTE__;
window.glyphFrameHistory = [];
window.glyphDone = false;
</script>
<script>
__SCRIPT__
</script>
</body>
</html>
"#;

const VALUE_SLOTS: [&str; 4] = ["__CANVAS_WIDTH__", "__SEED__", "__MUTATIONS__", "__PALETTE__"];

/// Encode a slot value as script-safe JSON.
///
/// Angle brackets only ever occur inside JSON strings, so rewriting them as
/// unicode escapes keeps the value identical after parsing while making a
/// literal `</script>` impossible in the emitted document.
fn encode_slot<T: serde::Serialize>(value: &T) -> Result<String, RenderError> {
    let json = serde_json::to_string(value).map_err(|e| RenderError::Harness(e.to_string()))?;
    Ok(json.replace('<', "\\u003c").replace('>', "\\u003e"))
}

/// A composed, self-contained executable harness document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessDocument {
    html: String,
    canvas_width: u32,
}

impl HarnessDocument {
    /// The full HTML document
    #[inline]
    #[must_use]
    pub fn as_html(&self) -> &str {
        &self.html
    }

    /// Declared canvas width (and height; the surface is square)
    #[inline]
    #[must_use]
    pub const fn canvas_width(&self) -> u32 {
        self.canvas_width
    }
}

/// Builds harness documents from token inputs and the assembled script
#[derive(Debug, Clone)]
pub struct HarnessBuilder {
    canvas_width: u32,
}

impl HarnessBuilder {
    /// Builder with the default canvas width
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
        }
    }

    /// Request an explicit canvas width override
    #[inline]
    #[must_use]
    pub fn with_canvas_width(mut self, width: u32) -> Self {
        self.canvas_width = width;
        self
    }

    /// Compose the harness for one token.
    ///
    /// Value slots are filled before the script slot, so a script that
    /// happens to contain a slot name is never rewritten.
    ///
    /// # Errors
    ///
    /// [`RenderError::Harness`] if a slot value cannot be encoded, the
    /// canvas width is zero, or a slot is left unfilled.
    pub fn build(
        &self,
        input: &TokenGenerationInput,
        script: &str,
    ) -> Result<HarnessDocument, RenderError> {
        if self.canvas_width == 0 {
            return Err(RenderError::Harness("canvas width must be non-zero".into()));
        }

        let mut html = TEMPLATE
            .replace("__CANVAS_WIDTH__", &self.canvas_width.to_string())
            .replace("__SEED__", &encode_slot(&input.mint_seed)?)
            .replace("__MUTATIONS__", &encode_slot(&input.mutations)?)
            .replace("__PALETTE__", &encode_slot(&input.palette)?);

        for slot in VALUE_SLOTS {
            if html.contains(slot) {
                return Err(RenderError::Harness(format!("slot {slot} left unfilled")));
            }
        }

        html = html.replace("__SCRIPT__", script);

        Ok(HarnessDocument {
            html,
            canvas_width: self.canvas_width,
        })
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_chain::MutationEvent;

    fn input(palette: Vec<&str>) -> TokenGenerationInput {
        TokenGenerationInput {
            token_id: 42,
            mint_seed: 1_763_114_204_158,
            mutations: vec![MutationEvent {
                seed: 7,
                type_label: "paletteChangeOne".to_string(),
            }],
            palette: palette.into_iter().map(String::from).collect(),
            mutation_count: 1,
        }
    }

    #[test]
    fn binds_globals_before_script() {
        let doc = HarnessBuilder::new()
            .build(&input(vec![]), "window.glyphDone = true;")
            .unwrap();
        let html = doc.as_html();

        let bind_pos = html.find("window.glyphSeed = 1763114204158").unwrap();
        let script_pos = html.find("window.glyphDone = true;").unwrap();
        assert!(bind_pos < script_pos);
    }

    #[test]
    fn declares_canvas_before_script() {
        let doc = HarnessBuilder::new()
            .with_canvas_width(800)
            .build(&input(vec![]), "draw();")
            .unwrap();
        let html = doc.as_html();

        assert!(html.contains(r#"<canvas id="glyph-canvas" width="800" height="800">"#));
        assert!(html.find("<canvas").unwrap() < html.find("draw();").unwrap());
        assert_eq!(doc.canvas_width(), 800);
    }

    #[test]
    fn mutations_serialized_with_wire_names() {
        let doc = HarnessBuilder::new().build(&input(vec![]), "x();").unwrap();
        assert!(doc
            .as_html()
            .contains(r#"window.glyphMutations = [{"seed":7,"type":"paletteChangeOne"}]"#));
    }

    #[test]
    fn hostile_palette_value_cannot_close_the_script_block() {
        let doc = HarnessBuilder::new()
            .build(
                &input(vec![
                    "</script><script>alert(1)</script>",
                    "#222",
                    "#333",
                    "#444",
                    "#555",
                    "#666",
                ]),
                "x();",
            )
            .unwrap();

        assert!(!doc.as_html().contains("</script><script>alert(1)"));
        assert!(doc.as_html().contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn script_containing_slot_name_is_untouched() {
        let script = "var s = '__SEED__';";
        let doc = HarnessBuilder::new().build(&input(vec![]), script).unwrap();
        assert!(doc.as_html().contains(script));
    }

    #[test]
    fn zero_width_rejected() {
        let err = HarnessBuilder::new()
            .with_canvas_width(0)
            .build(&input(vec![]), "x();")
            .unwrap_err();
        assert!(matches!(err, RenderError::Harness(_)));
    }
}
