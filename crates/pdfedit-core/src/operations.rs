//! Edit operation model
//!
//! A closed set of edits staged against the raster preview. Geometry is
//! raster-space until [`resolve`] converts it into document space; the
//! mutation engine only ever accepts the resolved form. Operations are
//! immutable once constructed and consumed by a single commit.

use serde::{Deserialize, Serialize};
use shared_geom::{to_document_space, DocRect, RasterRect, Zoom};

use crate::error::EditError;

/// RGB triple, each channel in [0, 1]. Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f64,
    pub color: Color,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            color: Color::BLACK,
        }
    }
}

/// One staged edit, geometry in raster (preview pixel) space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditOperation {
    /// Flattened text laid out and wrapped inside the rectangle.
    TextBox {
        rect: RasterRect,
        text: String,
        style: TextStyle,
    },
    /// A FreeText annotation: stays a separate, later-removable object
    /// rather than flattened page content.
    FreeText {
        rect: RasterRect,
        text: String,
        style: TextStyle,
    },
    /// Raster payload decoded once, re-encoded, and scaled to exactly
    /// fill the rectangle. Aspect ratio is the caller's responsibility.
    ImagePlacement { rect: RasterRect, image: Vec<u8> },
    /// Rectangle or ellipse bounded by the rectangle. A fill-only white
    /// shape ("whiteout") obscures content visually but does NOT remove
    /// it from the document; use `Redact` for that.
    ShapeDraw {
        rect: RasterRect,
        kind: ShapeKind,
        stroke: Color,
        stroke_width: f64,
        fill: Option<Color>,
    },
    /// Interactive form field, not flattened content.
    FormField {
        rect: RasterRect,
        kind: FieldKind,
        name: String,
    },
    /// Locate every occurrence of `query` on the page and irreversibly
    /// strip the underlying content at each occurrence.
    Redact { query: String },
    /// Like `Redact`, but reinserts `replacement` at each occurrence's
    /// anchor. Each occurrence completes fully before the next.
    FindReplace { query: String, replacement: String },
}

impl EditOperation {
    /// Fill-only opaque white shape over the rectangle. Visual cover
    /// only; underlying content survives in the byte stream.
    pub fn whiteout(rect: RasterRect) -> Self {
        EditOperation::ShapeDraw {
            rect,
            kind: ShapeKind::Rectangle,
            stroke: Color::WHITE,
            stroke_width: 0.0,
            fill: Some(Color::WHITE),
        }
    }

    pub fn rect(&self) -> Option<&RasterRect> {
        match self {
            EditOperation::TextBox { rect, .. }
            | EditOperation::FreeText { rect, .. }
            | EditOperation::ImagePlacement { rect, .. }
            | EditOperation::ShapeDraw { rect, .. }
            | EditOperation::FormField { rect, .. } => Some(rect),
            EditOperation::Redact { .. } | EditOperation::FindReplace { .. } => None,
        }
    }
}

/// An [`EditOperation`] after coordinate translation: geometry in
/// document space, the only form the mutation engine accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEdit {
    TextBox {
        rect: DocRect,
        text: String,
        style: TextStyle,
    },
    FreeText {
        rect: DocRect,
        text: String,
        style: TextStyle,
    },
    ImagePlacement {
        rect: DocRect,
        image: Vec<u8>,
    },
    ShapeDraw {
        rect: DocRect,
        kind: ShapeKind,
        stroke: Color,
        stroke_width: f64,
        fill: Option<Color>,
    },
    FormField {
        rect: DocRect,
        kind: FieldKind,
        name: String,
    },
    Redact {
        query: String,
    },
    FindReplace {
        query: String,
        replacement: String,
    },
}

impl ResolvedEdit {
    pub fn rect(&self) -> Option<&DocRect> {
        match self {
            ResolvedEdit::TextBox { rect, .. }
            | ResolvedEdit::FreeText { rect, .. }
            | ResolvedEdit::ImagePlacement { rect, .. }
            | ResolvedEdit::ShapeDraw { rect, .. }
            | ResolvedEdit::FormField { rect, .. } => Some(rect),
            ResolvedEdit::Redact { .. } | ResolvedEdit::FindReplace { .. } => None,
        }
    }

    /// Whether applying this edit removes existing content (forces the
    /// next save to be a full serialization).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ResolvedEdit::Redact { .. } | ResolvedEdit::FindReplace { .. }
        )
    }
}

/// Translate a staged operation into document space.
///
/// Pure and idempotent: resolving the same operation twice with the
/// same zoom yields identical values. Degenerate (zero-area) selections
/// are rejected here, before the engine is ever involved. No bounds
/// check happens here; the engine validates against the page box.
pub fn resolve(op: &EditOperation, zoom: Zoom) -> Result<ResolvedEdit, EditError> {
    if let Some(rect) = op.rect() {
        if rect.is_degenerate() {
            return Err(EditError::EmptySelection);
        }
    }
    let resolved = match op {
        EditOperation::TextBox { rect, text, style } => ResolvedEdit::TextBox {
            rect: to_document_space(*rect, zoom),
            text: text.clone(),
            style: style.clone(),
        },
        EditOperation::FreeText { rect, text, style } => ResolvedEdit::FreeText {
            rect: to_document_space(*rect, zoom),
            text: text.clone(),
            style: style.clone(),
        },
        EditOperation::ImagePlacement { rect, image } => ResolvedEdit::ImagePlacement {
            rect: to_document_space(*rect, zoom),
            image: image.clone(),
        },
        EditOperation::ShapeDraw {
            rect,
            kind,
            stroke,
            stroke_width,
            fill,
        } => ResolvedEdit::ShapeDraw {
            rect: to_document_space(*rect, zoom),
            kind: *kind,
            stroke: *stroke,
            stroke_width: *stroke_width,
            fill: *fill,
        },
        EditOperation::FormField { rect, kind, name } => ResolvedEdit::FormField {
            rect: to_document_space(*rect, zoom),
            kind: *kind,
            name: name.clone(),
        },
        EditOperation::Redact { query } => ResolvedEdit::Redact {
            query: query.clone(),
        },
        EditOperation::FindReplace { query, replacement } => ResolvedEdit::FindReplace {
            query: query.clone(),
            replacement: replacement.clone(),
        },
    };
    Ok(resolved)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn raster_rect() -> impl Strategy<Value = RasterRect> {
        (0.0f64..1500.0, 0.0f64..1500.0, 1.0f64..800.0, 1.0f64..800.0)
            .prop_map(|(x, y, w, h)| RasterRect::new(x, y, w, h).unwrap())
    }

    proptest! {
        /// Resolution never mutates the staged operation and is stable
        /// across repeated calls with the same zoom.
        #[test]
        fn resolution_is_idempotent(r in raster_rect(), z in 0.1f64..10.0) {
            let op = EditOperation::TextBox {
                rect: r,
                text: "x".into(),
                style: TextStyle::default(),
            };
            let zoom = Zoom::new(z).unwrap();
            let before = op.clone();
            let a = resolve(&op, zoom).unwrap();
            let b = resolve(&op, zoom).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(op, before);
        }
    }
}
