//! Boundary parsing for the drawable-canvas widget
//!
//! The canvas widget reports drawn objects as loose JSON. That JSON is
//! parsed into typed values here, at the system boundary; untyped maps
//! never reach the mutation engine, and unknown shape kinds fail with a
//! typed error instead of propagating.

use serde::Deserialize;
use shared_geom::RasterRect;

use crate::error::EditError;

fn default_scale() -> f64 {
    1.0
}

/// One object as reported by the canvas widget (fabric.js convention:
/// `left`/`top` plus unscaled `width`/`height` and live scale factors).
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(rename = "scaleX", default = "default_scale")]
    pub scale_x: f64,
    #[serde(rename = "scaleY", default = "default_scale")]
    pub scale_y: f64,
}

const KNOWN_KINDS: &[&str] = &["rect", "ellipse"];

impl CanvasObject {
    /// Effective drawn rectangle: width/height multiplied by the live
    /// scale factors.
    pub fn to_raster_rect(&self) -> Result<RasterRect, EditError> {
        Ok(RasterRect::new(
            self.left,
            self.top,
            self.width * self.scale_x,
            self.height * self.scale_y,
        )?)
    }
}

/// Parse the widget's `{"objects": [...]}` payload into typed objects,
/// rejecting any unknown shape kind.
pub fn parse_canvas_objects(json: &serde_json::Value) -> Result<Vec<CanvasObject>, EditError> {
    let objects = match json.get("objects") {
        Some(serde_json::Value::Array(arr)) => arr.as_slice(),
        Some(_) => return Err(EditError::UnknownShape("objects is not an array".into())),
        None => &[],
    };
    let mut parsed = Vec::with_capacity(objects.len());
    for obj in objects {
        let object: CanvasObject = serde_json::from_value(obj.clone())
            .map_err(|e| EditError::UnknownShape(e.to_string()))?;
        if !KNOWN_KINDS.contains(&object.kind.as_str()) {
            return Err(EditError::UnknownShape(object.kind.clone()));
        }
        parsed.push(object);
    }
    Ok(parsed)
}

/// The most recently drawn rectangle, the one an apply acts on.
/// No rectangle drawn is a user-facing warning, not a system fault.
pub fn latest_rect(objects: &[CanvasObject]) -> Result<RasterRect, EditError> {
    objects
        .iter()
        .rev()
        .find(|o| o.kind == "rect")
        .ok_or(EditError::EmptySelection)?
        .to_raster_rect()
}
