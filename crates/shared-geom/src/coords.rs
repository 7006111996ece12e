//! Bidirectional raster <-> document coordinate conversion
//!
//! Conversion is linear and axis-preserving; both spaces share a
//! top-left origin with Y increasing downward, so no flip happens
//! here. No clamping either: an out-of-page-bounds result is the
//! caller's concern.

use crate::space::{DocPoint, DocRect, RasterPoint, RasterRect, Zoom};

/// Convert a raster-space rectangle to document space.
///
/// `doc.x0 = raster.x / zoom`, `doc.x1 = (raster.x + raster.w) / zoom`,
/// and likewise for the Y axis.
pub fn to_document_space(rect: RasterRect, zoom: Zoom) -> DocRect {
    let z = zoom.get();
    let x0 = rect.x / z;
    let y0 = rect.y / z;
    let x1 = (rect.x + rect.width) / z;
    let y1 = (rect.y + rect.height) / z;
    DocRect::new(x0, y0, x1 - x0, y1 - y0)
}

/// Inverse of [`to_document_space`].
pub fn to_raster_space(rect: DocRect, zoom: Zoom) -> RasterRect {
    let z = zoom.get();
    RasterRect {
        x: rect.x * z,
        y: rect.y * z,
        width: rect.width * z,
        height: rect.height * z,
    }
}

pub fn point_to_document_space(point: RasterPoint, zoom: Zoom) -> DocPoint {
    DocPoint {
        x: point.x / zoom.get(),
        y: point.y / zoom.get(),
    }
}

pub fn point_to_raster_space(point: DocPoint, zoom: Zoom) -> RasterPoint {
    RasterPoint {
        x: point.x * zoom.get(),
        y: point.y * zoom.get(),
    }
}
