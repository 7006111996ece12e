//! Space-tagged geometry value types
//!
//! Raster space is the pixel grid of a rendered page preview: top-left
//! origin, Y down, scaled by a [`Zoom`]. Document space is the page's
//! native point grid: also top-left origin and Y down, independent of
//! any zoom. The flip into PDF's bottom-left user space happens once,
//! in the lopdf layer, never here.

use serde::{Deserialize, Serialize};

use crate::error::GeomError;

/// A point in raster (preview pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterPoint {
    pub x: f64,
    pub y: f64,
}

/// A rectangle in raster (preview pixel) space.
///
/// `width`/`height` are always >= 0; a zero-area rectangle is
/// representable here but rejected before it reaches the mutation
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RasterRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, GeomError> {
        for (name, v) in [("x", x), ("y", y), ("width", width), ("height", height)] {
            if !v.is_finite() {
                return Err(GeomError::InvalidRect(format!("{name} = {v}")));
            }
        }
        if x < 0.0 || y < 0.0 || width < 0.0 || height < 0.0 {
            return Err(GeomError::InvalidRect(format!(
                "({x}, {y}, {width}, {height})"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A point in document (native page point) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocPoint {
    pub x: f64,
    pub y: f64,
}

/// A rectangle in document (native page point) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DocRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether this rectangle lies entirely within a page of the given
    /// size. No clamping: callers reject out-of-bounds geometry.
    pub fn fits_in(&self, page: PageSize) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= page.width
            && self.y + self.height <= page.height
    }
}

/// Strictly positive scalar relating raster pixels to document points:
/// `raster = document * zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Zoom(f64);

impl Zoom {
    pub fn new(factor: f64) -> Result<Self, GeomError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(GeomError::InvalidZoom(factor));
        }
        Ok(Self(factor))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Zoom {
    type Error = GeomError;

    fn try_from(factor: f64) -> Result<Self, GeomError> {
        Zoom::new(factor)
    }
}

impl From<Zoom> for f64 {
    fn from(zoom: Zoom) -> f64 {
        zoom.0
    }
}

/// Native page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// US Letter, the fallback when a page carries no usable MediaBox.
    /// Never substituted once real dimensions are available.
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn raster_rect_rejects_negative_components() {
        assert!(RasterRect::new(-1.0, 0.0, 10.0, 10.0).is_err());
        assert!(RasterRect::new(0.0, 0.0, -10.0, 10.0).is_err());
        assert!(RasterRect::new(0.0, 0.0, 10.0, f64::NAN).is_err());
    }

    #[test]
    fn raster_rect_zero_area_is_degenerate() {
        let r = RasterRect::new(5.0, 5.0, 0.0, 10.0).unwrap();
        assert!(r.is_degenerate());
        let r = RasterRect::new(5.0, 5.0, 10.0, 10.0).unwrap();
        assert!(!r.is_degenerate());
    }

    #[test]
    fn zoom_rejects_non_positive() {
        assert!(Zoom::new(0.0).is_err());
        assert!(Zoom::new(-2.0).is_err());
        assert!(Zoom::new(f64::INFINITY).is_err());
        assert_eq!(Zoom::new(2.0).unwrap().get(), 2.0);
    }

    #[test]
    fn doc_rect_bounds_check() {
        let page = PageSize::LETTER;
        assert!(DocRect::new(0.0, 0.0, 612.0, 792.0).fits_in(page));
        assert!(DocRect::new(50.0, 50.0, 100.0, 20.0).fits_in(page));
        assert!(!DocRect::new(600.0, 0.0, 20.0, 20.0).fits_in(page));
        assert!(!DocRect::new(-1.0, 0.0, 20.0, 20.0).fits_in(page));
        assert!(!DocRect::new(0.0, 780.0, 20.0, 20.0).fits_in(page));
    }
}
