//! Rendering collaborator surface
//!
//! Rasterizing a page is an external capability; the engine only needs
//! the pixel dimensions and bytes back, plus a record of which zoom a
//! page was last rendered at so stale-zoom commits can be refused.

use shared_geom::Zoom;

use crate::document::SessionDocument;
use crate::error::EditError;

/// A rendered page preview: tightly packed 8-bit RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Opaque page rasterizer. Synchronous; bounded by page complexity,
/// not I/O, so no timeout or cancellation contract.
pub trait PageRenderer {
    fn render(
        &self,
        doc: &SessionDocument,
        page_index: usize,
        zoom: Zoom,
    ) -> Result<RasterImage, EditError>;
}

/// A cached preview together with the zoom it was rendered at.
#[derive(Debug, Clone)]
pub struct CachedPreview {
    pub zoom: Zoom,
    pub image: RasterImage,
}
