use thiserror::Error;

/// Failures surfaced by the editing pipeline.
///
/// Everything here is local and recoverable except `InvalidUpload` and
/// `DocumentCorrupt`, which are fatal for that upload: a failed apply
/// leaves the open document byte-identical and the caller may retry
/// with corrected input.
#[derive(Error, Debug)]
pub enum EditError {
    #[error("Upload rejected: {0}")]
    InvalidUpload(String),

    #[error("Failed to open PDF: {0}")]
    DocumentCorrupt(String),

    #[error("Preview is out of date: drawn at zoom {staged}, page last rendered at zoom {rendered}. Re-render and try again")]
    StaleZoom { staged: f64, rendered: f64 },

    #[error("Edit falls outside the page: rect ({x:.1}, {y:.1}, {width:.1}, {height:.1}) on a {page_width:.0}x{page_height:.0} pt page")]
    GeometryOutOfBounds {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        page_width: f64,
        page_height: f64,
    },

    #[error("Draw a rectangle first")]
    EmptySelection,

    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Unknown canvas shape kind: {0:?}")]
    UnknownShape(String),

    #[error("Could not decode image payload: {0}")]
    ImagePayload(String),

    #[error("Failed to save PDF: {0}")]
    SerializationFailure(String),

    #[error(transparent)]
    Geometry(#[from] shared_geom::GeomError),

    #[error("PDF operation failed: {0}")]
    Pdf(String),
}
