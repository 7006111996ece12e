use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    #[error("Zoom factor must be strictly positive and finite, got {0}")]
    InvalidZoom(f64),

    #[error("Rectangle components must be finite and non-negative: {0}")]
    InvalidRect(String),
}
