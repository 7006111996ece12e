//! Shared geometry for the PDF markup pipeline
//!
//! This crate provides the two parallel coordinate spaces used across
//! the editor (raster preview pixels and native page points) and the
//! pure conversions between them.

pub mod coords;
pub mod error;
pub mod space;

pub use coords::{
    point_to_document_space, point_to_raster_space, to_document_space, to_raster_space,
};
pub use error::GeomError;
pub use space::{DocPoint, DocRect, PageSize, RasterPoint, RasterRect, Zoom};
