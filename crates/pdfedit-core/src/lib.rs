//! Preview-driven PDF editing
//!
//! This crate provides the document mutation side of the markup editor
//! using lopdf: a session holds exactly one open document, edits are
//! staged against a raster preview in pixel coordinates, resolved into
//! native page points, and applied one at a time. Saves are incremental
//! (append-only update sections) until a structural removal forces a
//! full rewrite.

pub mod canvas;
pub mod document;
pub mod engine;
pub mod error;
mod incremental;
pub mod operations;
mod pdf;
pub mod render;
mod text;

pub use canvas::{latest_rect, parse_canvas_objects, CanvasObject};
pub use document::{SaveKind, SessionDocument, DEFAULT_RENDER_ZOOM, MAX_UPLOAD_BYTES};
pub use engine::{apply, commit, render_preview, MutationOutcome};
pub use error::EditError;
pub use operations::{
    resolve, Color, EditOperation, FieldKind, ResolvedEdit, ShapeKind, TextStyle,
};
pub use render::{CachedPreview, PageRenderer, RasterImage};

/// Parse PDF bytes and return the page count, without opening a
/// session.
pub fn get_page_count(bytes: &[u8]) -> Result<usize, EditError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| EditError::DocumentCorrupt(e.to_string()))?;
    Ok(doc.get_pages().len())
}

/// Builders for small in-memory documents used across the test suites.
#[cfg(test)]
pub(crate) mod testpdf {
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    /// A letter-sized document with `pages` empty pages and a Helvetica
    /// font registered as /F1.
    pub(crate) fn blank(pages: usize) -> Vec<u8> {
        build(pages, None, None)
    }

    /// A one-page document whose content stream is exactly `content`.
    pub(crate) fn with_content(content: &str) -> Vec<u8> {
        build(1, Some(content), None)
    }

    /// Like [`with_content`], with an explicit /Widths array on /F1.
    pub(crate) fn with_content_and_widths(
        content: &str,
        first_char: i64,
        widths: Vec<f64>,
    ) -> Vec<u8> {
        build(1, Some(content), Some((first_char, widths)))
    }

    fn build(pages: usize, content: Option<&str>, widths: Option<(i64, Vec<f64>)>) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        if let Some((first_char, widths)) = widths {
            font.set("FirstChar", Object::Integer(first_char));
            font.set(
                "LastChar",
                Object::Integer(first_char + widths.len() as i64 - 1),
            );
            font.set(
                "Widths",
                widths
                    .into_iter()
                    .map(|w| Object::Real(w as f32))
                    .collect::<Vec<_>>(),
            );
        }
        let font_id = doc.add_object(font);
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        };

        let mut kids = Vec::new();
        for _ in 0..pages {
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
                "Resources" => Object::Dictionary(resources.clone()),
            };
            if let Some(content) = content {
                let stream = Stream::new(Dictionary::new(), content.as_bytes().to_vec());
                page.set("Contents", Object::Reference(doc.add_object(stream)));
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(pages as i64),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn builders_produce_loadable_documents() {
        let doc = Document::load_mem(&blank(3)).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        let doc = Document::load_mem(&with_content("BT ET")).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
