//! Mutation engine
//!
//! Serialized application of resolved edits against the session
//! document. Edits arrive one at a time per session; each successful
//! apply bumps the revision exactly once and invalidates the page's
//! cached preview, and a failed apply leaves the document byte-stream
//! untouched. Later edits paint over earlier ones where they overlap.

use shared_geom::Zoom;
use tracing::info;

use crate::document::SessionDocument;
use crate::error::EditError;
use crate::operations::{self, EditOperation, ResolvedEdit};
use crate::pdf;
use crate::render::{CachedPreview, PageRenderer, RasterImage};

/// What one applied mutation did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Revision after the apply. Unchanged when nothing matched.
    pub revision: u64,
    /// Occurrences handled, for the search-based operations. Geometry
    /// edits always report zero.
    pub matches: usize,
    /// Whether this apply removed existing content.
    pub structural: bool,
}

/// Apply one resolved edit to a page.
///
/// Page index and geometry are validated before anything is written;
/// out-of-bounds input is rejected with no partial mutation. A search
/// edit with zero matches succeeds without dirtying the document.
pub fn apply(
    sess: &mut SessionDocument,
    page_index: usize,
    edit: &ResolvedEdit,
) -> Result<MutationOutcome, EditError> {
    let page = sess.page_size(page_index)?;
    if let Some(rect) = edit.rect() {
        if !rect.fits_in(page) {
            return Err(EditError::GeometryOutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                page_width: page.width,
                page_height: page.height,
            });
        }
    }

    let matches = match edit {
        ResolvedEdit::TextBox { rect, text, style } => {
            pdf::insert_text_box(sess, page_index, rect, text, style)?;
            0
        }
        ResolvedEdit::FreeText { rect, text, style } => {
            pdf::add_free_text_annotation(sess, page_index, rect, text, style)?;
            0
        }
        ResolvedEdit::ImagePlacement { rect, image } => {
            pdf::insert_image(sess, page_index, rect, image)?;
            0
        }
        ResolvedEdit::ShapeDraw {
            rect,
            kind,
            stroke,
            stroke_width,
            fill,
        } => {
            pdf::draw_shape(sess, page_index, rect, *kind, *stroke, *stroke_width, *fill)?;
            0
        }
        ResolvedEdit::FormField { rect, kind, name } => {
            pdf::add_form_field(sess, page_index, rect, *kind, name)?;
            0
        }
        ResolvedEdit::Redact { query } => pdf::redact_text(sess, page_index, query, None)?,
        ResolvedEdit::FindReplace { query, replacement } => {
            pdf::redact_text(sess, page_index, query, Some(replacement))?
        }
    };

    let is_search = matches!(
        edit,
        ResolvedEdit::Redact { .. } | ResolvedEdit::FindReplace { .. }
    );
    if is_search && matches == 0 {
        // Nothing located, nothing written: the document stays clean.
        return Ok(MutationOutcome {
            revision: sess.revision(),
            matches: 0,
            structural: false,
        });
    }

    let structural = edit.is_structural();
    let revision = sess.record_mutation(page_index, structural);
    info!(page_index, revision, structural, matches, "applied edit");
    Ok(MutationOutcome {
        revision,
        matches,
        structural,
    })
}

/// Commit a staged operation drawn against the raster preview.
///
/// Refused with `StaleZoom` when the page was last rendered at a
/// different zoom than the operation was staged at; a page never
/// rendered this session is accepted as-is. On success the operation
/// is resolved into document space and applied.
pub fn commit(
    sess: &mut SessionDocument,
    page_index: usize,
    op: &EditOperation,
    zoom: Zoom,
) -> Result<MutationOutcome, EditError> {
    if let Some(rendered) = sess.last_render_zoom(page_index) {
        if rendered.get() != zoom.get() {
            return Err(EditError::StaleZoom {
                staged: zoom.get(),
                rendered: rendered.get(),
            });
        }
    }
    let resolved = operations::resolve(op, zoom)?;
    apply(sess, page_index, &resolved)
}

/// Rasterize a page preview and record the zoom it was rendered at,
/// making that zoom the authority for subsequent commits.
pub fn render_preview(
    sess: &mut SessionDocument,
    renderer: &dyn PageRenderer,
    page_index: usize,
    zoom: Zoom,
) -> Result<RasterImage, EditError> {
    let image = renderer.render(sess, page_index, zoom)?;
    sess.set_rendered(
        page_index,
        CachedPreview {
            zoom,
            image: image.clone(),
        },
    );
    Ok(image)
}
