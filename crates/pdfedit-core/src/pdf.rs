//! lopdf primitive surface
//!
//! Every mutation the engine performs bottoms out here: appending
//! content streams, registering page resources, attaching annotations,
//! and driving the text strip pass. This is also the only module that
//! flips between document space (top-left origin, Y down) and PDF user
//! space (bottom-left origin, Y up); everything above it stays in
//! document space.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};
use shared_geom::{DocRect, PageSize};
use tracing::debug;

use crate::document::SessionDocument;
use crate::error::EditError;
use crate::operations::{Color, FieldKind, ShapeKind, TextStyle};
use crate::text;

/// Resource name of the font registered for editor-produced text.
const FONT_RESOURCE: &str = "PEHelv";

/// Kappa for approximating a quarter circle with one Bezier segment.
const CIRCLE_KAPPA: f64 = 0.5523;

fn pdf_err(e: lopdf::Error) -> EditError {
    EditError::Pdf(e.to_string())
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// The single flip between document space and PDF user space. Returns
/// `[x0, y0, x1, y1]` with `y0 < y1`.
fn flip_rect(rect: &DocRect, page: PageSize) -> [f64; 4] {
    let y1 = page.height - rect.y;
    [rect.x, y1 - rect.height, rect.x + rect.width, y1]
}

/// Flattened text laid out inside the rectangle: greedy word wrap,
/// lines that would cross the bottom edge truncated.
pub(crate) fn insert_text_box(
    sess: &mut SessionDocument,
    page_index: usize,
    rect: &DocRect,
    content: &str,
    style: &TextStyle,
) -> Result<(), EditError> {
    let page_id = sess.page_id(page_index)?;
    let page = sess.page_size(page_index)?;
    let size = style.font_size;
    let leading = 1.2 * size;

    let mut lines = wrap_text(content, rect.width, size);
    let fitting = if rect.height < size {
        0
    } else {
        ((rect.height - size) / leading) as usize + 1
    };
    if lines.len() > fitting {
        debug!(
            dropped = lines.len() - fitting,
            "text box overflow, truncating"
        );
        lines.truncate(fitting);
    }
    if lines.is_empty() {
        return Ok(());
    }

    ensure_font(sess, page_id)?;

    let first_baseline = page.height - rect.y - 0.8 * size;
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_RESOURCE.into()), real(size)]),
        Operation::new(
            "rg",
            vec![real(style.color.r), real(style.color.g), real(style.color.b)],
        ),
        Operation::new("TL", vec![real(leading)]),
        Operation::new(
            "Tm",
            vec![
                real(1.0),
                real(0.0),
                real(0.0),
                real(1.0),
                real(rect.x),
                real(first_baseline),
            ],
        ),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ops.push(Operation::new("T*", vec![]));
        }
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.as_str())],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));

    append_content(sess, page_id, ops)?;
    Ok(())
}

/// FreeText annotation: a separate, later-removable object rather than
/// flattened page content.
pub(crate) fn add_free_text_annotation(
    sess: &mut SessionDocument,
    page_index: usize,
    rect: &DocRect,
    content: &str,
    style: &TextStyle,
) -> Result<(), EditError> {
    let page_id = sess.page_id(page_index)?;
    let page = sess.page_size(page_index)?;
    let [x0, y0, x1, y1] = flip_rect(rect, page);
    let appearance = format!(
        "{:.3} {:.3} {:.3} rg /Helv {} Tf",
        style.color.r, style.color.g, style.color.b, style.font_size
    );
    let annotation = dictionary! {
        "Type" => "Annot",
        "Subtype" => "FreeText",
        "Rect" => vec![real(x0), real(y0), real(x1), real(y1)],
        "Contents" => Object::string_literal(content),
        "DA" => Object::string_literal(appearance),
        "F" => Object::Integer(4),
    };
    let annotation_id = sess.doc_mut().add_object(annotation);
    sess.mark_touched(annotation_id);
    attach_annotation(sess, page_id, annotation_id)
}

/// Decode the payload, re-encode as a flate-compressed RGB image
/// XObject, and paint it scaled to exactly fill the rectangle.
pub(crate) fn insert_image(
    sess: &mut SessionDocument,
    page_index: usize,
    rect: &DocRect,
    payload: &[u8],
) -> Result<(), EditError> {
    let page_id = sess.page_id(page_index)?;
    let page = sess.page_size(page_index)?;

    let decoded = image::load_from_memory(payload)
        .map_err(|e| EditError::ImagePayload(e.to_string()))?
        .to_rgb8();
    let (width, height) = decoded.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let data = encoder
        .write_all(decoded.as_raw())
        .and_then(|_| encoder.finish())
        .map_err(|e| EditError::Pdf(format!("image compression: {e}")))?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(width as i64),
        "Height" => Object::Integer(height as i64),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => Object::Integer(8),
        "Filter" => "FlateDecode",
    };
    let xobject_id = sess
        .doc_mut()
        .add_object(Stream::new(dict, data).with_compression(false));
    sess.mark_touched(xobject_id);
    let name = format!("PEIm{}", xobject_id.0);
    register_resource(sess, page_id, "XObject", &name, xobject_id)?;

    let [x0, y0, _, _] = flip_rect(rect, page);
    let ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(rect.width),
                real(0.0),
                real(0.0),
                real(rect.height),
                real(x0),
                real(y0),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.into())]),
        Operation::new("Q", vec![]),
    ];
    append_content(sess, page_id, ops)?;
    debug!(width, height, "placed image");
    Ok(())
}

/// Rectangle or ellipse bounded by the rectangle. Fill without stroke
/// when `stroke_width` is zero (the whiteout form), stroke without fill
/// when `fill` is absent.
pub(crate) fn draw_shape(
    sess: &mut SessionDocument,
    page_index: usize,
    rect: &DocRect,
    kind: ShapeKind,
    stroke: Color,
    stroke_width: f64,
    fill: Option<Color>,
) -> Result<(), EditError> {
    let page_id = sess.page_id(page_index)?;
    let page = sess.page_size(page_index)?;
    let [x0, y0, x1, y1] = flip_rect(rect, page);

    let mut ops = vec![Operation::new("q", vec![])];
    let stroking = stroke_width > 0.0;
    if stroking {
        ops.push(Operation::new("w", vec![real(stroke_width)]));
        ops.push(Operation::new(
            "RG",
            vec![real(stroke.r), real(stroke.g), real(stroke.b)],
        ));
    }
    if let Some(fill) = fill {
        ops.push(Operation::new(
            "rg",
            vec![real(fill.r), real(fill.g), real(fill.b)],
        ));
    }
    match kind {
        ShapeKind::Rectangle => ops.push(Operation::new(
            "re",
            vec![real(x0), real(y0), real(rect.width), real(rect.height)],
        )),
        ShapeKind::Ellipse => ellipse_path(&mut ops, x0, y0, x1, y1),
    }
    let paint = match (fill.is_some(), stroking) {
        (true, true) => "B",
        (true, false) => "f",
        (false, _) => "S",
    };
    ops.push(Operation::new(paint, vec![]));
    ops.push(Operation::new("Q", vec![]));

    append_content(sess, page_id, ops)?;
    Ok(())
}

/// Inscribed ellipse as four Bezier quadrants.
fn ellipse_path(ops: &mut Vec<Operation>, x0: f64, y0: f64, x1: f64, y1: f64) {
    let cx = (x0 + x1) / 2.0;
    let cy = (y0 + y1) / 2.0;
    let rx = (x1 - x0) / 2.0;
    let ry = (y1 - y0) / 2.0;
    let kx = CIRCLE_KAPPA * rx;
    let ky = CIRCLE_KAPPA * ry;
    ops.push(Operation::new("m", vec![real(cx + rx), real(cy)]));
    let quadrants = [
        [cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry],
        [cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy],
        [cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry],
        [cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy],
    ];
    for q in quadrants {
        ops.push(Operation::new("c", q.iter().map(|v| real(*v)).collect()));
    }
    ops.push(Operation::new("h", vec![]));
}

/// Interactive form field: a Widget annotation on the page plus a
/// catalog AcroForm entry so viewers treat it as fillable.
pub(crate) fn add_form_field(
    sess: &mut SessionDocument,
    page_index: usize,
    rect: &DocRect,
    kind: FieldKind,
    name: &str,
) -> Result<(), EditError> {
    let page_id = sess.page_id(page_index)?;
    let page = sess.page_size(page_index)?;
    let [x0, y0, x1, y1] = flip_rect(rect, page);
    let rect_obj = vec![real(x0), real(y0), real(x1), real(y1)];

    let widget = match kind {
        FieldKind::Text => dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(name),
            "V" => Object::string_literal(""),
            "Rect" => rect_obj,
            "F" => Object::Integer(4),
        },
        FieldKind::Checkbox => dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Btn",
            "T" => Object::string_literal(name),
            "V" => Object::Name(b"Off".to_vec()),
            "AS" => Object::Name(b"Off".to_vec()),
            "Rect" => rect_obj,
            "F" => Object::Integer(4),
        },
    };
    let field_id = sess.doc_mut().add_object(widget);
    sess.mark_touched(field_id);
    attach_annotation(sess, page_id, field_id)?;
    register_acroform_field(sess, field_id)
}

/// Locate every occurrence of `query` on the page, strip each from the
/// content stream, and when `replacement` is given reinsert it at the
/// occurrence's baseline in the matched text's size. Each occurrence
/// completes fully before the next is processed. Returns the number of
/// occurrences handled.
pub(crate) fn redact_text(
    sess: &mut SessionDocument,
    page_index: usize,
    query: &str,
    replacement: Option<&str>,
) -> Result<usize, EditError> {
    let page_id = sess.page_id(page_index)?;
    let page = sess.page_size(page_index)?;

    let mut occurrences = text::search_text(sess.doc(), page_id, page, query)?;
    if occurrences.is_empty() {
        return Ok(0);
    }
    if replacement.is_some() {
        ensure_font(sess, page_id)?;
    }
    // Back-to-front keeps every not-yet-processed location valid while
    // earlier strips rewrite the stream around it.
    occurrences.sort_by(|a, b| {
        let ka = (
            a.location.stream_id,
            a.location.op_index,
            a.location.elem_index,
            a.location.char_start,
        );
        let kb = (
            b.location.stream_id,
            b.location.op_index,
            b.location.elem_index,
            b.location.char_start,
        );
        kb.cmp(&ka)
    });

    for occurrence in &occurrences {
        text::strip_text(sess.doc_mut(), occurrence)?;
        if let Some(replacement) = replacement {
            let ops = vec![
                Operation::new("q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(FONT_RESOURCE.into()),
                        real(occurrence.font_size),
                    ],
                ),
                Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
                Operation::new(
                    "Tm",
                    vec![
                        real(1.0),
                        real(0.0),
                        real(0.0),
                        real(1.0),
                        real(occurrence.baseline.0),
                        real(occurrence.baseline.1),
                    ],
                ),
                Operation::new("Tj", vec![Object::string_literal(replacement)]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ];
            append_content(sess, page_id, ops)?;
        }
    }
    debug!(
        count = occurrences.len(),
        replaced = replacement.is_some(),
        "text redaction pass"
    );
    Ok(occurrences.len())
}

/// Greedy word wrap against built-in metrics; a single word wider than
/// the box is hard-broken.
fn wrap_text(content: &str, max_width: f64, font_size: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in content.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text::text_width(&candidate, font_size) <= max_width || line.is_empty() {
                line = candidate;
                if text::text_width(&line, font_size) > max_width {
                    hard_break(&mut lines, &mut line, max_width, font_size);
                }
            } else {
                lines.push(std::mem::take(&mut line));
                line = word.to_string();
                if text::text_width(&line, font_size) > max_width {
                    hard_break(&mut lines, &mut line, max_width, font_size);
                }
            }
        }
        if !line.is_empty() || paragraph.trim().is_empty() {
            lines.push(line);
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn hard_break(lines: &mut Vec<String>, line: &mut String, max_width: f64, font_size: f64) {
    while text::text_width(line, font_size) > max_width && line.len() > 1 {
        let mut head = String::new();
        let mut chars = line.chars();
        for c in chars.by_ref() {
            let mut probe = head.clone();
            probe.push(c);
            if text::text_width(&probe, font_size) > max_width && !head.is_empty() {
                let rest: String = std::iter::once(c).chain(chars).collect();
                lines.push(std::mem::take(&mut head));
                *line = rest;
                break;
            }
            head = probe;
        }
        if !head.is_empty() {
            *line = head;
            break;
        }
    }
}

/// Append a new content stream object to the page's /Contents chain.
/// Prior streams are never rewritten here.
fn append_content(
    sess: &mut SessionDocument,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<ObjectId, EditError> {
    let encoded = Content { operations }
        .encode()
        .map_err(|e| EditError::Pdf(format!("content encode: {e}")))?;
    let stream_id = sess
        .doc_mut()
        .add_object(Stream::new(Dictionary::new(), encoded));
    sess.mark_touched(stream_id);

    let current = {
        let page = sess
            .doc()
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(pdf_err)?;
        page.get(b"Contents").ok().cloned()
    };
    let updated = match current {
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(stream_id));
            Object::Array(items)
        }
        Some(existing @ Object::Reference(_)) => {
            Object::Array(vec![existing, Object::Reference(stream_id)])
        }
        _ => Object::Reference(stream_id),
    };
    set_page_entry(sess, page_id, "Contents", updated)?;
    Ok(stream_id)
}

/// Make sure the editor's Helvetica font is reachable from the page's
/// resources under [`FONT_RESOURCE`].
fn ensure_font(sess: &mut SessionDocument, page_id: ObjectId) -> Result<(), EditError> {
    if page_has_font(sess, page_id) {
        return Ok(());
    }
    let font_id = sess.doc_mut().add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    sess.mark_touched(font_id);
    register_resource(sess, page_id, "Font", FONT_RESOURCE, font_id)
}

fn page_has_font(sess: &SessionDocument, page_id: ObjectId) -> bool {
    let doc = sess.doc();
    let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) else {
        return false;
    };
    let Ok(resources) = page.get(b"Resources") else {
        return false;
    };
    let Ok(resources) = sess.resolve(resources).as_dict() else {
        return false;
    };
    let Ok(fonts) = resources.get(b"Font") else {
        return false;
    };
    match sess.resolve(fonts).as_dict() {
        Ok(fonts) => fonts.has(FONT_RESOURCE.as_bytes()),
        Err(_) => false,
    }
}

/// Register `name -> target` under `category` (/Font, /XObject) in the
/// page's resources, materializing inherited resources onto the page
/// when it has none of its own. The category dictionary is rebuilt as a
/// direct dictionary, so no nested indirect object needs rewriting.
fn register_resource(
    sess: &mut SessionDocument,
    page_id: ObjectId,
    category: &str,
    name: &str,
    target: ObjectId,
) -> Result<(), EditError> {
    let (mut resources, indirect) = {
        let doc = sess.doc();
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(pdf_err)?;
        match page.get(b"Resources") {
            Ok(Object::Reference(rid)) => {
                let dict = doc
                    .get_object(*rid)
                    .and_then(Object::as_dict)
                    .map_err(pdf_err)?;
                (dict.clone(), Some(*rid))
            }
            Ok(Object::Dictionary(dict)) => (dict.clone(), None),
            _ => (inherited_resources(sess, page_id), None),
        }
    };

    let mut entries = match resources.get(category.as_bytes()) {
        Ok(obj) => match sess.resolve(obj) {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };
    entries.set(name, Object::Reference(target));
    resources.set(category, Object::Dictionary(entries));

    match indirect {
        Some(rid) => {
            sess.doc_mut()
                .objects
                .insert(rid, Object::Dictionary(resources));
            sess.mark_touched(rid);
            Ok(())
        }
        None => set_page_entry(sess, page_id, "Resources", Object::Dictionary(resources)),
    }
}

/// Inherited resources from the page tree, cloned so they can be
/// materialized on the page without shadowing what existing content
/// depends on.
fn inherited_resources(sess: &SessionDocument, page_id: ObjectId) -> Dictionary {
    let doc = sess.doc();
    let mut current = page_id;
    for _ in 0..32 {
        let Ok(dict) = doc.get_object(current).and_then(Object::as_dict) else {
            return Dictionary::new();
        };
        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok(resources) = sess.resolve(resources).as_dict() {
                return resources.clone();
            }
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return Dictionary::new(),
        }
    }
    Dictionary::new()
}

fn set_page_entry(
    sess: &mut SessionDocument,
    page_id: ObjectId,
    key: &str,
    value: Object,
) -> Result<(), EditError> {
    let page = sess
        .doc_mut()
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdf_err)?;
    page.set(key, value);
    sess.mark_touched(page_id);
    Ok(())
}

/// Push an annotation reference onto the page's /Annots array.
fn attach_annotation(
    sess: &mut SessionDocument,
    page_id: ObjectId,
    annotation_id: ObjectId,
) -> Result<(), EditError> {
    let current = {
        let page = sess
            .doc()
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(pdf_err)?;
        page.get(b"Annots").ok().cloned()
    };
    match current {
        Some(Object::Reference(rid)) => {
            let array = sess
                .doc_mut()
                .get_object_mut(rid)
                .and_then(Object::as_array_mut)
                .map_err(pdf_err)?;
            array.push(Object::Reference(annotation_id));
            sess.mark_touched(rid);
            Ok(())
        }
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(annotation_id));
            set_page_entry(sess, page_id, "Annots", Object::Array(items))
        }
        _ => set_page_entry(
            sess,
            page_id,
            "Annots",
            Object::Array(vec![Object::Reference(annotation_id)]),
        ),
    }
}

/// Hang the field off the catalog's AcroForm, creating one when the
/// document has no interactive form yet.
fn register_acroform_field(
    sess: &mut SessionDocument,
    field_id: ObjectId,
) -> Result<(), EditError> {
    let root_id = match sess.doc().trailer.get(b"Root") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(EditError::Pdf("trailer has no Root".into())),
    };
    let acroform = {
        let catalog = sess
            .doc()
            .get_object(root_id)
            .and_then(Object::as_dict)
            .map_err(pdf_err)?;
        catalog.get(b"AcroForm").ok().cloned()
    };
    match acroform {
        Some(Object::Reference(form_id)) => {
            let form = sess
                .doc_mut()
                .get_object_mut(form_id)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_err)?;
            push_field(form, field_id);
            sess.mark_touched(form_id);
            Ok(())
        }
        Some(Object::Dictionary(mut form)) => {
            push_field(&mut form, field_id);
            set_catalog_entry(sess, root_id, Object::Dictionary(form))
        }
        _ => {
            let form = dictionary! {
                "Fields" => vec![Object::Reference(field_id)],
                "NeedAppearances" => Object::Boolean(true),
            };
            let form_id = sess.doc_mut().add_object(form);
            sess.mark_touched(form_id);
            set_catalog_entry(sess, root_id, Object::Reference(form_id))
        }
    }
}

fn push_field(form: &mut Dictionary, field_id: ObjectId) {
    match form.get_mut(b"Fields") {
        Ok(Object::Array(fields)) => fields.push(Object::Reference(field_id)),
        _ => form.set("Fields", vec![Object::Reference(field_id)]),
    }
}

fn set_catalog_entry(
    sess: &mut SessionDocument,
    root_id: ObjectId,
    form: Object,
) -> Result<(), EditError> {
    let catalog = sess
        .doc_mut()
        .get_object_mut(root_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdf_err)?;
    catalog.set("AcroForm", form);
    sess.mark_touched(root_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Document;
    use pretty_assertions::assert_eq;
    use shared_geom::PageSize;

    fn session(pages: usize) -> SessionDocument {
        SessionDocument::open(crate::testpdf::blank(pages)).unwrap()
    }

    fn page_dict(sess: &SessionDocument) -> &Dictionary {
        let page_id = sess.page_id(0).unwrap();
        sess.doc().get_object(page_id).unwrap().as_dict().unwrap()
    }

    /// Raw bytes of every content stream on page 0.
    fn flat_content(sess: &SessionDocument) -> String {
        let page_id = sess.page_id(0).unwrap();
        let mut out = String::new();
        for id in text::content_stream_ids(sess.doc(), page_id).unwrap() {
            if let Ok(Object::Stream(stream)) = sess.doc().get_object(id) {
                out.push_str(&String::from_utf8_lossy(&stream.content));
                out.push('\n');
            }
        }
        out
    }

    #[test]
    fn flip_rect_round_trips_through_page_height() {
        let rect = DocRect::new(50.0, 50.0, 100.0, 20.0);
        let [x0, y0, x1, y1] = flip_rect(&rect, PageSize::LETTER);
        assert_eq!((x0, x1), (50.0, 150.0));
        assert_eq!((y0, y1), (722.0, 742.0));
    }

    #[test]
    fn wrap_respects_width_and_breaks_long_words() {
        let lines = wrap_text("aaa bbb ccc", 1000.0, 12.0);
        assert_eq!(lines, vec!["aaa bbb ccc"]);

        let lines = wrap_text("hello world", text::text_width("hello", 12.0) + 1.0, 12.0);
        assert_eq!(lines, vec!["hello", "world"]);

        let narrow = text::text_width("ab", 12.0) + 0.5;
        let lines = wrap_text("abcd", narrow, 12.0);
        assert_eq!(lines, vec!["ab", "cd"]);
    }

    #[test]
    fn text_box_appends_content_and_registers_font() {
        let mut sess = session(1);
        let rect = DocRect::new(50.0, 50.0, 150.0, 70.0);
        insert_text_box(&mut sess, 0, &rect, "Hello", &TextStyle::default()).unwrap();

        let page = page_dict(&sess);
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));

        // The text lands where a search can find it, scaled to the box.
        let page_id = sess.page_id(0).unwrap();
        let hits = text::search_text(sess.doc(), page_id, PageSize::LETTER, "Hello").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].font_size, 16.0);
        assert_eq!(hits[0].rect.x, 50.0);
    }

    #[test]
    fn text_box_truncates_at_bottom_edge() {
        let mut sess = session(1);
        // One 16pt line fits in 20pt of height; the second does not.
        let rect = DocRect::new(10.0, 10.0, 40.0, 20.0);
        insert_text_box(
            &mut sess,
            0,
            &rect,
            "first second third fourth",
            &TextStyle::default(),
        )
        .unwrap();
        let page_id = sess.page_id(0).unwrap();
        assert_eq!(
            text::search_text(sess.doc(), page_id, PageSize::LETTER, "first")
                .unwrap()
                .len(),
            1
        );
        assert!(
            text::search_text(sess.doc(), page_id, PageSize::LETTER, "fourth")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn free_text_becomes_an_annotation() {
        let mut sess = session(1);
        let rect = DocRect::new(100.0, 100.0, 200.0, 30.0);
        add_free_text_annotation(&mut sess, 0, &rect, "note", &TextStyle::default()).unwrap();

        let page = page_dict(&sess);
        let annots = page.get(b"Annots").unwrap().as_array().unwrap();
        assert_eq!(annots.len(), 1);
        let annot = sess.resolve(&annots[0]).as_dict().unwrap();
        assert_eq!(
            annot.get(b"Subtype").unwrap().as_name().unwrap(),
            b"FreeText".as_slice()
        );
        let rect_arr = annot.get(b"Rect").unwrap().as_array().unwrap();
        assert_eq!(rect_arr.len(), 4);
    }

    #[test]
    fn shape_draw_emits_rect_path() {
        let mut sess = session(1);
        let rect = DocRect::new(20.0, 30.0, 100.0, 50.0);
        draw_shape(
            &mut sess,
            0,
            &rect,
            ShapeKind::Rectangle,
            Color::BLACK,
            2.0,
            None,
        )
        .unwrap();
        let content = flat_content(&sess);
        assert!(content.contains("re"));
        assert!(content.contains('S'));
        assert!(!content.contains('f'));
    }

    #[test]
    fn whiteout_is_fill_only() {
        let mut sess = session(1);
        let rect = DocRect::new(20.0, 30.0, 100.0, 50.0);
        draw_shape(
            &mut sess,
            0,
            &rect,
            ShapeKind::Rectangle,
            Color::WHITE,
            0.0,
            Some(Color::WHITE),
        )
        .unwrap();
        let content = flat_content(&sess);
        assert!(content.contains("1 1 1 rg"));
        assert!(content.contains("re\nf") || content.contains("re f") || content.contains("f\n"));
        assert!(!content.contains('S'));
    }

    #[test]
    fn ellipse_closes_with_four_curves() {
        let mut sess = session(1);
        let rect = DocRect::new(0.0, 0.0, 60.0, 40.0);
        draw_shape(
            &mut sess,
            0,
            &rect,
            ShapeKind::Ellipse,
            Color::BLACK,
            1.0,
            None,
        )
        .unwrap();
        let content = flat_content(&sess);
        assert_eq!(content.matches(" c").count(), 4);
        assert!(content.contains('h'));
    }

    #[test]
    fn form_field_registers_in_acroform() {
        let mut sess = session(1);
        let rect = DocRect::new(50.0, 600.0, 200.0, 18.0);
        add_form_field(&mut sess, 0, &rect, FieldKind::Text, "applicant").unwrap();

        let root_id = match sess.doc().trailer.get(b"Root").unwrap() {
            Object::Reference(id) => *id,
            _ => panic!("no root"),
        };
        let catalog = sess.doc().get_object(root_id).unwrap().as_dict().unwrap();
        let form = sess
            .resolve(catalog.get(b"AcroForm").unwrap())
            .as_dict()
            .unwrap();
        let fields = form.get(b"Fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 1);

        let widget = sess.resolve(&fields[0]).as_dict().unwrap();
        assert_eq!(
            widget.get(b"FT").unwrap().as_name().unwrap(),
            b"Tx".as_slice()
        );

        // Checkbox variant carries an appearance state.
        add_form_field(&mut sess, 0, &rect, FieldKind::Checkbox, "agreed").unwrap();
        let catalog = sess.doc().get_object(root_id).unwrap().as_dict().unwrap();
        let form = sess
            .resolve(catalog.get(b"AcroForm").unwrap())
            .as_dict()
            .unwrap();
        let fields = form.get(b"Fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 2);
        let widget = sess.resolve(&fields[1]).as_dict().unwrap();
        assert_eq!(
            widget.get(b"FT").unwrap().as_name().unwrap(),
            b"Btn".as_slice()
        );
        assert_eq!(
            widget.get(b"AS").unwrap().as_name().unwrap(),
            b"Off".as_slice()
        );
    }

    #[test]
    fn redact_strips_every_occurrence() {
        let bytes =
            crate::testpdf::with_content("BT /F1 12 Tf 1 0 0 1 72 700 Tm (foo bar foo) Tj ET");
        let mut sess = SessionDocument::open(bytes).unwrap();
        let count = redact_text(&mut sess, 0, "foo", None).unwrap();
        assert_eq!(count, 2);
        let page_id = sess.page_id(0).unwrap();
        assert!(
            text::search_text(sess.doc(), page_id, PageSize::LETTER, "foo")
                .unwrap()
                .is_empty()
        );
        // Untouched text survives.
        assert_eq!(
            text::search_text(sess.doc(), page_id, PageSize::LETTER, "bar")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn redact_zero_matches_is_a_no_op() {
        let bytes = crate::testpdf::with_content("BT /F1 12 Tf 1 0 0 1 72 700 Tm (hello) Tj ET");
        let mut sess = SessionDocument::open(bytes).unwrap();
        assert_eq!(redact_text(&mut sess, 0, "absent", None).unwrap(), 0);
    }

    #[test]
    fn replace_reinserts_at_each_anchor() {
        let bytes =
            crate::testpdf::with_content("BT /F1 12 Tf 1 0 0 1 72 700 Tm (foo and foo) Tj ET");
        let mut sess = SessionDocument::open(bytes).unwrap();
        let count = redact_text(&mut sess, 0, "foo", Some("bar")).unwrap();
        assert_eq!(count, 2);
        let page_id = sess.page_id(0).unwrap();
        assert!(
            text::search_text(sess.doc(), page_id, PageSize::LETTER, "foo")
                .unwrap()
                .is_empty()
        );
        let bars = text::search_text(sess.doc(), page_id, PageSize::LETTER, "bar").unwrap();
        assert_eq!(bars.len(), 2);
        // Replacement text sits on the original baselines in the
        // original size.
        assert_eq!(bars[0].font_size, 12.0);
        assert!(bars.iter().all(|b| b.baseline.1 == 700.0));
        assert_eq!(bars.iter().map(|b| b.rect.x).fold(f64::MAX, f64::min), 72.0);
    }

    #[test]
    fn mutations_survive_a_save_and_reload() {
        let mut sess = session(1);
        let rect = DocRect::new(50.0, 50.0, 200.0, 60.0);
        insert_text_box(&mut sess, 0, &rect, "persisted", &TextStyle::default()).unwrap();
        sess.record_mutation(0, false);
        sess.save().unwrap();

        let reloaded = Document::load_mem(sess.bytes()).unwrap();
        let page_id = *reloaded.get_pages().values().next().unwrap();
        let hits = text::search_text(&reloaded, page_id, PageSize::LETTER, "persisted").unwrap();
        assert_eq!(hits.len(), 1);
    }
}
