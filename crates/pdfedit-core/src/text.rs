//! Content-stream text location and removal
//!
//! Locates occurrences of a search string on a page by walking the
//! page's content streams, and strips located text out of the stream
//! bytes for redaction. Matching happens within a single shown-text
//! run (one `Tj`, `'`, `"`, or one string element of a `TJ` array);
//! matches spanning runs are not located.
//!
//! Glyph advances come from the font's /Widths array when present,
//! falling back to built-in Helvetica metrics, so positions are exact
//! for text this editor produced and close for common generators.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use shared_geom::{DocRect, PageSize};

use crate::document::object_to_f64;
use crate::error::EditError;

/// Helvetica advance widths for codes 32..=126, thousandths of an em.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333,
    278, 278, 556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278,
    584, 584, 584, 556, 1015, 667, 667, 722, 722, 667, 611, 778, 722, 278,
    500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944,
    667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556,
    278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Built-in advance width of one byte, in thousandths of an em.
pub(crate) fn builtin_width(byte: u8) -> f64 {
    if (32..=126).contains(&byte) {
        HELVETICA_WIDTHS[(byte - 32) as usize] as f64
    } else {
        556.0
    }
}

/// Width of a string at a font size, built-in metrics.
pub(crate) fn text_width(text: &str, font_size: f64) -> f64 {
    text.bytes().map(builtin_width).sum::<f64>() / 1000.0 * font_size
}

/// Ratio of the Helvetica descender below the baseline.
const DESCENT: f64 = 0.21;

/// Per-font advance widths read from the page resources.
struct FontMetrics {
    first_char: u8,
    widths: Vec<f64>,
}

impl FontMetrics {
    fn width(&self, byte: u8) -> f64 {
        let index = byte.wrapping_sub(self.first_char) as usize;
        match self.widths.get(index) {
            Some(w) if byte >= self.first_char => *w,
            _ => builtin_width(byte),
        }
    }
}

/// One contiguous shown-text run with resolved geometry.
struct TextRun {
    text: Vec<char>,
    /// Baseline start in PDF user space (bottom-left origin, Y up).
    baseline: (f64, f64),
    font_size: f64,
    /// Advance per character, in points, including character spacing.
    advances: Vec<f64>,
    stream_id: ObjectId,
    op_index: usize,
    /// Index of the string element inside a TJ array, if any.
    elem_index: Option<usize>,
    /// Character offset of this run's text inside the string operand.
    char_base: usize,
}

/// Where a located occurrence lives inside the content stream, for the
/// strip pass.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunLocation {
    pub stream_id: ObjectId,
    pub op_index: usize,
    pub elem_index: Option<usize>,
    pub char_start: usize,
    pub char_len: usize,
}

/// One located occurrence of a search string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Occurrence {
    /// Document space (top-left origin, Y down).
    pub rect: DocRect,
    /// PDF user space baseline of the match start.
    pub baseline: (f64, f64),
    pub font_size: f64,
    pub location: RunLocation,
}

/// Locate every occurrence of `query` on the page.
pub(crate) fn search_text(
    doc: &Document,
    page_id: ObjectId,
    page: PageSize,
    query: &str,
) -> Result<Vec<Occurrence>, EditError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let needle: Vec<char> = query.chars().collect();
    let runs = collect_runs(doc, page_id)?;
    let mut found = Vec::new();
    for run in &runs {
        let mut start = 0;
        while start + needle.len() <= run.text.len() {
            if run.text[start..start + needle.len()] == needle[..] {
                let x = run.baseline.0 + run.advances[..start].iter().sum::<f64>();
                let width = run.advances[start..start + needle.len()].iter().sum::<f64>();
                let y0 = run.baseline.1 - DESCENT * run.font_size;
                let height = run.font_size;
                found.push(Occurrence {
                    rect: DocRect::new(x, page.height - (y0 + height), width, height),
                    baseline: (x, run.baseline.1),
                    font_size: run.font_size,
                    location: RunLocation {
                        stream_id: run.stream_id,
                        op_index: run.op_index,
                        elem_index: run.elem_index,
                        char_start: run.char_base + start,
                        char_len: needle.len(),
                    },
                });
                start += needle.len();
            } else {
                start += 1;
            }
        }
    }
    Ok(found)
}

/// Irreversibly remove one located occurrence from its content stream.
///
/// The shown string is split around the match and rejoined as a `TJ`
/// array with a kerning adjustment compensating the removed advance, so
/// every surviving glyph keeps its position and previously located
/// occurrences stay valid.
pub(crate) fn strip_text(doc: &mut Document, occurrence: &Occurrence) -> Result<(), EditError> {
    let loc = &occurrence.location;
    let data = stream_data(doc, loc.stream_id)?;
    let mut content =
        Content::decode(&data).map_err(|e| EditError::Pdf(format!("content decode: {e}")))?;

    // A prior strip may have unfolded the recorded operator (a `'` or
    // `"` becomes spacing ops plus a TJ); the shown string is then the
    // first text-showing op at or shortly after the recorded index.
    let mut index = loc.op_index;
    loop {
        let operator = content
            .operations
            .get(index)
            .map(|op| op.operator.as_str())
            .ok_or_else(|| EditError::Pdf("stale content location".into()))?;
        if matches!(operator, "Tj" | "'" | "\"" | "TJ") {
            break;
        }
        if index - loc.op_index >= 3 {
            return Err(EditError::Pdf("stale content location".into()));
        }
        index += 1;
    }

    let operator = content.operations[index].operator.clone();
    let adjustment = -(occurrence.rect.width * 1000.0 / occurrence.font_size);

    match operator.as_str() {
        "Tj" | "'" => {
            let bytes = string_operand(content.operations[index].operands.last())?;
            let array = split_shown_string(&bytes, loc.char_start, loc.char_len, adjustment);
            content.operations[index] = Operation::new("TJ", vec![Object::Array(array)]);
            if operator == "'" {
                content.operations.insert(index, Operation::new("T*", vec![]));
            }
        }
        "\"" => {
            // `aw ac (s) "` carries spacing side effects; unfold them.
            let operands = &content.operations[index].operands;
            let bytes = string_operand(operands.get(2))?;
            let aw = operands.first().cloned().unwrap_or(Object::Integer(0));
            let ac = operands.get(1).cloned().unwrap_or(Object::Integer(0));
            let array = split_shown_string(&bytes, loc.char_start, loc.char_len, adjustment);
            content.operations[index] = Operation::new("TJ", vec![Object::Array(array)]);
            content.operations.insert(index, Operation::new("T*", vec![]));
            content.operations.insert(index, Operation::new("Tc", vec![ac]));
            content.operations.insert(index, Operation::new("Tw", vec![aw]));
        }
        "TJ" => {
            // A location recorded against a Tj that has since become a
            // TJ lives in the prefix string, element 0.
            let elem = loc.elem_index.unwrap_or(0);
            let array = match content.operations[index].operands.first_mut() {
                Some(Object::Array(items)) => items,
                _ => return Err(EditError::Pdf("TJ without array operand".into())),
            };
            let bytes = string_operand(array.get(elem))?;
            let replacement = split_shown_string(&bytes, loc.char_start, loc.char_len, adjustment);
            array.splice(elem..=elem, replacement);
        }
        other => {
            return Err(EditError::Pdf(format!(
                "cannot strip from operator {other:?}"
            )))
        }
    }

    let encoded = content
        .encode()
        .map_err(|e| EditError::Pdf(format!("content encode: {e}")))?;
    doc.objects.insert(
        loc.stream_id,
        Object::Stream(Stream::new(Dictionary::new(), encoded)),
    );
    Ok(())
}

fn string_operand(obj: Option<&Object>) -> Result<Vec<u8>, EditError> {
    match obj {
        Some(Object::String(bytes, _)) => Ok(bytes.clone()),
        _ => Err(EditError::Pdf("expected string operand".into())),
    }
}

/// `(prefix match suffix)` -> `[(prefix) adj (suffix)]` with the match
/// removed. Byte indices equal character indices: strings are decoded
/// one byte per character.
fn split_shown_string(bytes: &[u8], start: usize, len: usize, adjustment: f64) -> Vec<Object> {
    let mut out = Vec::with_capacity(3);
    if start > 0 {
        out.push(Object::String(
            bytes[..start].to_vec(),
            lopdf::StringFormat::Literal,
        ));
    }
    out.push(Object::Real(adjustment as f32));
    if start + len < bytes.len() {
        out.push(Object::String(
            bytes[start + len..].to_vec(),
            lopdf::StringFormat::Literal,
        ));
    }
    out
}

/// Content stream object ids of a page, in paint order.
pub(crate) fn content_stream_ids(
    doc: &Document,
    page_id: ObjectId,
) -> Result<Vec<ObjectId>, EditError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| EditError::Pdf(e.to_string()))?;
    let mut ids = Vec::new();
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => {
            // A single reference may point at a stream or at an array.
            match doc.get_object(*id) {
                Ok(Object::Array(items)) => collect_refs(items, &mut ids),
                _ => ids.push(*id),
            }
        }
        Ok(Object::Array(items)) => collect_refs(items, &mut ids),
        _ => {}
    }
    Ok(ids)
}

fn collect_refs(items: &[Object], out: &mut Vec<ObjectId>) {
    for item in items {
        if let Object::Reference(id) = item {
            out.push(*id);
        }
    }
}

fn stream_data(doc: &Document, stream_id: ObjectId) -> Result<Vec<u8>, EditError> {
    let stream = match doc.get_object(stream_id) {
        Ok(Object::Stream(s)) => s,
        _ => return Err(EditError::Pdf("content object is not a stream".into())),
    };
    Ok(stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone()))
}

/// Font widths available on the page, keyed by resource name.
fn page_font_metrics(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontMetrics> {
    let mut metrics = HashMap::new();
    let Some(fonts) = page_fonts_dict(doc, page_id) else {
        return metrics;
    };
    for (name, value) in fonts.iter() {
        let font = match resolve(doc, value).and_then(|o| o.as_dict().ok()) {
            Some(d) => d,
            None => continue,
        };
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(object_to_f64)
            .unwrap_or(0.0) as u8;
        let widths: Vec<f64> = match font.get(b"Widths").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Array(items)) => items
                .iter()
                .filter_map(|o| resolve(doc, o).and_then(object_to_f64))
                .collect(),
            _ => continue,
        };
        metrics.insert(name.to_vec(), FontMetrics { first_char, widths });
    }
    metrics
}

fn page_fonts_dict<'a>(doc: &'a Document, page_id: ObjectId) -> Option<&'a Dictionary> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            let resources = resolve(doc, resources)?.as_dict().ok()?;
            if let Ok(fonts) = resources.get(b"Font") {
                return resolve(doc, fonts)?.as_dict().ok();
            }
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Minimal text-state machine over the page's content streams. Assumes
/// unrotated, unsheared text (Tm used for translation), which holds for
/// everything this editor writes and for ordinary body text.
fn collect_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>, EditError> {
    let fonts = page_font_metrics(doc, page_id);
    let mut runs = Vec::new();

    for stream_id in content_stream_ids(doc, page_id)? {
        let data = stream_data(doc, stream_id)?;
        let content =
            Content::decode(&data).map_err(|e| EditError::Pdf(format!("content decode: {e}")))?;

        let mut font: Option<&FontMetrics> = None;
        let mut font_size = 0.0f64;
        let mut char_spacing = 0.0f64;
        let mut word_spacing = 0.0f64;
        let mut leading = 0.0f64;
        let mut line = (0.0f64, 0.0f64);
        let mut cursor = 0.0f64;

        for (op_index, op) in content.operations.iter().enumerate() {
            let operands = &op.operands;
            match op.operator.as_str() {
                "BT" => {
                    line = (0.0, 0.0);
                    cursor = 0.0;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        font = fonts.get(name.as_slice());
                    }
                    font_size = operands.get(1).and_then(object_to_f64).unwrap_or(font_size);
                }
                "Td" | "TD" => {
                    let tx = operands.first().and_then(object_to_f64).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(object_to_f64).unwrap_or(0.0);
                    line = (line.0 + tx, line.1 + ty);
                    cursor = 0.0;
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                }
                "Tm" => {
                    let e = operands.get(4).and_then(object_to_f64).unwrap_or(0.0);
                    let f = operands.get(5).and_then(object_to_f64).unwrap_or(0.0);
                    line = (e, f);
                    cursor = 0.0;
                }
                "T*" => {
                    line = (line.0, line.1 - leading);
                    cursor = 0.0;
                }
                "TL" => leading = operands.first().and_then(object_to_f64).unwrap_or(leading),
                "Tc" => {
                    char_spacing = operands.first().and_then(object_to_f64).unwrap_or(0.0)
                }
                "Tw" => {
                    word_spacing = operands.first().and_then(object_to_f64).unwrap_or(0.0)
                }
                "Tj" | "'" | "\"" => {
                    if op.operator != "Tj" {
                        line = (line.0, line.1 - leading);
                        cursor = 0.0;
                    }
                    if op.operator == "\"" {
                        word_spacing = operands.first().and_then(object_to_f64).unwrap_or(0.0);
                        char_spacing = operands.get(1).and_then(object_to_f64).unwrap_or(0.0);
                    }
                    if let Some(Object::String(bytes, _)) = operands.last() {
                        let run = make_run(
                            bytes,
                            font,
                            font_size,
                            char_spacing,
                            word_spacing,
                            (line.0 + cursor, line.1),
                            stream_id,
                            op_index,
                            None,
                            0,
                        );
                        cursor += run.advances.iter().sum::<f64>();
                        runs.push(run);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for (elem_index, item) in items.iter().enumerate() {
                            match item {
                                Object::String(bytes, _) => {
                                    let run = make_run(
                                        bytes,
                                        font,
                                        font_size,
                                        char_spacing,
                                        word_spacing,
                                        (line.0 + cursor, line.1),
                                        stream_id,
                                        op_index,
                                        Some(elem_index),
                                        0,
                                    );
                                    cursor += run.advances.iter().sum::<f64>();
                                    runs.push(run);
                                }
                                other => {
                                    if let Some(adjust) = object_to_f64(other) {
                                        cursor -= adjust / 1000.0 * font_size;
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    Ok(runs)
}

#[allow(clippy::too_many_arguments)]
fn make_run(
    bytes: &[u8],
    font: Option<&FontMetrics>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    baseline: (f64, f64),
    stream_id: ObjectId,
    op_index: usize,
    elem_index: Option<usize>,
    char_base: usize,
) -> TextRun {
    let mut text = Vec::with_capacity(bytes.len());
    let mut advances = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        // One byte, one character: simple-font assumption, which also
        // keeps byte and character indices interchangeable.
        text.push(byte as char);
        let glyph = match font {
            Some(metrics) => metrics.width(byte),
            None => builtin_width(byte),
        };
        let mut advance = glyph / 1000.0 * font_size + char_spacing;
        if byte == b' ' {
            advance += word_spacing;
        }
        advances.push(advance);
    }
    TextRun {
        text,
        baseline,
        font_size,
        advances,
        stream_id,
        op_index,
        elem_index,
        char_base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open(content: &str) -> (Document, ObjectId) {
        let bytes = crate::testpdf::with_content(content);
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        (doc, page_id)
    }

    #[test]
    fn builtin_widths_are_sane() {
        assert_eq!(builtin_width(b' '), 278.0);
        assert_eq!(builtin_width(b'W'), 944.0);
        assert!(text_width("Hello", 16.0) > 0.0);
    }

    #[test]
    fn finds_two_occurrences_in_one_run() {
        let (doc, page_id) = open("BT /F1 12 Tf 1 0 0 1 72 700 Tm (foo bar foo) Tj ET");
        let hits = search_text(&doc, page_id, PageSize::LETTER, "foo").unwrap();
        assert_eq!(hits.len(), 2);
        // Both on the same baseline, second strictly to the right.
        assert_eq!(hits[0].baseline.1, 700.0);
        assert!(hits[1].rect.x > hits[0].rect.x);
        // First match starts at the run origin.
        assert_eq!(hits[0].rect.x, 72.0);
        // Top-left document space: y measured down from the page top.
        let expected_y = 792.0 - (700.0 - DESCENT * 12.0 + 12.0);
        assert!((hits[0].rect.y - expected_y).abs() < 1e-9);
    }

    #[test]
    fn finds_occurrences_across_separate_runs() {
        let (doc, page_id) = open(
            "BT /F1 12 Tf 1 0 0 1 72 700 Tm (foo) Tj 1 0 0 1 72 650 Tm (also foo) Tj ET",
        );
        let hits = search_text(&doc, page_id, PageSize::LETTER, "foo").unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[1].baseline.1 < hits[0].baseline.1);
    }

    #[test]
    fn no_match_for_absent_text() {
        let (doc, page_id) = open("BT /F1 12 Tf 1 0 0 1 72 700 Tm (hello world) Tj ET");
        let hits = search_text(&doc, page_id, PageSize::LETTER, "foo").unwrap();
        assert!(hits.is_empty());
        let hits = search_text(&doc, page_id, PageSize::LETTER, "").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn strip_removes_match_and_keeps_neighbours() {
        let (mut doc, page_id) = open("BT /F1 12 Tf 1 0 0 1 72 700 Tm (foo bar foo) Tj ET");
        let hits = search_text(&doc, page_id, PageSize::LETTER, "foo").unwrap();
        assert_eq!(hits.len(), 2);
        // Strip back to front so stored locations stay valid.
        for hit in hits.iter().rev() {
            strip_text(&mut doc, hit).unwrap();
        }
        let after = search_text(&doc, page_id, PageSize::LETTER, "foo").unwrap();
        assert!(after.is_empty());
        // Unmatched text survives at its original position.
        let bar = search_text(&doc, page_id, PageSize::LETTER, "bar").unwrap();
        assert_eq!(bar.len(), 1);
        let bar_before_x = 72.0 + text_width("foo ", 12.0);
        assert!((bar[0].rect.x - bar_before_x).abs() < 1e-6);
    }

    #[test]
    fn strip_inside_tj_array_element() {
        let (mut doc, page_id) =
            open("BT /F1 12 Tf 1 0 0 1 72 700 Tm [(abc foo def) -50 (tail)] TJ ET");
        let hits = search_text(&doc, page_id, PageSize::LETTER, "foo").unwrap();
        assert_eq!(hits.len(), 1);
        strip_text(&mut doc, &hits[0]).unwrap();
        assert!(search_text(&doc, page_id, PageSize::LETTER, "foo")
            .unwrap()
            .is_empty());
        // Kerning compensation keeps the tail where it was.
        let (reference_doc, reference_page) =
            open("BT /F1 12 Tf 1 0 0 1 72 700 Tm [(abc foo def) -50 (tail)] TJ ET");
        let reference =
            search_text(&reference_doc, reference_page, PageSize::LETTER, "tail").unwrap();
        let stripped = search_text(&doc, page_id, PageSize::LETTER, "tail").unwrap();
        assert_eq!(stripped.len(), 1);
        assert!((stripped[0].rect.x - reference[0].rect.x).abs() < 1e-6);
    }

    #[test]
    fn widths_array_overrides_builtin_metrics() {
        // A font declaring double-width glyphs doubles the match width.
        let bytes = crate::testpdf::with_content_and_widths(
            "BT /F1 10 Tf 1 0 0 1 0 700 Tm (aa) Tj ET",
            32,
            vec![1112.0; 95],
        );
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let hits = search_text(&doc, page_id, PageSize::LETTER, "aa").unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].rect.width - 2.0 * 11.12).abs() < 1e-6);
    }
}
