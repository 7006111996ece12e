//! Append-only incremental persistence
//!
//! PDF supports updating a document by appending changed objects, a new
//! cross-reference section, and a trailer pointing back at the previous
//! one, leaving every prior byte untouched:
//!
//! ```text
//! ... original bytes ...
//! N 0 obj ... endobj        (each touched object)
//! xref
//! N 1
//! 0000001234 00000 n
//! trailer
//! << /Size S /Root R 0 R /Prev P >>
//! startxref
//! OFFSET
//! %%EOF
//! ```
//!
//! lopdf only exposes a full rewrite, so the update section is written
//! here by hand.

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::EditError;

/// Append an incremental update section carrying `touched` objects to
/// `bytes`. `bytes` must be the exact stream the document was last
/// serialized to, or the /Prev chain would dangle.
pub(crate) fn append_update(
    bytes: &[u8],
    doc: &Document,
    touched: &BTreeSet<ObjectId>,
) -> Result<Vec<u8>, EditError> {
    let prev = find_startxref(bytes)?;

    let mut out = bytes.to_vec();
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }

    let mut entries: Vec<(ObjectId, usize)> = Vec::with_capacity(touched.len());
    for &id in touched {
        let object = doc
            .objects
            .get(&id)
            .ok_or_else(|| EditError::Pdf(format!("touched object {} {} missing", id.0, id.1)))?;
        entries.push((id, out.len()));
        out.extend_from_slice(format!("{} {} obj\n", id.0, id.1).as_bytes());
        write_object(&mut out, object);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(b"xref\n");
    // One subsection per object keeps the writer trivial; readers
    // accept any subsection split.
    for (id, offset) in &entries {
        out.extend_from_slice(format!("{} 1\n", id.0).as_bytes());
        out.extend_from_slice(format!("{:010} {:05} n \n", offset, id.1).as_bytes());
    }

    let mut trailer = Dictionary::new();
    trailer.set("Size", Object::Integer(doc.max_id as i64 + 1));
    if let Ok(root) = doc.trailer.get(b"Root") {
        trailer.set("Root", root.clone());
    }
    if let Ok(info) = doc.trailer.get(b"Info") {
        trailer.set("Info", info.clone());
    }
    trailer.set("Prev", Object::Integer(prev as i64));

    out.extend_from_slice(b"trailer\n");
    write_object(&mut out, &Object::Dictionary(trailer));
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

    Ok(out)
}

/// Offset of the last cross-reference section in `bytes`, read from the
/// trailing `startxref` keyword.
fn find_startxref(bytes: &[u8]) -> Result<usize, EditError> {
    let window_start = bytes.len().saturating_sub(2048);
    let window = &bytes[window_start..];
    let keyword = b"startxref";
    let pos = window
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| EditError::SerializationFailure("no startxref in byte stream".into()))?;
    let after = &window[pos + keyword.len()..];
    let digits: String = after
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits
        .parse::<usize>()
        .map_err(|_| EditError::SerializationFailure("unparseable startxref offset".into()))
}

/// Serialize one object in PDF syntax.
fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => out.extend_from_slice(format!("{}", r).as_bytes()),
        Object::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(name);
        }
        Object::String(s, StringFormat::Hexadecimal) => {
            out.push(b'<');
            for byte in s {
                out.extend_from_slice(format!("{:02X}", byte).as_bytes());
            }
            out.push(b'>');
        }
        Object::String(s, StringFormat::Literal) => {
            out.push(b'(');
            for &byte in s {
                match byte {
                    b'(' | b')' | b'\\' => {
                        out.push(b'\\');
                        out.push(byte);
                    }
                    b'\n' => out.extend_from_slice(b"\\n"),
                    b'\r' => out.extend_from_slice(b"\\r"),
                    other => out.push(other),
                }
            }
            out.push(b')');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => {
            // /Length must match the bytes actually written, whatever
            // the dictionary carried before.
            let mut dict = stream.dict.clone();
            dict.set("Length", Object::Integer(stream.content.len() as i64));
            write_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference(id) => {
            out.extend_from_slice(format!("{} {} R", id.0, id.1).as_bytes())
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b'/');
        out.extend_from_slice(key);
        out.push(b' ');
        write_object(out, value);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}
