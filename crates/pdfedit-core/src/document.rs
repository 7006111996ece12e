//! Session document handle
//!
//! Exactly one open document per active session, exclusively owned for
//! its whole lifetime. The handle tracks the dirty revision counter,
//! which objects were touched since the last save (for incremental
//! persistence), and whether a structural removal has happened (which
//! forces the next save to be a full serialization).

use std::collections::{BTreeSet, HashMap};

use lopdf::{Document, Object, ObjectId};
use shared_geom::{PageSize, Zoom};
use tracing::{debug, info, warn};

use crate::error::EditError;
use crate::incremental;
use crate::render::CachedPreview;

/// Upload size cap, matching the editor's 50 MB limit.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Zoom the preview is rendered at unless the caller picks another.
pub const DEFAULT_RENDER_ZOOM: f64 = 2.0;

/// Which persistence path a save took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// Append-only update section; prior bytes untouched.
    Incremental,
    /// Complete rewrite of the document's byte representation.
    Full,
}

#[derive(Debug)]
pub struct SessionDocument {
    doc: Document,
    /// Last serialized byte stream: the upload at open, then the output
    /// of each save. Incremental saves append to it.
    bytes: Vec<u8>,
    revision: u64,
    saved_revision: u64,
    structural_change: bool,
    touched: BTreeSet<ObjectId>,
    last_render: HashMap<usize, Zoom>,
    previews: HashMap<usize, CachedPreview>,
}

impl SessionDocument {
    /// Open an uploaded document. Size and type are rejected before any
    /// parse (`InvalidUpload`); a byte stream that cannot be parsed is
    /// `DocumentCorrupt`, fatal for that upload.
    pub fn open(bytes: Vec<u8>) -> Result<Self, EditError> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(EditError::InvalidUpload(format!(
                "file is {} bytes, limit is {} bytes",
                bytes.len(),
                MAX_UPLOAD_BYTES
            )));
        }
        if !bytes.starts_with(b"%PDF-") {
            return Err(EditError::InvalidUpload("not a PDF file".into()));
        }
        let doc =
            Document::load_mem(&bytes).map_err(|e| EditError::DocumentCorrupt(e.to_string()))?;
        let pages = doc.get_pages().len();
        info!(pages, size = bytes.len(), "opened document");
        Ok(Self {
            doc,
            bytes,
            revision: 0,
            saved_revision: 0,
            structural_change: false,
            touched: BTreeSet::new(),
            last_render: HashMap::new(),
            previews: HashMap::new(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page object id for a zero-based index. Re-derived on every call:
    /// page handles are never retained across structural changes.
    pub(crate) fn page_id(&self, index: usize) -> Result<ObjectId, EditError> {
        let pages = self.doc.get_pages();
        let count = pages.len();
        pages
            .into_iter()
            .nth(index)
            .map(|(_, id)| id)
            .ok_or(EditError::PageOutOfRange { index, count })
    }

    /// Native page dimensions in points, queried from the page's
    /// MediaBox (walking the Parent chain for inherited boxes). Letter
    /// is a fallback for pages that carry no usable MediaBox only.
    pub fn page_size(&self, index: usize) -> Result<PageSize, EditError> {
        let page_id = self.page_id(index)?;
        match self.media_box(page_id) {
            Some(size) => Ok(size),
            None => {
                warn!(index, "page has no usable MediaBox, assuming letter");
                Ok(PageSize::LETTER)
            }
        }
    }

    fn media_box(&self, page_id: ObjectId) -> Option<PageSize> {
        let mut current = page_id;
        // Parent chains are short; the cap only guards against cycles.
        for _ in 0..32 {
            let dict = self.doc.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(obj) = dict.get(b"MediaBox") {
                let obj = self.resolve(obj);
                if let Ok(arr) = obj.as_array() {
                    if arr.len() == 4 {
                        let nums: Vec<f64> = arr.iter().filter_map(object_to_f64).collect();
                        if nums.len() == 4 {
                            return Some(PageSize {
                                width: (nums[2] - nums[0]).abs(),
                                height: (nums[3] - nums[1]).abs(),
                            });
                        }
                    }
                }
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => current = *parent,
                _ => return None,
            }
        }
        None
    }

    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    pub(crate) fn doc(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Record an object as created or modified since the last save, so
    /// the incremental writer knows what to append.
    pub(crate) fn mark_touched(&mut self, id: ObjectId) {
        self.touched.insert(id);
    }

    /// Record one successful mutation: bump the revision exactly once
    /// and invalidate the cached preview for that page only.
    pub(crate) fn record_mutation(&mut self, page_index: usize, structural: bool) -> u64 {
        self.revision += 1;
        self.structural_change |= structural;
        self.previews.remove(&page_index);
        debug!(
            page_index,
            revision = self.revision,
            structural,
            "document mutated"
        );
        self.revision
    }

    /// Monotonically increasing mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether mutations are pending since the last save.
    pub fn is_dirty(&self) -> bool {
        self.revision > self.saved_revision
    }

    /// Whether a structural removal is pending since the last full
    /// serialization.
    pub fn has_structural_change(&self) -> bool {
        self.structural_change
    }

    /// The document's current serialized byte stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn set_rendered(&mut self, page_index: usize, preview: CachedPreview) {
        self.last_render.insert(page_index, preview.zoom);
        self.previews.insert(page_index, preview);
    }

    /// Zoom the page was last rendered at; the authority for staleness
    /// checks at commit time.
    pub fn last_render_zoom(&self, page_index: usize) -> Option<Zoom> {
        self.last_render.get(&page_index).copied()
    }

    pub fn preview(&self, page_index: usize) -> Option<&CachedPreview> {
        self.previews.get(&page_index)
    }

    /// Persist pending mutations. Incremental persistence is chosen only
    /// when no structural removal happened since the last full
    /// serialization; otherwise a full rewrite is forced. On failure the
    /// document stays open and dirty for retry.
    pub fn save(&mut self) -> Result<SaveKind, EditError> {
        if !self.is_dirty() {
            debug!("save skipped, document is clean");
            return Ok(SaveKind::Incremental);
        }
        if self.structural_change {
            self.save_full()?;
            return Ok(SaveKind::Full);
        }
        if self.touched.is_empty() {
            self.saved_revision = self.revision;
            return Ok(SaveKind::Incremental);
        }
        let updated = incremental::append_update(&self.bytes, &self.doc, &self.touched)?;
        info!(
            appended = updated.len() - self.bytes.len(),
            objects = self.touched.len(),
            "incremental save"
        );
        self.bytes = updated;
        self.touched.clear();
        self.saved_revision = self.revision;
        Ok(SaveKind::Incremental)
    }

    /// Full serialization of the whole document, used for export and
    /// forced whenever a structural change is pending.
    pub fn export(&mut self) -> Result<Vec<u8>, EditError> {
        self.save_full()?;
        Ok(self.bytes.clone())
    }

    fn save_full(&mut self) -> Result<(), EditError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| EditError::SerializationFailure(e.to_string()))?;
        info!(size = buffer.len(), "full serialization");
        self.bytes = buffer;
        self.touched.clear();
        self.structural_change = false;
        self.saved_revision = self.revision;
        Ok(())
    }

    /// Close the document and release its buffers.
    pub fn reset(self) {
        info!("session document closed");
        drop(self);
    }
}

pub(crate) fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}
