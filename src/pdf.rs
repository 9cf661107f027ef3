//! Conversion options and PDF page-geometry checks.

use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::PrintError;
use crate::geometry::{Orientation, PageGeometry, mm_to_points};

/// Maximum MediaBox deviation accepted from a converter, in points.
pub const SIZE_TOLERANCE_PT: f64 = 0.5;

/// Options handed to the converter. Fixed per job type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfOptions {
    pub landscape: bool,
    pub margins_zero: bool,
    pub print_background: bool,
    pub selection_only: bool,
    /// Paper size in micrometres, before orientation is applied.
    pub page_width_um: u32,
    pub page_height_um: u32,
}

impl PdfOptions {
    pub fn for_geometry(geometry: &PageGeometry) -> Self {
        let (page_width_um, page_height_um) = geometry.size_microns();
        Self {
            landscape: geometry.orientation == Orientation::Landscape,
            margins_zero: true,
            print_background: false,
            selection_only: false,
            page_width_um,
            page_height_um,
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        let orientation = if self.landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        PageGeometry::new(
            f64::from(self.page_width_um) / 1000.0,
            f64::from(self.page_height_um) / 1000.0,
            orientation,
        )
    }

    /// Oriented page size the produced PDF must have, in points.
    pub fn expected_points(&self) -> (f64, f64) {
        let (w, h) = self.geometry().oriented_mm();
        (mm_to_points(w), mm_to_points(h))
    }
}

/// Size of one PDF page as found in its MediaBox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub width_pt: f64,
    pub height_pt: f64,
    pub orientation: Orientation,
}

impl PageInfo {
    fn from_media_box(rect: [f64; 4]) -> Self {
        let width_pt = (rect[2] - rect[0]).abs();
        let height_pt = (rect[3] - rect[1]).abs();
        let orientation = if width_pt > height_pt {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        Self {
            width_pt,
            height_pt,
            orientation,
        }
    }
}

/// Reads every page's size from PDF bytes.
pub fn inspect(bytes: &[u8]) -> Result<Vec<PageInfo>, PrintError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| PrintError::Conversion(format!("unreadable PDF: {e}")))?;
    doc.get_pages()
        .into_values()
        .map(|id| media_box(&doc, id).map(PageInfo::from_media_box))
        .collect()
}

/// Checks converter output against the requested options.
///
/// Fails instead of accepting a page that came out at a different scale or
/// orientation.
pub fn verify(bytes: &[u8], options: &PdfOptions) -> Result<PageInfo, PrintError> {
    let pages = inspect(bytes)?;
    let first = pages
        .first()
        .copied()
        .ok_or_else(|| PrintError::Conversion("PDF has no pages".into()))?;

    let (want_w, want_h) = options.expected_points();
    let off = (first.width_pt - want_w).abs().max((first.height_pt - want_h).abs());
    if off > SIZE_TOLERANCE_PT {
        return Err(PrintError::Conversion(format!(
            "page is {:.2}x{:.2}pt, expected {:.2}x{:.2}pt",
            first.width_pt, first.height_pt, want_w, want_h
        )));
    }
    Ok(first)
}

// MediaBox is inheritable, so walk up the page tree until one is found.
fn media_box(doc: &Document, page: ObjectId) -> Result<[f64; 4], PrintError> {
    let mut current = page;
    for _ in 0..32 {
        let dict = doc
            .get_dictionary(current)
            .map_err(|e| PrintError::Conversion(format!("bad page object: {e}")))?;
        if let Ok(obj) = dict.get(b"MediaBox") {
            return parse_rect(doc, obj);
        }
        current = match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => parent,
            Err(_) => break,
        };
    }
    Err(PrintError::Conversion("page has no MediaBox".into()))
}

fn parse_rect(doc: &Document, obj: &Object) -> Result<[f64; 4], PrintError> {
    let bad = || PrintError::Conversion("malformed MediaBox".into());
    let (_, obj) = doc.dereference(obj).map_err(|_| bad())?;
    let items = obj.as_array().map_err(|_| bad())?;
    if items.len() != 4 {
        return Err(bad());
    }
    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(items) {
        *slot = match item {
            Object::Integer(i) => *i as f64,
            Object::Real(r) => f64::from(*r),
            _ => return Err(bad()),
        };
    }
    Ok(rect)
}
