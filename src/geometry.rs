//! Physical page geometry for printed badges.
//!
//! Sizes are kept in millimetres and only converted at the edges: points for
//! PDF MediaBox checks, micrometres for converter options and CSS lengths for
//! the injected `@page` rule.

use std::fmt;

use serde::{Deserialize, Serialize};

const MM_PER_INCH: f64 = 25.4;
const POINTS_PER_INCH: f64 = 72.0;

/// Page orientation. Landscape puts the long edge horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
        }
    }
}

/// Paper size plus orientation for one rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
    pub orientation: Orientation,
}

impl PageGeometry {
    pub const fn new(width_mm: f64, height_mm: f64, orientation: Orientation) -> Self {
        Self {
            width_mm,
            height_mm,
            orientation,
        }
    }

    /// The small-format label every badge job prints on: 60 mm x 40 mm, landscape.
    pub const fn badge() -> Self {
        Self::new(60.0, 40.0, Orientation::Landscape)
    }

    /// Both sides finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width_mm.is_finite()
            && self.height_mm.is_finite()
            && self.width_mm > 0.0
            && self.height_mm > 0.0
    }

    /// Width and height in millimetres as laid out on the sheet.
    pub fn oriented_mm(&self) -> (f64, f64) {
        let long = self.width_mm.max(self.height_mm);
        let short = self.width_mm.min(self.height_mm);
        match self.orientation {
            Orientation::Landscape => (long, short),
            Orientation::Portrait => (short, long),
        }
    }

    /// Oriented size in PDF points (1/72").
    pub fn size_points(&self) -> (f64, f64) {
        let (w, h) = self.oriented_mm();
        (mm_to_points(w), mm_to_points(h))
    }

    /// Paper size in micrometres, unoriented, as page-size options expect it.
    pub fn size_microns(&self) -> (u32, u32) {
        (
            (self.width_mm * 1000.0).round() as u32,
            (self.height_mm * 1000.0).round() as u32,
        )
    }

    /// Oriented size as a CSS `size` value, e.g. `60mm 40mm`.
    pub fn css_size(&self) -> String {
        let (w, h) = self.oriented_mm();
        format!("{}mm {}mm", trim_float(w), trim_float(h))
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::badge()
    }
}

impl fmt::Display for PageGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.oriented_mm();
        write!(
            f,
            "{}mm x {}mm {}",
            trim_float(w),
            trim_float(h),
            self.orientation
        )
    }
}

pub fn mm_to_points(mm: f64) -> f64 {
    mm / MM_PER_INCH * POINTS_PER_INCH
}

fn trim_float(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}
