//! Stand-ins for the rendering surface, converter and printer.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lopdf::{Dictionary, Document, Object, Stream, dictionary};

use crate::convert::{PdfConverter, check_geometry};
use crate::dispatch::{PrintDispatcher, PrintReceipt};
use crate::error::PrintError;
use crate::geometry::PageGeometry;
use crate::pdf::PdfOptions;
use crate::render::{PageRenderer, RenderedPage};

/// A one-page PDF with the given MediaBox.
pub fn single_page_pdf(width_pt: f64, height_pt: f64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), (width_pt as f32).into(), (height_pt as f32).into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("in-memory PDF");
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Load,
    Fail,
    /// Never signals load completion.
    Hang,
}

pub struct StubRenderer {
    mode: RenderMode,
    calls: AtomicUsize,
    sources: Mutex<Vec<PathBuf>>,
}

impl StubRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sources(&self) -> Vec<PathBuf> {
        self.sources.lock().unwrap().clone()
    }
}

impl PageRenderer for StubRenderer {
    async fn render(&self, source: &Path, geometry: &PageGeometry) -> Result<RenderedPage, PrintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().unwrap().push(source.to_path_buf());
        match self.mode {
            RenderMode::Load => {
                let document = std::fs::read_to_string(source)
                    .map_err(|e| PrintError::Render(format!("cannot load: {e}")))?;
                Ok(RenderedPage::loaded(source.to_path_buf(), *geometry, document))
            }
            RenderMode::Fail => Err(PrintError::Render("resource load failed".into())),
            RenderMode::Hang => std::future::pending().await,
        }
    }
}

/// Emits a blank page sized from the options, or a pixel-scaled one when
/// `mis_scaled` is set.
pub struct StubConverter {
    mis_scaled: bool,
    calls: AtomicUsize,
}

impl StubConverter {
    pub fn new() -> Self {
        Self {
            mis_scaled: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn mis_scaled() -> Self {
        Self {
            mis_scaled: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PdfConverter for StubConverter {
    async fn to_pdf(&self, page: &RenderedPage, options: &PdfOptions) -> Result<Vec<u8>, PrintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        check_geometry(page, options)?;
        let (w, h) = options.expected_points();
        if self.mis_scaled {
            Ok(single_page_pdf(w * 0.75, h * 0.75))
        } else {
            Ok(single_page_pdf(w, h))
        }
    }
}

pub struct StubDispatcher {
    fail: bool,
    delay: Option<Duration>,
    printed: Mutex<Vec<PathBuf>>,
}

impl StubDispatcher {
    pub fn ok() -> Self {
        Self {
            fail: false,
            delay: None,
            printed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok()
        }
    }

    pub fn printed(&self) -> Vec<PathBuf> {
        self.printed.lock().unwrap().clone()
    }
}

impl PrintDispatcher for StubDispatcher {
    async fn print(&self, pdf_path: &Path) -> Result<PrintReceipt, PrintError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PrintError::PrintProcess("printer offline".into()));
        }
        self.printed.lock().unwrap().push(pdf_path.to_path_buf());
        Ok(PrintReceipt {
            pdf_path: pdf_path.to_path_buf(),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        })
    }
}
