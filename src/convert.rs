//! Page-to-PDF conversion.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PrintError;
use crate::markup;
use crate::pdf::PdfOptions;
use crate::process::ProcessSpec;
use crate::render::{RenderedPage, file_url, headless_args};

/// File name of the captured document inside the converter's scratch directory.
const SNAPSHOT_FILE: &str = "page.html";

/// Turns a loaded page into PDF bytes.
///
/// Implementations must print the content held by the [`RenderedPage`] and lay
/// it out exactly as `options` says, failing rather than rescaling.
pub trait PdfConverter: Send + Sync {
    /// Converts a loaded page into PDF bytes laid out per `options`.
    fn to_pdf(
        &self,
        page: &RenderedPage,
        options: &PdfOptions,
    ) -> impl Future<Output = Result<Vec<u8>, PrintError>> + Send;
}

/// Rejects a page whose rendered geometry differs from what the options ask
/// for, instead of letting the converter rescale it.
pub fn check_geometry(page: &RenderedPage, options: &PdfOptions) -> Result<(), PrintError> {
    let wanted = options.geometry();
    if page.geometry().oriented_mm() != wanted.oriented_mm() {
        return Err(PrintError::Conversion(format!(
            "page was rendered at {} but conversion asks for {wanted}",
            page.geometry()
        )));
    }
    Ok(())
}

/// The document handed to the PDF backend: the DOM captured once loading
/// finished, with a `<base>` at its original location so relative resources
/// still resolve, and the page rule taken from `options`.
pub fn print_document(page: &RenderedPage, options: &PdfOptions) -> Result<String, PrintError> {
    let base = file_url(page.source()).ok_or_else(|| {
        PrintError::Conversion(format!("{} is not an absolute path", page.source().display()))
    })?;
    let styled = markup::with_page_style(page.document(), &options.geometry());
    let html = markup::with_base_href(&styled, &base);
    if html.trim_start().get(..9).is_some_and(|p| p.eq_ignore_ascii_case("<!doctype")) {
        Ok(html)
    } else {
        Ok(format!("<!DOCTYPE html>\n{html}"))
    }
}

/// Prints the loaded page through headless Chromium's PDF backend.
///
/// The browser is pointed at the DOM snapshot held by the [`RenderedPage`],
/// not at the original source, so the printed content is what the render
/// stage saw finish loading.
#[derive(Debug, Clone)]
pub struct ChromiumConverter {
    program: PathBuf,
    load_budget: Duration,
}

impl ChromiumConverter {
    pub fn new(program: impl Into<PathBuf>, load_budget: Duration) -> Self {
        Self {
            program: program.into(),
            load_budget,
        }
    }

    /// Writes the snapshot into `scratch` and builds the browser command that
    /// prints it to `<scratch>/page.pdf`.
    async fn prepare(
        &self,
        page: &RenderedPage,
        options: &PdfOptions,
        scratch: &Path,
    ) -> Result<(ProcessSpec, PathBuf), PrintError> {
        let snapshot = scratch.join(SNAPSHOT_FILE);
        tokio::fs::write(&snapshot, print_document(page, options)?)
            .await
            .map_err(|e| PrintError::Conversion(format!("cannot stage page snapshot: {e}")))?;
        let url = file_url(&snapshot).ok_or_else(|| {
            PrintError::Conversion(format!("{} is not an absolute path", snapshot.display()))
        })?;

        let output = scratch.join("page.pdf");
        let spec = ProcessSpec::new(&self.program)
            .args(headless_args(self.load_budget))
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(url);
        Ok((spec, output))
    }
}

impl PdfConverter for ChromiumConverter {
    async fn to_pdf(&self, page: &RenderedPage, options: &PdfOptions) -> Result<Vec<u8>, PrintError> {
        check_geometry(page, options)?;
        if options.selection_only || options.print_background || !options.margins_zero {
            return Err(PrintError::Conversion(
                "only full-page, zero-margin, no-background output is supported".into(),
            ));
        }

        let scratch = tempfile::Builder::new()
            .prefix("badgeprint-")
            .tempdir()
            .map_err(|e| PrintError::Conversion(format!("no scratch directory: {e}")))?;
        let (spec, output) = self.prepare(page, options, scratch.path()).await?;

        let out = spec.run().await.map_err(|e| {
            PrintError::Conversion(format!("cannot start {}: {e}", spec.display_program()))
        })?;
        if !out.success() {
            return Err(PrintError::Conversion(format!(
                "converter exited with {}: {}",
                out.describe_exit(),
                out.stderr_tail()
            )));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| PrintError::Conversion(format!("converter wrote no PDF: {e}")))?;
        tracing::debug!(bytes = bytes.len(), ms = out.duration_ms, "page converted");
        Ok(bytes)
    }
}
