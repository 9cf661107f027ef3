//! Off-screen page rendering.
//!
//! A [`RenderedPage`] only exists once the surface reported that the page and
//! all of its resources finished loading. Conversion takes that handle, so it
//! cannot start on a half-loaded page.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::PrintError;
use crate::geometry::PageGeometry;
use crate::process::ProcessSpec;

/// Handle to a page that finished loading on a rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    source: PathBuf,
    geometry: PageGeometry,
    document: String,
}

impl RenderedPage {
    /// Built by a surface when its load-finished signal fired.
    pub fn loaded(source: PathBuf, geometry: PageGeometry, document: String) -> Self {
        Self {
            source,
            geometry,
            document,
        }
    }

    /// File the page was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Serialized DOM after load.
    pub fn document(&self) -> &str {
        &self.document
    }
}

/// A surface that loads markup off-screen.
pub trait PageRenderer: Send + Sync {
    /// Loads `source` and resolves once loading has completed.
    fn render(
        &self,
        source: &Path,
        geometry: &PageGeometry,
    ) -> impl Future<Output = Result<RenderedPage, PrintError>> + Send;
}

/// Headless Chromium used as the off-screen surface.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    program: PathBuf,
    load_budget: Duration,
}

impl ChromiumRenderer {
    pub fn new(program: impl Into<PathBuf>, load_budget: Duration) -> Self {
        Self {
            program: program.into(),
            load_budget,
        }
    }

    fn command(&self, source: &Path, geometry: &PageGeometry) -> Result<ProcessSpec, PrintError> {
        let url = file_url(source).ok_or_else(|| {
            PrintError::Render(format!("{} is not an absolute path", source.display()))
        })?;
        let (w, h) = geometry.oriented_mm();
        Ok(ProcessSpec::new(&self.program)
            .args(headless_args(self.load_budget))
            .arg(format!("--window-size={},{}", css_px(w), css_px(h)))
            .arg("--dump-dom")
            .arg(url))
    }
}

impl PageRenderer for ChromiumRenderer {
    async fn render(
        &self,
        source: &Path,
        geometry: &PageGeometry,
    ) -> Result<RenderedPage, PrintError> {
        let spec = self.command(source, geometry)?;
        tracing::debug!(program = %spec.display_program(), source = %source.display(), "loading page");

        let out = spec.run().await.map_err(|e| {
            PrintError::Render(format!("cannot start {}: {e}", spec.display_program()))
        })?;
        if !out.success() {
            return Err(PrintError::Render(format!(
                "surface exited with {}: {}",
                out.describe_exit(),
                out.stderr_tail()
            )));
        }

        let document = String::from_utf8_lossy(&out.stdout).into_owned();
        if document.trim().is_empty() {
            return Err(PrintError::Render("surface produced an empty page".into()));
        }
        tracing::debug!(bytes = document.len(), ms = out.duration_ms, "page loaded");
        Ok(RenderedPage::loaded(source.to_path_buf(), *geometry, document))
    }
}

/// Flags shared by every headless browser invocation.
pub(crate) fn headless_args(load_budget: Duration) -> Vec<String> {
    vec![
        "--headless".into(),
        "--disable-gpu".into(),
        "--hide-scrollbars".into(),
        "--run-all-compositor-stages-before-draw".into(),
        format!("--virtual-time-budget={}", load_budget.as_millis()),
    ]
}

/// Percent-encoded `file://` URL for an absolute local path.
pub fn file_url(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(String::from)
}

// CSS pixels are 1/96".
fn css_px(mm: f64) -> u32 {
    (mm / 25.4 * 96.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureTag;

    #[cfg(unix)]
    #[test]
    fn command_line_for_badge() {
        let r = ChromiumRenderer::new("chromium", Duration::from_millis(3000));
        let spec = r
            .command(Path::new("/tmp/print-test/j/badge.html"), &PageGeometry::badge())
            .unwrap();
        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--virtual-time-budget=3000".to_string()));
        assert!(args.contains(&"--window-size=227,151".to_string()));
        assert_eq!(args.last().unwrap(), "file:///tmp/print-test/j/badge.html");
    }

    #[cfg(unix)]
    #[test]
    fn file_urls_are_percent_encoded() {
        assert_eq!(
            file_url(Path::new("/home/a/C# notes/print-test/badge.html")).unwrap(),
            "file:///home/a/C%23%20notes/print-test/badge.html"
        );
        assert_eq!(
            file_url(Path::new("/tmp/100%/a?b/badge.html")).unwrap(),
            "file:///tmp/100%25/a%3Fb/badge.html"
        );
    }

    #[cfg(windows)]
    #[test]
    fn windows_paths_become_file_urls() {
        assert_eq!(
            file_url(Path::new(r"C:\Users\me\Documents\print-test\badge.html")).unwrap(),
            "file:///C:/Users/me/Documents/print-test/badge.html"
        );
    }

    #[tokio::test]
    async fn relative_source_is_render_error() {
        let r = ChromiumRenderer::new("chromium", Duration::from_millis(10));
        assert!(file_url(Path::new("badges/badge.html")).is_none());
        let err = r
            .render(Path::new("badges/badge.html"), &PageGeometry::badge())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not an absolute path"));
    }

    #[tokio::test]
    async fn missing_browser_is_render_error() {
        let r = ChromiumRenderer::new("/definitely/not/a/browser", Duration::from_millis(10));
        let err = r
            .render(Path::new("/tmp/badge.html"), &PageGeometry::badge())
            .await
            .unwrap_err();
        assert_eq!(err.tag(), FailureTag::RenderError);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_becomes_the_rendered_page() {
        // `echo` prints its arguments, standing in for a DOM dump.
        let r = ChromiumRenderer::new("echo", Duration::from_millis(10));
        let page = r
            .render(Path::new("/tmp/print-test/badge.html"), &PageGeometry::badge())
            .await
            .unwrap();
        assert!(page.document().contains("--dump-dom"));
        assert_eq!(page.source(), Path::new("/tmp/print-test/badge.html"));
        assert_eq!(page.geometry(), &PageGeometry::badge());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_or_silent_surface_is_render_error() {
        let source = Path::new("/tmp/print-test/badge.html");

        let err = ChromiumRenderer::new("false", Duration::from_millis(10))
            .render(source, &PageGeometry::badge())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exit code 1"));

        let err = ChromiumRenderer::new("true", Duration::from_millis(10))
            .render(source, &PageGeometry::badge())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty page"));
    }
}
