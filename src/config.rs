//! badgeprint configuration loaded from `badgeprint.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! `BADGEPRINT_WORK_ROOT`, `BADGEPRINT_PRINTER` and `BADGEPRINT_BROWSER` take
//! precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coordinator::StageDeadlines;
use crate::dispatch;

pub const CONFIG_FILE: &str = "badgeprint.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintConfig {
    /// Directory holding one subdirectory per job.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// Printing executable, by default the one bundled next to the binary.
    #[serde(default = "default_printer_program")]
    pub printer_program: PathBuf,

    /// Printer arguments; `{pdf}` is replaced by the PDF path.
    #[serde(default = "dispatch::default_args")]
    pub printer_args: Vec<String>,

    /// Headless browser used as the rendering surface.
    #[serde(default = "default_browser_program")]
    pub browser_program: PathBuf,

    /// Virtual time the surface gets to finish loading fonts and images.
    #[serde(default = "default_load_budget_ms")]
    pub load_budget_ms: u64,

    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    #[serde(default = "default_convert_timeout_ms")]
    pub convert_timeout_ms: u64,

    #[serde(default = "default_print_timeout_ms")]
    pub print_timeout_ms: u64,

    /// Keep the directory of a failed job for inspection.
    #[serde(default)]
    pub keep_failed_artifacts: bool,

    /// QR image service for the built-in badge, with a `{payload}` placeholder.
    #[serde(default)]
    pub qr_image_url: Option<String>,
}

fn default_work_root() -> PathBuf {
    documents_dir().join("print-test")
}

fn default_printer_program() -> PathBuf {
    const BUNDLED: &str = "SumatraPDF.exe";
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(BUNDLED)))
        .unwrap_or_else(|| PathBuf::from(BUNDLED))
}

fn default_browser_program() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("chrome.exe")
    } else {
        PathBuf::from("chromium")
    }
}

fn default_load_budget_ms() -> u64 {
    3_000
}

fn default_render_timeout_ms() -> u64 {
    20_000
}

fn default_convert_timeout_ms() -> u64 {
    20_000
}

fn default_print_timeout_ms() -> u64 {
    60_000
}

// Documents folder as the platform reports it, then home, then the temp dir.
fn documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
            printer_program: default_printer_program(),
            printer_args: dispatch::default_args(),
            browser_program: default_browser_program(),
            load_budget_ms: default_load_budget_ms(),
            render_timeout_ms: default_render_timeout_ms(),
            convert_timeout_ms: default_convert_timeout_ms(),
            print_timeout_ms: default_print_timeout_ms(),
            keep_failed_artifacts: false,
            qr_image_url: None,
        }
    }
}

impl PrintConfig {
    /// Loads `badgeprint.toml` from the current directory, then applies
    /// environment overrides. Uses defaults if the file does not exist.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<PrintConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Applies `BADGEPRINT_*` overrides read through `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(root) = get("BADGEPRINT_WORK_ROOT") {
            self.work_root = PathBuf::from(root);
        }
        if let Some(printer) = get("BADGEPRINT_PRINTER") {
            self.printer_program = PathBuf::from(printer);
        }
        if let Some(browser) = get("BADGEPRINT_BROWSER") {
            self.browser_program = PathBuf::from(browser);
        }
    }

    pub fn load_budget(&self) -> Duration {
        Duration::from_millis(self.load_budget_ms)
    }

    pub fn deadlines(&self) -> StageDeadlines {
        StageDeadlines {
            render: Duration::from_millis(self.render_timeout_ms),
            convert: Duration::from_millis(self.convert_timeout_ms),
            print: Duration::from_millis(self.print_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = PrintConfig::default();
        assert!(config.work_root.ends_with("print-test"));
        if let Some(docs) = dirs::document_dir() {
            assert_eq!(config.work_root, docs.join("print-test"));
        }
        assert!(config.printer_program.ends_with("SumatraPDF.exe"));
        assert_eq!(config.printer_args, vec!["-print-to-default", "-silent", "{pdf}"]);
        assert_eq!(config.load_budget_ms, 3_000);
        assert!(!config.keep_failed_artifacts);
        assert!(config.qr_image_url.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            work_root = "/srv/badges"
            print_timeout_ms = 5000
            keep_failed_artifacts = true
        "#;
        let config: PrintConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.work_root, PathBuf::from("/srv/badges"));
        assert_eq!(config.deadlines().print, Duration::from_millis(5000));
        assert!(config.keep_failed_artifacts);
        assert_eq!(config.render_timeout_ms, 20_000);
        assert_eq!(config.printer_args, dispatch::default_args());
    }

    #[test]
    fn overrides_take_precedence_and_skip_empty() {
        let mut config = PrintConfig::default();
        config.apply_overrides(|key| match key {
            "BADGEPRINT_PRINTER" => Some("/usr/bin/lp".to_string()),
            "BADGEPRINT_BROWSER" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.printer_program, PathBuf::from("/usr/bin/lp"));
        assert_eq!(config.browser_program, default_browser_program());
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = PrintConfig::load_from(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.print_timeout_ms, 60_000);
    }

    #[test]
    fn load_from_reports_bad_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "load_budget_ms = \"soon\"").unwrap();
        let err = PrintConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
