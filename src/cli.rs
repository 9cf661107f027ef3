//! Command-line interface built on clap.
//!
//! [`Cli`] carries the subcommands in [`Command`] (print, serve, config) and
//! global overrides for the work root, printer and browser.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PrintConfig;

/// Prints badges on a label printer through a headless browser.
#[derive(Debug, Parser)]
#[command(name = "badgeprint", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory that receives one folder per job.
    #[arg(long, global = true)]
    pub work_root: Option<PathBuf>,

    /// Printing executable.
    #[arg(long, global = true)]
    pub printer: Option<PathBuf>,

    /// Headless browser used to render and convert.
    #[arg(long, global = true)]
    pub browser: Option<PathBuf>,

    /// Debug logging on stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prints one badge and waits for the outcome.
    Print {
        /// HTML file to print instead of the built-in badge.
        #[arg(long)]
        markup: Option<PathBuf>,

        /// Name on the built-in badge.
        #[arg(long, default_value = "Nassim Hasbani")]
        name: String,

        /// QR payload on the built-in badge.
        #[arg(long, default_value = "38911166")]
        qr: String,

        /// Print the outcome and job report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Reads JSON requests from stdin and writes responses to stdout.
    Serve {
        /// Name on the built-in badge for requests without markup.
        #[arg(long, default_value = "Nassim Hasbani")]
        name: String,

        /// QR payload on the built-in badge for requests without markup.
        #[arg(long, default_value = "38911166")]
        qr: String,
    },

    /// Shows the effective configuration.
    Config,
}

impl Cli {
    /// Flags win over the file and the environment.
    pub fn apply_to(&self, config: &mut PrintConfig) {
        if let Some(root) = &self.work_root {
            config.work_root = root.clone();
        }
        if let Some(printer) = &self.printer {
            config.printer_program = printer.clone();
        }
        if let Some(browser) = &self.browser {
            config.browser_program = browser.clone();
        }
    }
}
