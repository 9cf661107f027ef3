//! badgeprint: renders badge markup at a fixed physical label size, converts
//! it to a single-page PDF and hands it to the OS printer.

pub mod cli;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod ipc;
pub mod markup;
pub mod pdf;
pub mod process;
pub mod render;
pub mod state_machine;
pub mod store;
pub mod ui;

#[cfg(test)]
mod testing;
