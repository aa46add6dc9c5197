//! jarvis: internal tooling for the JARVIS workspace
//!
//! Independent tools sharing one ambient stack:
//! - Health report assemblers for deployment nodes
//! - Email organizer (IMAP fetch, classification, parsing)
//! - PMO dashboard backend with filesystem sync and a Google Sheets mirror
//! - DOCX / PPTX / XLSX and CAD / mechanical file inspectors
//! - CalculiX mesh helpers

pub mod cad;
pub mod calculix;
pub mod commands;
pub mod config;
pub mod error;
pub mod health;
pub mod mail;
pub mod office;
pub mod pmo;
pub mod progress;
pub mod registry;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
