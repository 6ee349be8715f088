//! Built-in capability handlers.
//!
//! Types declared in the config file are served by the handlers here, so the
//! binary works without custom importer or exporter code.

mod configured;

pub use configured::{ConfiguredExporter, ConfiguredImporter};
