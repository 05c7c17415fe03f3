//! ITeratOr
//!
//! Forensic logical acquisition of WearOS smartwatches over ADB. Every
//! pulled file is hashed on the device and again on the examiner host, and
//! the two sides are compared before the copy is reported as verified.

pub mod actions;
pub mod cancel;
pub mod cli;
pub mod compress;
pub mod config;
pub mod digest;
pub mod errors;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod report;
pub mod selection;
pub mod session;
pub mod transport;
pub mod ui;

pub use errors::{AcqError, AcqResult};
pub use pipeline::{ExtractionPipeline, PipelineOptions};
