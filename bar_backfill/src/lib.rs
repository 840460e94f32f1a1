//! Backfills historical bars for a symbol universe into the bar store.
//!
//! [`batch::BatchRunner`] drives one [`pipeline::SymbolPipeline`] per symbol
//! and rolls the outcomes up into a [`report::RunReport`].

pub mod batch;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod universe;
