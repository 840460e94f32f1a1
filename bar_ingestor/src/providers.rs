//! Provider abstraction for paginated bar sources.
//!
//! [`BarSource`] is the single seam the pipeline fetches through: one
//! [`FetchWindow`] in, every raw record for it out (or a typed [`FetchError`]).
//! The concrete Polygon-style implementation lives in [`polygon_rest`].
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use bar_ingestor::models::{bar::RawBarRecord, window::FetchWindow};
//! use bar_ingestor::providers::{BarSource, errors::FetchError};
//! use tokio_util::sync::CancellationToken;
//!
//! struct NoBars;
//!
//! #[async_trait]
//! impl BarSource for NoBars {
//!     async fn fetch(
//!         &self,
//!         _window: &FetchWindow,
//!         _cancel: &CancellationToken,
//!     ) -> Result<Vec<RawBarRecord>, FetchError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod errors;
pub mod polygon_rest;
pub mod transport;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};
use tokio_util::sync::CancellationToken;

use crate::models::{bar::RawBarRecord, window::FetchWindow};
use crate::providers::errors::FetchError;

/// Fetches every raw bar of one window, following pagination to the end.
///
/// Implementations hold no per-window state, so one instance can serve many
/// windows concurrently.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Returns all records in provider order.
    ///
    /// * `Err(FetchError::Partial)` - a page kept failing retryably; the records
    ///   from the earlier pages ride along in the error.
    /// * `Err(FetchError::Terminal)` - non-retryable failure, nothing is kept.
    /// * `Err(FetchError::Cancelled)` - `cancel` fired mid-fetch.
    async fn fetch(
        &self,
        window: &FetchWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawBarRecord>, FetchError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Base URL is not an absolute http(s) URL.
    #[snafu(display("Invalid base URL: {url}"))]
    InvalidBaseUrl { url: String, backtrace: Backtrace },
}
