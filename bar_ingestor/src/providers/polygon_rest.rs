//! Polygon-style aggregates endpoint (`/aggs/ticker/{symbol}/range/...`).

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{PolygonProvider, PolygonSettings};
