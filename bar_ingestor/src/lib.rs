//! Fetching and normalizing historical price bars.
//!
//! * [`providers`] follows a provider's pagination for one window and hands
//!   back raw records.
//! * [`normalize`] turns those records into [`models::bar::CanonicalBar`]s.

pub mod models;
pub mod normalize;
pub mod providers;
pub mod retry;
