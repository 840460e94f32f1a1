use crate::models::window::FetchWindow;
use crate::providers::transport::PageRequest;

/// Path of the first page for `window`, relative to `base_url`
/// (e.g. `https://api.polygon.io/v2`).
pub fn aggregates_url(base_url: &str, window: &FetchWindow) -> String {
    format!(
        "{}/aggs/ticker/{}/range/{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        window.symbol(),
        window.multiplier(),
        window.granularity().as_str(),
        window.start().format("%Y-%m-%d"),
        window.end().format("%Y-%m-%d"),
    )
}

/// Query parameters of the first page. Continuation URLs carry their own.
pub fn construct_params(window: &FetchWindow, page_limit: u32) -> Vec<(String, String)> {
    vec![
        ("adjusted".to_string(), window.adjusted().to_string()),
        ("sort".to_string(), window.sort().as_str().to_string()),
        ("limit".to_string(), page_limit.to_string()),
    ]
}

pub fn first_page_request(base_url: &str, window: &FetchWindow, page_limit: u32) -> PageRequest {
    PageRequest {
        url: aggregates_url(base_url, window),
        query: construct_params(window, page_limit),
    }
}
