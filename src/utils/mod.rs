//! Small helpers shared across the crate.
//!
//! - [`path`]: slash-separated path algebra for URLs and node paths
//! - [`hash`]: content hashes used for download names and unique tokens

pub mod hash;
pub mod path;

/// Return "s" suffix for plural counts
///
/// # Examples
///
/// - `plural_s(0)` -> `"s"` (0 nodes)
/// - `plural_s(1)` -> `""` (1 node)
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Format count with noun, e.g. `3 documents`.
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", plural_s(count))
}
