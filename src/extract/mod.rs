//! HTML extraction for listing pages and article detail pages.
//!
//! Both extractors are total: malformed markup produces an empty result
//! instead of an error, so a page that changed shape degrades one source or
//! one article rather than the run.

pub mod detail;
pub mod listing;

pub use detail::{DetailFields, extract_details};
pub use listing::extract_candidates;
