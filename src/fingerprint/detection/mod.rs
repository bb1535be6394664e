//! Per-kind signature matching.
//!
//! Each submodule evaluates one rule kind against a prepared view of the
//! response: header and cookie maps, the lower-cased body, or the page's
//! generator strings.

mod body;
mod cookies;
mod headers;
mod meta;
mod utils;

pub use body::{score_body, BodyScore};
pub use cookies::check_cookies;
pub use headers::check_headers;
pub use meta::check_meta;
pub use utils::normalize_generator;
pub(crate) use utils::{extract_cookies_from_headers, extract_meta_generators, normalize_headers_to_map};
