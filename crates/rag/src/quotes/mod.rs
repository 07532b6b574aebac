//! Quote verification: extract quoted spans from an answer, look them up in
//! the retrieved sources, and splice out the ones that cannot be found.

pub mod extract;
pub mod matcher;
pub mod sanitize;
pub mod verify;

pub use extract::{extract_quote_spans, extract_quotes, Quote, QuoteDelimiter};
pub use matcher::{find_quote_in_source, normalize_text, similarity, DEFAULT_MATCH_THRESHOLD};
pub use sanitize::{
    remove_unverified_quotes, sanitize_spans, UNVERIFIED_DISCLAIMER, UNVERIFIED_SENTINEL,
};
pub use verify::verify_quotes_in_response;
