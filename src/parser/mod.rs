pub mod assemble;
pub mod domops;
pub mod edges;
pub mod jsmods;
pub mod value;

use thiserror::Error;

use crate::db::PostRecord;

/// Anti-JSON-hijacking literal prefixed to domops/jsmods response bodies.
const JSON_HIJACK_PREAMBLE: &str = "for (;;);";

/// Whole-response failures. Anything less than this (a missing field, a
/// malformed feed unit) is a per-record skip, never an error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response body matches no known feed shape")]
    UnrecognizedBody,
    #[error("domops payload carries no embedded html")]
    MissingHtml,
    #[error("pagination cursor not found in embedded html")]
    CursorNotFound,
    #[error("payload has no `{0}` section")]
    MissingSection(&'static str),
}

/// Why one record was dropped while the rest of the batch survived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid timestamp in `{0}`")]
    BadTimestamp(&'static str),
}

/// One dropped record: its position in the response plus the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub index: usize,
    pub reason: SkipReason,
}

/// Fully assembled output for one feed response.
pub struct ParsedPage {
    pub rows: Vec<PostRecord>,
    pub skipped: Vec<Skipped>,
    /// Maximum formatted timestamp across the batch, for progress reporting.
    pub max_time: Option<String>,
    /// Token for requesting the next page.
    pub cursor: Option<String>,
}

/// Parse one raw response body, picking the pipeline from the body itself:
/// domops/jsmods responses carry the hijack preamble, GraphQL ones do not.
pub fn parse_response(body: &str) -> Result<ParsedPage, ParseError> {
    if body.trim_start().starts_with(JSON_HIJACK_PREAMBLE) {
        assemble::from_domops_jsmods(body)
    } else {
        assemble::from_graphql(body)
    }
}

/// Strip the anti-hijacking preamble so the rest parses as plain JSON.
pub(crate) fn strip_preamble(body: &str) -> &str {
    body.trim_start()
        .strip_prefix(JSON_HIJACK_PREAMBLE)
        .unwrap_or(body)
}

/// Render epoch seconds as `YYYY-MM-DD HH:MM:SS` (UTC). Out-of-range values
/// render empty rather than panicking.
pub(crate) fn format_time(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
