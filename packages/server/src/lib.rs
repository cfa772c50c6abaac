// Keyword extraction service - API layer
//
// Thin HTTP boundary over the extractor engine: submit a search, watch
// its progress over SSE, cancel it, list known jobs. All job logic lives
// in the `extractor` crate; this layer only translates HTTP to registry
// calls.

pub mod config;
pub mod routes;

pub use config::Config;
pub use routes::{router, AppState};
