#![forbid(unsafe_code)]

//! # quadrant-oracle
//!
//! Structured answers from a text-completion oracle for two-axis quadrant
//! maps: where an item sits, what it is, and which real competitor would fill
//! the emptiest quadrant.
//!
//! Every operation is one prompt, one oracle call, one extraction and one
//! sanitation. The model's answer is untrusted text; the pipeline recovers a
//! JSON object from it, validates the coordinates, clamps them into
//! `[0, 100]` and backfills everything else, so callers always get a
//! well-formed [`StructuredResult`] or a typed [`QuadrantError`].

pub mod coords;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod map;
pub mod occupancy;
pub mod pipeline;
pub mod prompts;
pub mod sanitize;

pub use coords::{clamp, quadrant_of, Quadrant, Viewport};
pub use error::QuadrantError;
pub use extract::{extract_structured, ExtractionError};
pub use gateway::{Attribution, ChatGateway, OracleError, OracleGateway, UsageSink};
pub use map::{Axis, Item, MapError, QuadrantMap};
pub use occupancy::{analyze, Occupancy, QuadrantCounts};
pub use pipeline::{
    enrich_item, estimate_position, refresh_all, suggest_competitor, EnrichRequest,
    PipelineConfig, RefreshOutcome, RefreshReport,
};
pub use prompts::{build_prompt, Intent, IntentKind, Peer, PromptInstance};
pub use sanitize::{sanitize, StructuredResult};
