//! Detail extraction
//!
//! Fetches one detail page per frontier item and parses it into a
//! [`DetailRecord`](crate::model::DetailRecord).

mod engine;
mod parser;
mod text;

pub use engine::{extract_item, run_extraction, ExtractionOptions, ExtractionResult, ItemOutcome};
pub use parser::{
    extract_detail_record, parse_channel_installs, parse_detail_page, ExtractError,
    ParsedDetail, RecordContext,
};
pub use text::{parse_compact_number, parse_first_seen_date};
