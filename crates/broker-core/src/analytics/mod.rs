//! # Sales Analytics
//!
//! ```text
//!   orders (snapshot) ──► filter ──► selected ──┬──► scorecard
//!                           ▲                   ├──► time buckets
//!                           │                   ├──► rankings
//!                 SchemaCapabilities            └──► state distribution
//! ```

pub mod filter;
pub mod format;
pub mod query;

pub use filter::{DateField, DateRange, OrderFilter, ResolvedFilter};
pub use format::{format_compact, format_money_compact};
pub use query::{
    month_label, run_query, Aggregate, Projection, QueryEngine, RankingDimension, RankingEntry,
    Scorecard, Segment, StateBucket, Tally, TimeBucket, UNASSIGNED,
};
