mod agg;
mod result;
mod summary;

pub use agg::{Aggregator, MisuseError};
pub use result::{CheckSample, IterationOutcome, IterationResult};
pub use summary::{CheckSummary, LatencySummary, Summary};
