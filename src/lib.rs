pub mod classify;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod sanitize;
pub mod sector;

pub use classify::StackPolicy;
pub use pipeline::{run, CanonicalPosting, RunSummary};
pub use sector::Sector;
