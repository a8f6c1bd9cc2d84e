//! Pipeline entry points for multi-site operations.
//!
//! - `run_refresh`: HR and inbox refresh across sites, bounded concurrency
//! - `run_index_sync`: catalogue sync across sites

pub mod circuit_breaker;
pub mod refresh;
pub mod sync;

pub use refresh::{SiteRefreshOutcome, run_refresh};
pub use sync::run_index_sync;
