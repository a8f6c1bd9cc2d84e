//! Pure decision layer: state and events in, actions out.
//!
//! - `HrPolicy`: progress, safe and risk actions from HR records
//! - `InboxPolicy`: actions from classified inbox events

mod hr;
mod inbox;

pub use hr::HrPolicy;
pub use inbox::InboxPolicy;
