pub mod backoff;
pub mod clock;

pub use backoff::{Backoff, BackoffState};
