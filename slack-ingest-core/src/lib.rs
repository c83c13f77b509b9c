#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod filter;
pub mod gate;
pub mod intake;
pub mod processors;
pub mod sink;
pub mod state;
pub mod store;
pub mod utils;
pub mod verifier;
