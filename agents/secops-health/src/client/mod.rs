//! Google SecOps search client
//!
//! Layers, leaves first: an authenticated [`HttpSession`], the rate-limit
//! aware [`QueryExecutor`], the page [`collect_pages`] loop and the typed
//! [`SecOpsClient`] search facades.

mod executor;
mod pagination;
mod params;
mod search;
mod session;

pub use executor::*;
pub use pagination::*;
pub use params::*;
pub use search::*;
pub use session::*;

#[cfg(test)]
pub(crate) mod fakes;
