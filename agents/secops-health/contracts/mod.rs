//! SecOps Health Check Contracts
//!
//! Query, page and outcome types shared by the search client and the
//! validation checks.

mod outcome;
mod search;

pub use outcome::*;
pub use search::*;
