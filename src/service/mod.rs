//! Account and linking services
//!
//! Services own the flows; the data layer owns the rows. Everything
//! here is a plain struct built from its dependencies, no globals.

mod account;
mod link;

pub use account::AccountService;
pub use link::{LinkOrchestrator, VerifyOutcome};
