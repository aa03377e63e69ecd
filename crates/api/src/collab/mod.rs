//! Box ownership management: the business layer between the dual-protocol
//! façade and the lock table.

pub mod ownership;

pub use ownership::{LockOutcome, OwnershipManager, ReleaseOutcome};
