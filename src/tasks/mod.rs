//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is open.
//!
//! # Tasks
//! - Expiry sweeper: deletes expired entries at the configured check frequency

mod sweeper;

pub use sweeper::SweeperState;
pub(crate) use sweeper::{spawn_sweeper, SweeperHandle, SweeperStatus};
