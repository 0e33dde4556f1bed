//! Cache module for the APOD response
//!
//! This module provides a single-slot, read-through cache with a time-to-live.
//! Whatever the upstream fetch returns is stored, including the failure
//! sentinel, and served until it expires or is explicitly cleared. Nothing is
//! persisted across restarts.

mod clock;
mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ttl::{ApodCache, CacheSnapshot};
