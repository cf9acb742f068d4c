//! Network clients plugged into the aggregation engine.

pub mod google;
pub mod ics;
