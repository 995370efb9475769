//! In-memory reductions over small query results: attendance statistics,
//! weekly timetables and marks analytics.

pub mod attendance;
pub mod marks;
pub mod schedule;
