//! Everstream — Order bounded context.
//!
//! Order aggregate and events, command/query handlers, and the order
//! read-model projection with its concurrent cache.

pub mod application;
pub mod domain;
pub mod projection;
