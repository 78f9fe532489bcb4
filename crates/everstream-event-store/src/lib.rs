//! Everstream Event Store — PostgreSQL implementations of the durable
//! append-only log and the durable snapshot store.

pub mod pg_event_log;
pub mod pg_snapshot_repository;
pub mod schema;
