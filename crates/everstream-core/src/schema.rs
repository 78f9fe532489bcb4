//! Event schema registry.
//!
//! The registry maps event type tags to their highest known schema version.
//! It is an explicitly constructed instance populated once at startup for
//! every known event type, then consulted on every append to reject unknown
//! or stale-shaped events.

use std::collections::HashMap;

use crate::error::Error;
use crate::event::DomainEvent;

/// Suffix every concrete event struct name must carry; the type tag is the
/// name with this suffix stripped.
const EVENT_SUFFIX: &str = "Event";

/// Compile-time description of one concrete event type.
#[derive(Debug, Clone, Copy)]
pub struct EventTypeDescriptor {
    /// The event struct name, e.g. `OrderCreatedEvent`.
    pub struct_name: &'static str,
    /// The schema version the type declares for its current shape.
    pub schema_version: i32,
}

/// Registry of current schema versions per event type tag.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    current_versions: HashMap<String, i32>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event type, recording the maximum of the declared
    /// version and any previously registered version for its tag. The
    /// registry never silently downgrades; registering an older version
    /// after a newer one logs a warning and keeps the newer version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the struct name does not follow the
    /// `*Event` naming convention or the declared version is not positive.
    pub fn register_event_type(&mut self, descriptor: &EventTypeDescriptor) -> Result<(), Error> {
        if descriptor.schema_version < 1 {
            return Err(Error::Schema(format!(
                "event type {} must declare a positive schema version, got {}",
                descriptor.struct_name, descriptor.schema_version
            )));
        }

        let event_type = derive_event_type(descriptor.struct_name)?;

        match self.current_versions.get(event_type) {
            Some(&current) if current > descriptor.schema_version => {
                tracing::warn!(
                    event_type,
                    registered = descriptor.schema_version,
                    current,
                    "registering older schema version for event type; keeping current"
                );
            }
            _ => {
                self.current_versions
                    .insert(event_type.to_owned(), descriptor.schema_version);
            }
        }

        tracing::info!(
            event_type,
            schema_version = descriptor.schema_version,
            "registered event type"
        );
        Ok(())
    }

    /// Validates an event instance against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the event's reported type tag does not
    /// match the tag derived from its struct name, if its type is unknown
    /// to the registry, or if its declared schema version is older than the
    /// registry's current version for that tag (which would write a
    /// stale-shaped event once a newer shape is in use).
    pub fn validate_event<E: DomainEvent>(&self, event: &E) -> Result<(), Error> {
        let expected_type = derive_event_type(event.struct_name())?;
        let actual_type = event.event_type();

        if expected_type != actual_type {
            return Err(Error::Schema(format!(
                "event type mismatch: expected '{expected_type}' but got '{actual_type}' for {}",
                event.struct_name()
            )));
        }

        let Some(&current) = self.current_versions.get(actual_type) else {
            return Err(Error::Schema(format!("unknown event type: {actual_type}")));
        };

        if event.schema_version() < current {
            return Err(Error::Schema(format!(
                "event {actual_type} version {} is older than current version {current}",
                event.schema_version()
            )));
        }

        Ok(())
    }

    /// Returns the registry's current schema version for `event_type`, if
    /// registered.
    #[must_use]
    pub fn current_version(&self, event_type: &str) -> Option<i32> {
        self.current_versions.get(event_type).copied()
    }
}

/// Derives the canonical type tag from an event struct name.
fn derive_event_type(struct_name: &str) -> Result<&str, Error> {
    let tag = struct_name.strip_suffix(EVENT_SUFFIX).ok_or_else(|| {
        Error::Schema(format!(
            "event struct name must end with '{EVENT_SUFFIX}': {struct_name}"
        ))
    })?;
    if tag.is_empty() {
        return Err(Error::Schema(format!(
            "event struct name must not be '{EVENT_SUFFIX}' alone: {struct_name}"
        )));
    }
    Ok(tag)
}
