//! Event store database schema.

/// SQL to create the events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    event_id        UUID PRIMARY KEY,
    stream_id       UUID NOT NULL,
    event_type      VARCHAR(255) NOT NULL,
    payload         JSONB NOT NULL,
    version         BIGINT NOT NULL,
    schema_version  INT NOT NULL,
    correlation_id  UUID NOT NULL,
    causation_id    UUID,
    occurred_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (stream_id, version)
);

CREATE INDEX IF NOT EXISTS idx_events_stream_id
    ON events (stream_id, version);

CREATE INDEX IF NOT EXISTS idx_events_global_order
    ON events (occurred_at, version);

CREATE INDEX IF NOT EXISTS idx_events_correlation_id
    ON events (correlation_id);
";

/// SQL to create the snapshots table. At most one row exists per
/// (aggregate id, aggregate type).
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    aggregate_id    UUID NOT NULL,
    aggregate_type  VARCHAR(255) NOT NULL,
    version         BIGINT NOT NULL,
    state           JSONB NOT NULL,
    taken_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (aggregate_id, aggregate_type)
);
";
