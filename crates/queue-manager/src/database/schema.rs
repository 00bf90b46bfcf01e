//! Table definitions. Applied idempotently at startup.

pub(crate) const QUEUE_QUEUES: &str = r#"
CREATE TABLE IF NOT EXISTS queue_queues (
    id                      TEXT PRIMARY KEY,
    customer_id             TEXT NOT NULL,

    name                    TEXT NOT NULL DEFAULT '',
    detail                  TEXT NOT NULL DEFAULT '',

    routing_method          TEXT NOT NULL DEFAULT '',
    tag_ids                 TEXT NOT NULL DEFAULT '[]',

    execute                 TEXT NOT NULL DEFAULT 'stop',

    wait_flow_id            TEXT NOT NULL,
    wait_timeout            INTEGER NOT NULL DEFAULT 0,
    service_timeout         INTEGER NOT NULL DEFAULT 0,

    wait_queuecall_ids      TEXT NOT NULL DEFAULT '[]',
    service_queuecall_ids   TEXT NOT NULL DEFAULT '[]',

    total_incoming_count    INTEGER NOT NULL DEFAULT 0,
    total_serviced_count    INTEGER NOT NULL DEFAULT 0,
    total_abandoned_count   INTEGER NOT NULL DEFAULT 0,

    tm_create               TEXT NOT NULL,
    tm_update               TEXT NOT NULL,
    tm_delete               TEXT NOT NULL
)
"#;

pub(crate) const QUEUE_QUEUECALLS: &str = r#"
CREATE TABLE IF NOT EXISTS queue_queuecalls (
    id                      TEXT PRIMARY KEY,
    customer_id             TEXT NOT NULL,
    queue_id                TEXT NOT NULL,

    reference_type          TEXT NOT NULL,
    reference_id            TEXT NOT NULL,
    reference_activeflow_id TEXT NOT NULL,

    forward_action_id       TEXT NOT NULL,
    exit_action_id          TEXT NOT NULL,
    confbridge_id           TEXT NOT NULL,

    source                  TEXT NOT NULL DEFAULT '{}',
    routing_method          TEXT NOT NULL DEFAULT '',
    tag_ids                 TEXT NOT NULL DEFAULT '[]',

    status                  TEXT NOT NULL,
    service_agent_id        TEXT NOT NULL,

    timeout_wait            INTEGER NOT NULL DEFAULT 0,
    timeout_service         INTEGER NOT NULL DEFAULT 0,

    duration_waiting        INTEGER NOT NULL DEFAULT 0,
    duration_service        INTEGER NOT NULL DEFAULT 0,

    tm_create               TEXT NOT NULL,
    tm_service              TEXT NOT NULL,
    tm_update               TEXT NOT NULL,
    tm_end                  TEXT NOT NULL,
    tm_delete               TEXT NOT NULL
)
"#;

pub(crate) const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_queue_queues_customer_id ON queue_queues(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_queue_queues_tm_create ON queue_queues(tm_create)",
    "CREATE INDEX IF NOT EXISTS idx_queue_queuecalls_customer_id ON queue_queuecalls(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_queue_queuecalls_reference_id ON queue_queuecalls(reference_id)",
    "CREATE INDEX IF NOT EXISTS idx_queue_queuecalls_queue_status ON queue_queuecalls(queue_id, status, tm_create)",
];
