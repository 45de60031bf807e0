//! SQL schema for the ratchet SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Written by the execution pipeline; the learning core only reads it.
CREATE TABLE IF NOT EXISTS tool_executions (
    id                TEXT PRIMARY KEY,
    tool_name         TEXT NOT NULL,
    parameters        TEXT NOT NULL DEFAULT '{}',   -- JSON object
    result            TEXT,                          -- JSON or NULL
    success           INTEGER NOT NULL DEFAULT 0,
    error_message     TEXT,
    execution_time_ms INTEGER,
    session_id        TEXT,
    created_at        TEXT NOT NULL,
    completed_at      TEXT
);

CREATE TABLE IF NOT EXISTS learned_patterns (
    id                TEXT PRIMARY KEY,
    pattern_signature TEXT NOT NULL UNIQUE,
    pattern_type      TEXT NOT NULL,   -- 'sequence' | 'parameter'
    pattern_data      TEXT NOT NULL,   -- JSON PatternBody
    occurrences       INTEGER NOT NULL DEFAULT 1 CHECK (occurrences >= 1),
    confidence        REAL NOT NULL DEFAULT 0 CHECK (confidence BETWEEN 0 AND 1),
    tool_suggestion   TEXT,            -- JSON Suggestion
    tool_id           TEXT REFERENCES generated_tools(id),
    auto_created      INTEGER NOT NULL DEFAULT 0,
    first_seen        TEXT NOT NULL,
    last_seen         TEXT NOT NULL
);

-- Artifacts are deactivated, never deleted.
CREATE TABLE IF NOT EXISTS generated_tools (
    id                TEXT PRIMARY KEY,
    tool_name         TEXT NOT NULL UNIQUE,
    category          TEXT NOT NULL,
    source_pattern_id TEXT,
    code_content      TEXT NOT NULL,   -- JSON ArtifactTemplate
    config            TEXT NOT NULL DEFAULT '{}',
    is_active         INTEGER NOT NULL DEFAULT 1,
    usage_count       INTEGER NOT NULL DEFAULT 0,
    success_count     INTEGER NOT NULL DEFAULT 0,
    last_used_at      TEXT,
    created_at        TEXT NOT NULL
);

-- Rules are deactivated, never deleted. `scope` only widens.
CREATE TABLE IF NOT EXISTS validation_rules (
    rule_id             TEXT PRIMARY KEY,
    scope               TEXT NOT NULL,   -- 'project' | 'client' | 'organization' | 'global'
    category            TEXT NOT NULL,
    priority            TEXT NOT NULL DEFAULT 'medium',
    technology          TEXT,
    pattern             TEXT NOT NULL,
    message             TEXT NOT NULL,
    suggestion          TEXT,
    auto_fix            TEXT,
    client_name         TEXT,
    project_path        TEXT,
    confidence          REAL NOT NULL DEFAULT 0.5,
    effectiveness_score REAL NOT NULL DEFAULT 0,
    is_active           INTEGER NOT NULL DEFAULT 1,
    learned_from        TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    scope_changed_at    TEXT NOT NULL
);

-- Strictly append-only evidence.
CREATE TABLE IF NOT EXISTS rule_applications (
    id                TEXT PRIMARY KEY,
    rule_id           TEXT NOT NULL REFERENCES validation_rules(rule_id),
    project_path      TEXT,
    client_name       TEXT,
    file_path         TEXT,
    line_number       INTEGER,
    success           INTEGER NOT NULL,
    false_positive    INTEGER NOT NULL DEFAULT 0,
    fix_applied       INTEGER NOT NULL DEFAULT 0,
    execution_time_ms INTEGER,
    feedback          TEXT,
    context           TEXT,
    applied_at        TEXT NOT NULL
);

-- Applications whose feedback the propagation cycle has already learned from.
CREATE TABLE IF NOT EXISTS feedback_consumptions (
    application_id TEXT PRIMARY KEY REFERENCES rule_applications(id),
    processed_at   TEXT NOT NULL
);

-- Append-only audit trail.
CREATE TABLE IF NOT EXISTS knowledge_entries (
    id         TEXT PRIMARY KEY,
    entry_type TEXT NOT NULL,   -- 'rule_promotion' | 'system_activity' | 'error' | 'documentation'
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,   -- JSON payload
    tags       TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

-- One row per named cycle; ownership changes by conditional UPDATE only.
CREATE TABLE IF NOT EXISTS cycle_leases (
    name       TEXT PRIMARY KEY,
    holder     TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS executions_created_idx   ON tool_executions(created_at);
CREATE INDEX IF NOT EXISTS patterns_type_idx        ON learned_patterns(pattern_type);
CREATE INDEX IF NOT EXISTS rules_scope_idx          ON validation_rules(scope, is_active);
CREATE INDEX IF NOT EXISTS applications_rule_idx    ON rule_applications(rule_id, applied_at);
CREATE INDEX IF NOT EXISTS applications_applied_idx ON rule_applications(applied_at);
CREATE INDEX IF NOT EXISTS knowledge_type_idx       ON knowledge_entries(entry_type, created_at);

PRAGMA user_version = 1;
";
