//! Schema definition and idempotent migrations

use rusqlite::Connection;

use crate::StoreError;

/// Migration statements, applied in order on every startup. Statements
/// deliberately omit `IF NOT EXISTS`: re-runs surface "already exists"
/// errors, which are swallowed below, and anything else is logged without
/// aborting startup.
pub const MIGRATIONS: &[&str] = &[
    "CREATE TABLE nodes (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        node_type TEXT NOT NULL,
        language TEXT NOT NULL,
        file_path TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        start_col INTEGER NOT NULL,
        end_col INTEGER NOT NULL,
        content TEXT NOT NULL,
        signature TEXT,
        doc_comment TEXT NOT NULL DEFAULT '',
        annotations TEXT NOT NULL DEFAULT '{}',
        embedding BLOB,
        complexity REAL
    )",
    "CREATE TABLE edges (
        id TEXT PRIMARY KEY,
        from_id TEXT NOT NULL,
        to_id TEXT NOT NULL,
        edge_type TEXT NOT NULL,
        weight REAL NOT NULL DEFAULT 1.0
    )",
    "CREATE TABLE file_metadata (
        file_path TEXT PRIMARY KEY,
        content_hash TEXT NOT NULL,
        mod_time INTEGER NOT NULL,
        indexed_at TEXT NOT NULL,
        node_count INTEGER NOT NULL,
        edge_count INTEGER NOT NULL,
        file_size INTEGER NOT NULL,
        language TEXT NOT NULL
    )",
    "CREATE INDEX idx_nodes_file_path ON nodes(file_path)",
    "CREATE INDEX idx_nodes_name ON nodes(name)",
    "CREATE INDEX idx_nodes_node_type ON nodes(node_type)",
    "CREATE INDEX idx_edges_from ON edges(from_id)",
    "CREATE INDEX idx_edges_to ON edges(to_id)",
    "CREATE INDEX idx_edges_type ON edges(edge_type)",
    "CREATE INDEX idx_edges_from_type ON edges(from_id, edge_type)",
    "CREATE INDEX idx_edges_to_type ON edges(to_id, edge_type)",
];

fn is_benign(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("already exists")
        || message.contains("already defined")
        || message.contains("duplicate")
}

/// Apply all migrations. Benign re-run errors are swallowed; others are
/// logged as warnings and startup continues.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    for statement in MIGRATIONS {
        match conn.execute_batch(statement) {
            Ok(()) => {}
            Err(e) if is_benign(&e.to_string()) => {
                tracing::debug!("migration already applied: {}", e);
            }
            Err(e) => {
                tracing::warn!("migration failed (continuing): {}", e);
            }
        }
    }
    Ok(())
}
