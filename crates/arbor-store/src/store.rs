//! SQLite-backed graph store

use std::path::Path;

use arbor_core::{CodeEdge, CodeNode, EdgeType, FileMetadata};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::StoreError;
use crate::locks::FileLockMap;
use crate::schema;

/// Rows written per cancellation check in batch operations.
const BATCH_CHUNK: usize = 200;

pub struct GraphStore {
    conn: Mutex<Connection>,
    locks: FileLockMap,
}

impl GraphStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(GraphStore {
            conn: Mutex::new(conn),
            locks: FileLockMap::new(),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(GraphStore {
            conn: Mutex::new(Connection::open_in_memory()?),
            locks: FileLockMap::new(),
        })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        schema::run_migrations(&conn)
    }

    /// Drop the connection. Outstanding per-file guards keep their locks
    /// until dropped.
    pub fn close(self) {}

    // ── Node operations ─────────────────────────────────────

    pub async fn upsert_node(&self, node: &CodeNode) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        insert_node(&conn, node)
    }

    pub async fn upsert_nodes_batch(
        &self,
        cancel: &CancellationToken,
        nodes: &[CodeNode],
    ) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for chunk in nodes.chunks(BATCH_CHUNK) {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            for node in chunk {
                insert_node(&tx, node)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<CodeNode>, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"),
            params![id],
            node_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub async fn get_all_nodes(&self) -> Result<Vec<CodeNode>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {NODE_COLUMNS} FROM nodes"))?;
        let rows = stmt.query_map([], node_from_row)?;
        collect_rows(rows)
    }

    /// Substring match on node names.
    pub async fn find_by_name(&self, fragment: &str) -> Result<Vec<CodeNode>, StoreError> {
        let conn = self.conn.lock().await;
        let pattern = format!("%{}%", escape_like(fragment));
        let mut stmt = conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name"
        ))?;
        let rows = stmt.query_map(params![pattern], node_from_row)?;
        collect_rows(rows)
    }

    pub async fn get_nodes_by_file(&self, file_path: &str) -> Result<Vec<CodeNode>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE file_path = ?1 ORDER BY start_line"
        ))?;
        let rows = stmt.query_map(params![file_path], node_from_row)?;
        collect_rows(rows)
    }

    pub async fn node_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        Ok(conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get::<_, i64>(0))? as u64)
    }

    // ── Edge operations ─────────────────────────────────────

    pub async fn upsert_edge(&self, edge: &CodeEdge) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        insert_edge(&conn, edge)
    }

    pub async fn upsert_edges_batch(
        &self,
        cancel: &CancellationToken,
        edges: &[CodeEdge],
    ) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for chunk in edges.chunks(BATCH_CHUNK) {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            for edge in chunk {
                insert_edge(&tx, edge)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn get_all_edges(&self) -> Result<Vec<CodeEdge>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {EDGE_COLUMNS} FROM edges"))?;
        let rows = stmt.query_map([], edge_from_row)?;
        collect_rows(rows)
    }

    pub async fn get_edges_by_type(&self, edge_type: EdgeType) -> Result<Vec<CodeEdge>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE edge_type = ?1"
        ))?;
        let rows = stmt.query_map(params![edge_type.as_str()], edge_from_row)?;
        collect_rows(rows)
    }

    pub async fn get_incoming_edges(&self, node_id: &str) -> Result<Vec<CodeEdge>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE to_id = ?1"
        ))?;
        let rows = stmt.query_map(params![node_id], edge_from_row)?;
        collect_rows(rows)
    }

    pub async fn get_outgoing_edges(&self, node_id: &str) -> Result<Vec<CodeEdge>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE from_id = ?1"
        ))?;
        let rows = stmt.query_map(params![node_id], edge_from_row)?;
        collect_rows(rows)
    }

    pub async fn edge_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        Ok(conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get::<_, i64>(0))? as u64)
    }

    // ── Atomic file replacement ─────────────────────────────

    /// Replace everything belonging to `file_path` in one transaction:
    /// delete edges touching the file's current nodes, delete the nodes,
    /// then upsert the new rows. With both lists empty the file's metadata
    /// row is deleted too (full file removal). The per-file lock is held
    /// end to end; metadata for non-empty updates is written by the caller
    /// after a successful commit so a failed transaction cannot leave
    /// metadata ahead of graph contents.
    pub async fn update_file_atomic(
        &self,
        file_path: &str,
        nodes: &[CodeNode],
        edges: &[CodeEdge],
    ) -> Result<(), StoreError> {
        let _file_guard = self.locks.lock(file_path).await;
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM edges WHERE from_id IN (SELECT id FROM nodes WHERE file_path = ?1)
                OR to_id IN (SELECT id FROM nodes WHERE file_path = ?1)",
            params![file_path],
        )?;
        tx.execute("DELETE FROM nodes WHERE file_path = ?1", params![file_path])?;
        for node in nodes {
            insert_node(&tx, node)?;
        }
        for edge in edges {
            insert_edge(&tx, edge)?;
        }
        if nodes.is_empty() && edges.is_empty() {
            tx.execute(
                "DELETE FROM file_metadata WHERE file_path = ?1",
                params![file_path],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ── File metadata ───────────────────────────────────────

    pub async fn upsert_file_metadata(&self, meta: &FileMetadata) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO file_metadata
                (file_path, content_hash, mod_time, indexed_at, node_count, edge_count, file_size, language)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                meta.file_path,
                meta.content_hash,
                meta.mod_time,
                meta.indexed_at.to_rfc3339(),
                meta.node_count,
                meta.edge_count,
                meta.file_size as i64,
                meta.language,
            ],
        )?;
        Ok(())
    }

    pub async fn get_file_metadata(
        &self,
        file_path: &str,
    ) -> Result<Option<FileMetadata>, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {META_COLUMNS} FROM file_metadata WHERE file_path = ?1"),
            params![file_path],
            meta_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub async fn get_all_file_metadata(&self) -> Result<Vec<FileMetadata>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {META_COLUMNS} FROM file_metadata"))?;
        let rows = stmt.query_map([], meta_from_row)?;
        collect_rows(rows)
    }

    pub async fn delete_file_metadata(&self, file_path: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM file_metadata WHERE file_path = ?1",
            params![file_path],
        )?;
        Ok(())
    }

    pub(crate) async fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().await;
        f(&conn)
    }
}

// ── Row mapping ─────────────────────────────────────────────

pub(crate) const NODE_COLUMNS: &str = "id, name, node_type, language, file_path, start_line, \
     end_line, start_col, end_col, content, signature, doc_comment, annotations, embedding, complexity";

pub(crate) const EDGE_COLUMNS: &str = "id, from_id, to_id, edge_type, weight";

const META_COLUMNS: &str = "file_path, content_hash, mod_time, indexed_at, node_count, \
     edge_count, file_size, language";

fn insert_node(conn: &Connection, node: &CodeNode) -> Result<(), StoreError> {
    let annotations = serde_json::to_string(&node.annotations)
        .map_err(|e| StoreError::Encode(e.to_string()))?;
    let embedding = match &node.embedding {
        Some(vector) => {
            Some(bincode::serialize(vector).map_err(|e| StoreError::Encode(e.to_string()))?)
        }
        None => None,
    };
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO nodes ({NODE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            node.id,
            node.name,
            node.node_type.as_str(),
            node.language,
            node.file_path,
            node.start_line,
            node.end_line,
            node.start_col,
            node.end_col,
            node.content,
            node.signature,
            node.doc_comment,
            annotations,
            embedding,
            node.complexity,
        ],
    )?;
    Ok(())
}

fn insert_edge(conn: &Connection, edge: &CodeEdge) -> Result<(), StoreError> {
    conn.execute(
        &format!("INSERT OR REPLACE INTO edges ({EDGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        params![
            edge.id,
            edge.from_id,
            edge.to_id,
            edge.edge_type.as_str(),
            edge.weight,
        ],
    )?;
    Ok(())
}

fn invalid<E: std::fmt::Display>(index: usize, message: E) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.to_string(),
        )),
    )
}

pub(crate) fn node_from_row(row: &Row<'_>) -> Result<CodeNode, rusqlite::Error> {
    let node_type: String = row.get(2)?;
    let annotations: String = row.get(12)?;
    let embedding: Option<Vec<u8>> = row.get(13)?;
    Ok(CodeNode {
        id: row.get(0)?,
        name: row.get(1)?,
        node_type: node_type.parse().map_err(|e| invalid(2, e))?,
        language: row.get(3)?,
        file_path: row.get(4)?,
        start_line: row.get(5)?,
        end_line: row.get(6)?,
        start_col: row.get(7)?,
        end_col: row.get(8)?,
        content: row.get(9)?,
        signature: row.get(10)?,
        doc_comment: row.get(11)?,
        annotations: serde_json::from_str(&annotations).map_err(|e| invalid(12, e))?,
        embedding: embedding
            .map(|blob| bincode::deserialize(&blob).map_err(|e| invalid(13, e)))
            .transpose()?,
        complexity: row.get(14)?,
    })
}

pub(crate) fn edge_from_row(row: &Row<'_>) -> Result<CodeEdge, rusqlite::Error> {
    let edge_type: String = row.get(3)?;
    Ok(CodeEdge {
        id: row.get(0)?,
        from_id: row.get(1)?,
        to_id: row.get(2)?,
        edge_type: edge_type.parse().map_err(|e| invalid(3, e))?,
        weight: row.get(4)?,
    })
}

fn meta_from_row(row: &Row<'_>) -> Result<FileMetadata, rusqlite::Error> {
    let indexed_at: String = row.get(3)?;
    Ok(FileMetadata {
        file_path: row.get(0)?,
        content_hash: row.get(1)?,
        mod_time: row.get(2)?,
        indexed_at: DateTime::parse_from_rfc3339(&indexed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| invalid(3, e))?,
        node_count: row.get(4)?,
        edge_count: row.get(5)?,
        file_size: row.get::<_, i64>(6)? as u64,
        language: row.get(7)?,
    })
}

pub(crate) fn collect_rows<T>(
    rows: impl Iterator<Item = Result<T, rusqlite::Error>>,
) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
