//! Query primitives: similarity search, dependency expansion, call tracing

use std::collections::{HashMap, HashSet, VecDeque};

use arbor_core::{CodeEdge, CodeNode};
use rusqlite::{Connection, OptionalExtension, params};
use tokio_util::sync::CancellationToken;

use crate::StoreError;
use crate::store::{EDGE_COLUMNS, GraphStore, NODE_COLUMNS, collect_rows, edge_from_row, node_from_row};

/// Upper bound on candidate rows fetched for similarity scoring.
const SEARCH_FETCH_CAP: usize = 10_000;
/// Result limit clamp.
const SEARCH_LIMIT_MIN: usize = 1;
const SEARCH_LIMIT_MAX: usize = 1_000;
const SEARCH_LIMIT_DEFAULT: usize = 10;
/// BFS bounds.
const DEFAULT_DEPENDENCY_DEPTH: u32 = 3;
const CALL_CHAIN_MAX_DEPTH: usize = 15;
/// SQLite host-parameter headroom for IN clauses.
const IN_CHUNK: usize = 500;

/// A similarity hit.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: CodeNode,
    pub score: f32,
}

impl GraphStore {
    /// Cosine-similarity search over stored embeddings. Vectors whose
    /// dimension differs from the query (or is zero) are skipped rather
    /// than treated as errors; only strictly positive scores are returned.
    pub async fn semantic_search(
        &self,
        cancel: &CancellationToken,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredNode>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = if limit == 0 {
            SEARCH_LIMIT_DEFAULT
        } else {
            limit.clamp(SEARCH_LIMIT_MIN, SEARCH_LIMIT_MAX)
        };

        let candidates = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM nodes WHERE embedding IS NOT NULL LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![SEARCH_FETCH_CAP as i64], node_from_row)?;
                collect_rows(rows)
            })
            .await?;

        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut scored: Vec<ScoredNode> = candidates
            .into_iter()
            .filter_map(|node| {
                let embedding = node.embedding.as_deref()?;
                if embedding.len() != query.len() || embedding.is_empty() {
                    return None;
                }
                let score = cosine_similarity(query, embedding)?;
                Some(ScoredNode { node, score })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.retain(|s| s.score > 0.0);
        scored.truncate(limit);
        Ok(scored)
    }

    /// BFS over outgoing edges of any type, `depth` levels (default 3).
    /// Returns every discovered node except the root.
    pub async fn get_transitive_dependencies(
        &self,
        cancel: &CancellationToken,
        node_id: &str,
        depth: i32,
    ) -> Result<Vec<CodeNode>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let depth = if depth <= 0 {
            DEFAULT_DEPENDENCY_DEPTH
        } else {
            depth as u32
        };

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(node_id.to_string());
        let mut frontier = vec![node_id.to_string()];
        let mut discovered = Vec::new();

        for _ in 0..depth {
            if frontier.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            let targets = self
                .with_conn(|conn| outgoing_targets(conn, &frontier))
                .await?;
            let unseen: Vec<String> = targets
                .into_iter()
                .filter(|t| visited.insert(t.clone()))
                .collect();
            if unseen.is_empty() {
                break;
            }
            let nodes = self.with_conn(|conn| nodes_by_ids(conn, &unseen)).await?;
            discovered.extend(nodes);
            frontier = unseen;
        }
        Ok(discovered)
    }

    /// BFS over `calls` edges from `from` to `to`, bounded at 15 levels.
    /// Endpoints may be IDs or names; resolution tries exact ID, exact
    /// name, then substring match. Returns the first path's edge sequence,
    /// or an empty sequence when no path exists.
    pub async fn trace_call_chain(
        &self,
        cancel: &CancellationToken,
        from: &str,
        to: &str,
    ) -> Result<Vec<CodeEdge>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let Some(from_id) = self.with_conn(|conn| resolve_endpoint(conn, from)).await? else {
            return Ok(Vec::new());
        };
        let Some(to_id) = self.with_conn(|conn| resolve_endpoint(conn, to)).await? else {
            return Ok(Vec::new());
        };
        if from_id == to_id {
            return Ok(Vec::new());
        }

        // parent edge per visited node, for path reconstruction
        let mut parent: HashMap<String, CodeEdge> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(from_id.clone());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(from_id.clone());

        for _ in 0..CALL_CHAIN_MAX_DEPTH {
            if queue.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            let frontier: Vec<String> = queue.drain(..).collect();
            let edges = self
                .with_conn(|conn| outgoing_call_edges(conn, &frontier))
                .await?;
            for edge in edges {
                if !visited.insert(edge.to_id.clone()) {
                    continue;
                }
                parent.insert(edge.to_id.clone(), edge.clone());
                if edge.to_id == to_id {
                    return Ok(reconstruct_path(&parent, &from_id, &to_id));
                }
                queue.push_back(edge.to_id);
            }
        }
        Ok(Vec::new())
    }

    /// Nodes with a `calls` edge into `node_id`.
    pub async fn get_callers(&self, node_id: &str) -> Result<Vec<CodeNode>, StoreError> {
        self.call_neighbors(node_id, true).await
    }

    /// Nodes this node has `calls` edges into.
    pub async fn get_callees(&self, node_id: &str) -> Result<Vec<CodeNode>, StoreError> {
        self.call_neighbors(node_id, false).await
    }

    async fn call_neighbors(
        &self,
        node_id: &str,
        incoming: bool,
    ) -> Result<Vec<CodeNode>, StoreError> {
        let node_id = node_id.to_string();
        self.with_conn(move |conn| {
            let sql = if incoming {
                format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE id IN (SELECT from_id FROM edges WHERE to_id = ?1 AND edge_type = 'calls')"
                )
            } else {
                format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE id IN (SELECT to_id FROM edges WHERE from_id = ?1 AND edge_type = 'calls')"
                )
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![node_id], node_from_row)?;
            collect_rows(rows)
        })
        .await
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

fn outgoing_targets(conn: &Connection, ids: &[String]) -> Result<Vec<String>, StoreError> {
    let mut targets = Vec::new();
    for chunk in ids.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT to_id FROM edges WHERE from_id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk), |row| {
            row.get::<_, String>(0)
        })?;
        for row in rows {
            targets.push(row?);
        }
    }
    Ok(targets)
}

fn outgoing_call_edges(conn: &Connection, ids: &[String]) -> Result<Vec<CodeEdge>, StoreError> {
    let mut edges = Vec::new();
    for chunk in ids.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE edge_type = 'calls' AND from_id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk), edge_from_row)?;
        for row in rows {
            edges.push(row?);
        }
    }
    Ok(edges)
}

fn nodes_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<CodeNode>, StoreError> {
    let mut nodes = Vec::new();
    for chunk in ids.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk), node_from_row)?;
        for row in rows {
            nodes.push(row?);
        }
    }
    Ok(nodes)
}

/// Exact ID, then exact name, then substring match.
fn resolve_endpoint(conn: &Connection, reference: &str) -> Result<Option<String>, StoreError> {
    let by_id: Option<String> = conn
        .query_row(
            "SELECT id FROM nodes WHERE id = ?1",
            params![reference],
            |row| row.get(0),
        )
        .optional()?;
    if by_id.is_some() {
        return Ok(by_id);
    }
    let by_name: Option<String> = conn
        .query_row(
            "SELECT id FROM nodes WHERE name = ?1 LIMIT 1",
            params![reference],
            |row| row.get(0),
        )
        .optional()?;
    if by_name.is_some() {
        return Ok(by_name);
    }
    let pattern = format!("%{reference}%");
    conn.query_row(
        "SELECT id FROM nodes WHERE name LIKE ?1 LIMIT 1",
        params![pattern],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn reconstruct_path(
    parent: &HashMap<String, CodeEdge>,
    from_id: &str,
    to_id: &str,
) -> Vec<CodeEdge> {
    let mut path = Vec::new();
    let mut current = to_id.to_string();
    while current != from_id {
        let Some(edge) = parent.get(&current) else {
            return Vec::new();
        };
        current = edge.from_id.clone();
        path.push(edge.clone());
    }
    path.reverse();
    path
}
