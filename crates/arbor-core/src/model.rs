//! Core data structures for the code knowledge graph

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discriminates what kind of code entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Enum,
    Macro,
    Variable,
    Type,
    Import,
    Module,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Function => "function",
            NodeType::Method => "method",
            NodeType::Class => "class",
            NodeType::Struct => "struct",
            NodeType::Interface => "interface",
            NodeType::Enum => "enum",
            NodeType::Macro => "macro",
            NodeType::Variable => "variable",
            NodeType::Type => "type",
            NodeType::Import => "import",
            NodeType::Module => "module",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(NodeType::Function),
            "method" => Ok(NodeType::Method),
            "class" => Ok(NodeType::Class),
            "struct" => Ok(NodeType::Struct),
            "interface" => Ok(NodeType::Interface),
            "enum" => Ok(NodeType::Enum),
            "macro" => Ok(NodeType::Macro),
            "variable" => Ok(NodeType::Variable),
            "type" => Ok(NodeType::Type),
            "import" => Ok(NodeType::Import),
            "module" => Ok(NodeType::Module),
            other => Err(format!("unknown node type: {other}")),
        }
    }
}

/// What kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Calls,
    Imports,
    Uses,
    Extends,
    Implements,
    References,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "calls",
            EdgeType::Imports => "imports",
            EdgeType::Uses => "uses",
            EdgeType::Extends => "extends",
            EdgeType::Implements => "implements",
            EdgeType::References => "references",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calls" => Ok(EdgeType::Calls),
            "imports" => Ok(EdgeType::Imports),
            "uses" => Ok(EdgeType::Uses),
            "extends" => Ok(EdgeType::Extends),
            "implements" => Ok(EdgeType::Implements),
            "references" => Ok(EdgeType::References),
            other => Err(format!("unknown edge type: {other}")),
        }
    }
}

/// Canonical edge ID. Two edges between the same endpoints with different
/// types must coexist, so the type is part of the identity.
pub fn edge_id(from_id: &str, to_id: &str, edge_type: EdgeType) -> String {
    format!("{from_id}->{to_id}:{edge_type}")
}

/// A single structural program element.
///
/// IDs are `<file_path>::<name>` by default, with disambiguated forms for
/// macros (`::macro_<name>`), methods (`::<receiver>.<name>`), nested
/// methods (`::method_<name>_<row>`), imports (`::import_<row>`) and
/// namespaces (`::ns_<name>`). Nodes are only ever replaced wholesale when
/// their owning file is re-indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub language: String,
    pub file_path: String,
    /// 1-based line range, `start_line <= end_line`.
    pub start_line: u32,
    pub end_line: u32,
    /// 0-based columns.
    pub start_col: u32,
    pub end_col: u32,
    /// Exact source slice covered by the node's byte range.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub doc_comment: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<f32>,
}

impl CodeNode {
    /// Minimal constructor; extractors fill ranges and docs afterwards.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: NodeType,
        language: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        CodeNode {
            id: id.into(),
            name: name.into(),
            node_type,
            language: language.into(),
            file_path: file_path.into(),
            start_line: 1,
            end_line: 1,
            start_col: 0,
            end_col: 0,
            content: String::new(),
            signature: None,
            doc_comment: String::new(),
            annotations: HashMap::new(),
            embedding: None,
            complexity: None,
        }
    }
}

/// A directed, typed relationship between two nodes.
///
/// `to_id` may be a synthetic identifier (`external::<name>` or
/// `<file>::<name>`) when the target has not been indexed yet; a later index
/// of the target file heals the reference by ID match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEdge {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub edge_type: EdgeType,
    pub weight: f32,
}

impl CodeEdge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, edge_type: EdgeType) -> Self {
        let from_id = from_id.into();
        let to_id = to_id.into();
        let id = edge_id(&from_id, &to_id, edge_type);
        CodeEdge {
            id,
            from_id,
            to_id,
            edge_type,
            weight: 1.0,
        }
    }
}

/// Per-file bookkeeping used to skip unchanged files on re-index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_path: String,
    /// SHA-256 hex digest of the file bytes.
    pub content_hash: String,
    /// Filesystem modification time, seconds since epoch.
    pub mod_time: i64,
    pub indexed_at: chrono::DateTime<chrono::Utc>,
    pub node_count: u32,
    pub edge_count: u32,
    pub file_size: u64,
    pub language: String,
}
