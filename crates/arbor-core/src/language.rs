//! Language registry: maps file extensions to supported languages

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Languages the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    C,
    Cpp,
    Go,
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Java,
    Clojure,
    Julia,
    CommonLisp,
}

impl Lang {
    /// Detect language from file extension. Unknown extensions are simply
    /// not indexed, so this returns `None` rather than erroring.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "c" | "h" => Some(Lang::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Some(Lang::Cpp),
            "go" => Some(Lang::Go),
            "py" => Some(Lang::Python),
            "js" | "mjs" | "cjs" => Some(Lang::JavaScript),
            "ts" | "tsx" => Some(Lang::TypeScript),
            "rs" => Some(Lang::Rust),
            "java" => Some(Lang::Java),
            "clj" | "cljs" | "cljc" | "edn" => Some(Lang::Clojure),
            "jl" => Some(Lang::Julia),
            "lisp" | "lsp" | "cl" | "asd" | "asdf" => Some(Lang::CommonLisp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::C => "c",
            Lang::Cpp => "cpp",
            Lang::Go => "go",
            Lang::Python => "python",
            Lang::JavaScript => "javascript",
            Lang::TypeScript => "typescript",
            Lang::Rust => "rust",
            Lang::Java => "java",
            Lang::Clojure => "clojure",
            Lang::Julia => "julia",
            Lang::CommonLisp => "commonlisp",
        }
    }

    /// Clojure and Common Lisp share s-expression grammars and therefore
    /// extraction logic.
    pub fn is_lisp(&self) -> bool {
        matches!(self, Lang::Clojure | Lang::CommonLisp)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
