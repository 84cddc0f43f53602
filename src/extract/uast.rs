//! UAST extraction using tree-sitter
//!
//! Every named node of the concrete syntax tree becomes a [`UastNode`]:
//! - `type`: the grammar's node kind
//! - `token`: source text, on leaves only
//! - `start` / `end`: byte offset, 1-based line and column
//!
//! Anonymous nodes (punctuation, keywords) are dropped. The result is
//! serialized as compact JSON. Trees nested deeper than [`MAX_UAST_DEPTH`]
//! are rejected as parse failures.

use super::{ParsedFile, SourceParser};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deepest named-node nesting a UAST may have
pub const MAX_UAST_DEPTH: usize = 256;

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    Go,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Rust, Language::Python, Language::Go];

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(Language::Rust),
            "py" | "pyi" => Some(Language::Python),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    /// Detect language from a repository-relative path
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Look up a language by its tag
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(name))
    }

    /// Get the tree-sitter language for this language
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// Tag used in `File::language`
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::Go => "go",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

/// One node of the universal syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UastNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UastNode>,
}

/// A node whose named children are still being converted
struct Frame<'t> {
    node: tree_sitter::Node<'t>,
    pending: std::vec::IntoIter<tree_sitter::Node<'t>>,
    children: Vec<UastNode>,
}

impl<'t> Frame<'t> {
    fn new(node: tree_sitter::Node<'t>, cursor: &mut tree_sitter::TreeCursor<'t>) -> Self {
        let pending: Vec<_> = node.named_children(cursor).collect();
        Self {
            node,
            pending: pending.into_iter(),
            children: Vec::new(),
        }
    }

    fn finish(self, source: &[u8]) -> UastNode {
        let node = self.node;
        let token = if self.children.is_empty() {
            node.utf8_text(source).ok().map(|t| t.to_string())
        } else {
            None
        };

        let start = node.start_position();
        let end = node.end_position();

        UastNode {
            kind: node.kind().to_string(),
            token,
            start: Position {
                offset: node.start_byte(),
                line: start.row + 1,
                col: start.column + 1,
            },
            end: Position {
                offset: node.end_byte(),
                line: end.row + 1,
                col: end.column + 1,
            },
            children: self.children,
        }
    }
}

impl UastNode {
    /// Convert a tree-sitter node and its named descendants.
    ///
    /// Fails when named nodes nest deeper than [`MAX_UAST_DEPTH`].
    pub fn from_node(root: tree_sitter::Node<'_>, source: &[u8]) -> Result<Self> {
        let mut cursor = root.walk();
        let mut stack = vec![Frame::new(root, &mut cursor)];

        while let Some(frame) = stack.last_mut() {
            match frame.pending.next() {
                Some(child) => {
                    if stack.len() >= MAX_UAST_DEPTH {
                        anyhow::bail!(
                            "syntax tree is nested deeper than {} levels at line {}",
                            MAX_UAST_DEPTH,
                            child.start_position().row + 1
                        );
                    }
                    stack.push(Frame::new(child, &mut cursor));
                }
                None => {
                    let Some(done) = stack.pop() else { break };
                    let node = done.finish(source);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
            }
        }

        anyhow::bail!("syntax tree has no root")
    }

    /// Deserialize a UAST produced by [`TreeSitterParser`].
    ///
    /// Subject to serde_json's nesting limit, so only shallow trees decode.
    pub fn from_json(uast: &str) -> Result<Self> {
        serde_json::from_str(uast).context("Failed to decode UAST")
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Find the first node of `kind` in pre-order
    pub fn find(&self, kind: &str) -> Option<&UastNode> {
        if self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(kind))
    }
}

/// Parses files with one tree-sitter parser per enabled language
pub struct TreeSitterParser {
    parsers: HashMap<Language, tree_sitter::Parser>,
}

impl TreeSitterParser {
    /// Create a parser for the named languages; unknown names are skipped
    pub fn new(languages: &[String]) -> Result<Self> {
        let mut parsers = HashMap::new();

        for name in languages {
            let Some(language) = Language::from_name(name) else {
                tracing::warn!("Unsupported language in configuration: {}", name);
                continue;
            };

            let mut parser = tree_sitter::Parser::new();
            parser
                .set_language(&language.tree_sitter_language())
                .with_context(|| format!("Failed to set {} language", language))?;
            parsers.insert(language, parser);
        }

        Ok(Self { parsers })
    }

    /// Create a parser for every supported language
    pub fn all() -> Result<Self> {
        let names: Vec<String> = Language::ALL.iter().map(|l| l.to_string()).collect();
        Self::new(&names)
    }

    /// Languages this parser handles
    pub fn languages(&self) -> Vec<Language> {
        Language::ALL
            .into_iter()
            .filter(|l| self.parsers.contains_key(l))
            .collect()
    }
}

impl SourceParser for TreeSitterParser {
    fn parse(&mut self, path: &str, content: &[u8]) -> Result<Option<ParsedFile>> {
        let Some(language) = Language::from_path(path) else {
            return Ok(None);
        };

        let Some(parser) = self.parsers.get_mut(&language) else {
            return Ok(None);
        };

        let Ok(source) = std::str::from_utf8(content) else {
            tracing::debug!("Skipping non UTF-8 file {}", path);
            return Ok(None);
        };

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse {} file {}", language, path))?;

        let root = tree.root_node();
        if root.has_error() {
            anyhow::bail!("{} file {} contains syntax errors", language, path);
        }

        let node = UastNode::from_node(root, source.as_bytes())
            .with_context(|| format!("Failed to convert {} file {}", language, path))?;
        let uast = serde_json::to_string(&node).context("Failed to serialize UAST")?;

        Ok(Some(ParsedFile {
            language: language.to_string(),
            uast,
        }))
    }
}
