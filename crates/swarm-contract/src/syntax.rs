//! Syntax gate for candidate source
//!
//! A Fixer candidate is written only if tree-sitter parses it without any
//! ERROR or MISSING node. The language is chosen from the file extension.

use crate::error::SyntaxError;
use std::path::Path;

/// Languages the syntax gate can check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// Python
    Python,
    /// Rust
    Rust,
}

impl Language {
    /// Get file extensions for this language
    #[inline]
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py", "pyi"],
            Language::Rust => &["rs"],
        }
    }

    /// Get human-readable name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
        }
    }

    /// Detect language from a file extension
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        [Language::Python, Language::Rust]
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext))
    }

    /// Detect language from a path
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }
}

/// Tree-sitter based syntax checker
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxChecker;

impl SyntaxChecker {
    /// Check source in the given language
    ///
    /// # Errors
    /// `SyntaxError::Invalid` with the first error position (1-based), or
    /// `SyntaxError::Grammar` if the parser cannot be set up.
    pub fn check(language: Language, source: &str) -> Result<(), SyntaxError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|e| SyntaxError::Grammar(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| SyntaxError::Grammar("parser produced no tree".to_string()))?;

        let root = tree.root_node();
        if !root.has_error() {
            return Ok(());
        }

        let node = first_error(root).unwrap_or(root);
        let position = node.start_position();
        let message = if node.is_missing() {
            format!("missing '{}'", node.kind())
        } else {
            let snippet: String = source
                .get(node.start_byte()..node.end_byte())
                .unwrap_or_default()
                .chars()
                .take(40)
                .collect();
            format!("unexpected '{}'", snippet.trim())
        };

        Err(SyntaxError::Invalid {
            language: language.name(),
            line: position.row + 1,
            column: position.column + 1,
            message,
        })
    }

    /// Check source for the language implied by `path`
    ///
    /// # Errors
    /// `SyntaxError::UnsupportedLanguage` for unknown extensions, otherwise as
    /// [`SyntaxChecker::check`].
    pub fn check_path(path: &Path, source: &str) -> Result<(), SyntaxError> {
        let language = Language::from_path(path).ok_or_else(|| {
            SyntaxError::UnsupportedLanguage(
                path.extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        })?;
        Self::check(language, source)
    }
}

/// Depth-first search for the first ERROR or MISSING node
fn first_error(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}
