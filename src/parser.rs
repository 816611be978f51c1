// Tree-sitter wrapper: grammar selection, a tolerant ParseResult, and a
// depth-first traversal helper, pulled into its own module so
// SymbolExtractor and CommentExtractor can share one parse per file.

use tree_sitter::{Node, Parser as TsParser, Tree};

use crate::error::{IndexError, Result};
use crate::language::Language;

fn grammar_for(language: Language) -> Option<tree_sitter::Language> {
    let lang = match language {
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::Markdown => return None,
    };
    Some(lang)
}

pub struct ParseResult {
    pub tree: Tree,
    pub has_error: bool,
    pub language: Language,
}

impl ParseResult {
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// Parses `source` as `language`. Tolerant: malformed input still yields a
/// tree with `has_error = true` rather than failing. Markdown has no
/// tree-sitter grammar here; callers route it to `crate::markdown` instead.
pub fn parse(source: &str, language: Language) -> Result<ParseResult> {
    let grammar = grammar_for(language).ok_or_else(|| IndexError::InvalidParams {
        message: "markdown has no concrete syntax tree; use the markdown module".to_string(),
    })?;

    let mut parser = TsParser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| IndexError::Internal {
            message: format!("failed to load grammar: {}", e),
            source: None,
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| IndexError::ParseError {
        path: String::new(),
        message: "tree-sitter returned no tree".to_string(),
    })?;

    let has_error = tree.root_node().has_error();
    Ok(ParseResult {
        tree,
        has_error,
        language,
    })
}

pub struct TraversalOptions {
    pub skip_errors: bool,
    pub max_depth: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            skip_errors: true,
            max_depth: usize::MAX,
        }
    }
}

/// Depth-first traversal; `visitor` returning `false` stops the walk early.
pub fn walk<'a, F>(root: Node<'a>, options: &TraversalOptions, mut visitor: F)
where
    F: FnMut(Node<'a>, usize) -> bool,
{
    walk_inner(root, options, 0, &mut visitor);
}

fn walk_inner<'a, F>(node: Node<'a>, options: &TraversalOptions, depth: usize, visitor: &mut F) -> bool
where
    F: FnMut(Node<'a>, usize) -> bool,
{
    if depth > options.max_depth {
        return true;
    }
    if options.skip_errors && node.is_error() {
        return true;
    }
    if !visitor(node, depth) {
        return false;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !walk_inner(child, options, depth + 1, visitor) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_rust_without_error() {
        let result = parse("fn main() {}", Language::Rust).unwrap();
        assert!(!result.has_error);
    }

    #[test]
    fn tolerates_malformed_input() {
        let result = parse("fn main( {{{", Language::Rust).unwrap();
        assert!(result.has_error);
    }

    #[test]
    fn empty_input_is_a_valid_empty_tree() {
        let result = parse("", Language::Python).unwrap();
        assert!(!result.has_error);
    }

    #[test]
    fn markdown_has_no_grammar() {
        assert!(parse("# hi", Language::Markdown).is_err());
    }

    #[test]
    fn traversal_can_stop_early() {
        let result = parse("fn a() {} fn b() {}", Language::Rust).unwrap();
        let mut visited = 0;
        walk(result.root_node(), &TraversalOptions::default(), |_, _| {
            visited += 1;
            visited < 2
        });
        assert_eq!(visited, 2);
    }
}
