// Comment extraction, classification, marker/tag parsing, and symbol
// association. Built in the same tree-sitter-walk idiom symbols.rs uses,
// since comment nodes are ordinary nodes in every grammar here.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::language::Language;
use crate::model::{Comment, CommentKind, DocTag, Location, Marker, Symbol};
use crate::parser::{self, TraversalOptions};

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(TODO|FIXME|NOTE|HACK|XXX|BUG)\b").unwrap());
static JSDOC_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)\s*(.*)").unwrap());
static PY_SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(Args|Returns|Raises|Yields):\s*$").unwrap());
static RUST_SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s*(Arguments|Returns)\s*$").unwrap());
static DOXYGEN_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(brief|param|return)\b\s*(.*)").unwrap());

pub struct CommentExtractor;

impl CommentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts comments and associates each doc-style comment with the
    /// nearest following symbol within three lines (the association
    /// rule). `symbols` must already carry final ids matching their index.
    pub fn extract(&self, source: &str, language: Language, symbols: &[Symbol]) -> Vec<Comment> {
        if language == Language::Markdown {
            return Vec::new();
        }
        let Ok(parsed) = parser::parse(source, language) else {
            return Vec::new();
        };

        let mut raw = Vec::new();
        parser::walk(parsed.root_node(), &TraversalOptions::default(), |node, _| {
            if is_comment_node(node.kind()) {
                raw.push(node);
            }
            true
        });

        let mut comments: Vec<Comment> = raw
            .into_iter()
            .filter_map(|node| build_comment(source, language, node))
            .collect();

        associate_symbols(&mut comments, symbols);
        comments
    }
}

impl Default for CommentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_comment_node(kind: &str) -> bool {
    matches!(kind, "comment" | "line_comment" | "block_comment")
}

fn build_comment(source: &str, language: Language, node: Node) -> Option<Comment> {
    let raw_text = node.utf8_text(source.as_bytes()).ok()?;
    let (kind, content) = classify(raw_text, language);
    let content = content.trim().to_string();
    if content.is_empty() {
        return None;
    }

    let marker = MARKER_RE
        .captures(&content)
        .map(|c| match &c[1] {
            "TODO" => Marker::Todo,
            "FIXME" => Marker::Fixme,
            "NOTE" => Marker::Note,
            "HACK" => Marker::Hack,
            "XXX" => Marker::Xxx,
            _ => Marker::Bug,
        });

    let tags = extract_tags(&content, language);

    let start = node.start_position();
    let end = node.end_position();
    Some(Comment {
        kind,
        content,
        position: Location {
            start_line: start.row as u32,
            end_line: end.row as u32,
            start_col: start.column as u32,
            end_col: end.column as u32,
        },
        marker,
        tags,
        associated_symbol: None,
    })
}

/// Strips comment delimiters and classifies the comment's kind.
fn classify(raw: &str, language: Language) -> (CommentKind, String) {
    let trimmed = raw.trim();

    if let Some(rest) = trimmed.strip_prefix("///") {
        return (CommentKind::DocComment, rest.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("//!") {
        return (CommentKind::DocComment, rest.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return (CommentKind::SingleLine, rest.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix('#') {
        if matches!(language, Language::Python) {
            return (CommentKind::SingleLine, rest.to_string());
        }
        return (CommentKind::SingleLine, rest.to_string());
    }

    if trimmed.starts_with("/**") || trimmed.starts_with("/*!") {
        let body = strip_block_delimiters(trimmed);
        return (CommentKind::DocComment, body);
    }
    if let Some(body) = trimmed.strip_prefix("/*").and_then(|s| s.strip_suffix("*/")) {
        return (CommentKind::MultiLine, strip_leading_stars(body));
    }
    if trimmed.starts_with('"') || trimmed.starts_with("'''") || trimmed.starts_with("\"\"\"") {
        return (CommentKind::DocComment, trimmed.trim_matches(['"', '\''].as_ref()).to_string());
    }

    (CommentKind::SingleLine, trimmed.to_string())
}

fn strip_block_delimiters(raw: &str) -> String {
    let inner = raw
        .trim_start_matches("/**")
        .trim_start_matches("/*!")
        .trim_end_matches("*/");
    strip_leading_stars(inner)
}

fn strip_leading_stars(body: &str) -> String {
    body.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_tags(content: &str, language: Language) -> Vec<DocTag> {
    let mut tags = Vec::new();
    match language {
        Language::TypeScript | Language::JavaScript | Language::Java => {
            for line in content.lines() {
                let line = line.trim();
                if let Some(caps) = JSDOC_TAG_RE.captures(line) {
                    tags.push(DocTag {
                        name: caps[1].to_string(),
                        value: Some(caps[2].trim().to_string()).filter(|v| !v.is_empty()),
                    });
                }
            }
        }
        Language::Python => {
            for line in content.lines() {
                if let Some(caps) = PY_SECTION_RE.captures(line.trim()) {
                    tags.push(DocTag {
                        name: caps[1].to_string(),
                        value: None,
                    });
                }
            }
        }
        Language::Rust => {
            for line in content.lines() {
                if let Some(caps) = RUST_SECTION_RE.captures(line.trim()) {
                    tags.push(DocTag {
                        name: caps[1].to_string(),
                        value: None,
                    });
                }
            }
        }
        Language::C | Language::Cpp => {
            for line in content.lines() {
                let line = line.trim();
                if let Some(caps) = DOXYGEN_TAG_RE.captures(line) {
                    tags.push(DocTag {
                        name: caps[1].to_string(),
                        value: Some(caps[2].trim().to_string()).filter(|v| !v.is_empty()),
                    });
                }
            }
        }
        _ => {}
    }
    tags
}

fn associate_symbols(comments: &mut [Comment], symbols: &[Symbol]) {
    for comment in comments.iter_mut() {
        if !matches!(comment.kind, CommentKind::DocComment) {
            continue;
        }
        let best = symbols
            .iter()
            .filter(|s| s.location.start_line >= comment.position.end_line)
            .filter(|s| s.location.start_line - comment.position.end_line <= 3)
            .min_by_key(|s| s.location.start_line - comment.position.end_line);
        comment.associated_symbol = best.map(|s| s.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolExtractor;

    #[test]
    fn jsdoc_comment_associates_with_following_function() {
        let source = "/**\n * @param x - First\n * @returns y\n */\nfunction f(x){}\n";
        let symbols = SymbolExtractor::new().extract(source, Language::JavaScript, "a.js");
        let comments = CommentExtractor::new().extract(source, Language::JavaScript, &symbols);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].kind, CommentKind::DocComment);
        assert!(comments[0].tags.iter().any(|t| t.name == "param"));
        assert!(comments[0].tags.iter().any(|t| t.name == "returns"));
        let sym_id = comments[0].associated_symbol.unwrap();
        assert_eq!(symbols[sym_id].name, "f");
    }

    #[test]
    fn marker_detection_is_word_bounded() {
        let source = "// TODO fix this\nfn a() {}\n";
        let symbols = SymbolExtractor::new().extract(source, Language::Rust, "a.rs");
        let comments = CommentExtractor::new().extract(source, Language::Rust, &symbols);
        assert_eq!(comments[0].marker, Some(Marker::Todo));
    }

    #[test]
    fn empty_comment_is_dropped() {
        let source = "//\nfn a() {}\n";
        let symbols = SymbolExtractor::new().extract(source, Language::Rust, "a.rs");
        let comments = CommentExtractor::new().extract(source, Language::Rust, &symbols);
        assert!(comments.is_empty());
    }

    #[test]
    fn distant_comment_is_unattributed() {
        let source = "/// doc\n\n\n\n\nfn a() {}\n";
        let symbols = SymbolExtractor::new().extract(source, Language::Rust, "a.rs");
        let comments = CommentExtractor::new().extract(source, Language::Rust, &symbols);
        assert!(comments[0].associated_symbol.is_none());
    }
}
