// DocCodeLinker: scores candidate code files against a parsed Markdown
// document using an additive, capped formula over file-path references,
// symbol mentions, and token-Jaccard code similarity.

use std::collections::HashSet;
use std::path::Path;

use unicode_segmentation::UnicodeSegmentation;

use crate::markdown::MarkdownDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchReason {
    FilePathReference,
    SymbolReference,
    CodeSimilarity,
}

#[derive(Debug, Clone)]
pub struct DocCodeMatch {
    pub file_path: String,
    pub score: f32,
    pub reasons: Vec<MatchReason>,
}

/// One candidate code file the linker can match against: its path, the
/// symbol names it defines, and its raw source (for code-similarity).
pub struct CodeFile<'a> {
    pub path: &'a str,
    pub symbol_names: &'a [String],
    pub source: &'a str,
}

pub struct DocCodeLinker;

impl DocCodeLinker {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate_related_score(
        &self,
        doc: &MarkdownDocument,
        doc_path: &str,
        project_root: &str,
        code_files: &[CodeFile],
    ) -> Vec<DocCodeMatch> {
        let doc_tokens_per_block: Vec<HashSet<String>> = doc
            .code_blocks
            .iter()
            .map(|b| tokenize(&b.code))
            .collect();

        let mut matches: Vec<DocCodeMatch> = code_files
            .iter()
            .filter_map(|file| score_file(doc, doc_path, project_root, file, &doc_tokens_per_block))
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        matches
    }
}

impl Default for DocCodeLinker {
    fn default() -> Self {
        Self::new()
    }
}

fn score_file(
    doc: &MarkdownDocument,
    doc_path: &str,
    project_root: &str,
    file: &CodeFile,
    doc_code_token_sets: &[HashSet<String>],
) -> Option<DocCodeMatch> {
    let mut score = 0.0f32;
    let mut reasons = Vec::new();

    let path_matches = count_path_references(doc, doc_path, project_root, file.path);
    if path_matches > 0 {
        score += 0.5 * path_matches as f32;
        reasons.push(MatchReason::FilePathReference);
    }

    let symbol_matches = count_symbol_references(doc, file.symbol_names);
    if symbol_matches > 0 {
        score += 0.25 * symbol_matches as f32;
        reasons.push(MatchReason::SymbolReference);
    }

    let file_tokens = tokenize(file.source);
    let best_similarity = doc_code_token_sets
        .iter()
        .map(|block_tokens| jaccard(block_tokens, &file_tokens))
        .fold(0.0f32, f32::max);
    if best_similarity >= 0.5 {
        score += 0.5 * best_similarity;
        reasons.push(MatchReason::CodeSimilarity);
    }

    if reasons.is_empty() {
        return None;
    }

    Some(DocCodeMatch {
        file_path: file.path.to_string(),
        score: score.min(1.0),
        reasons,
    })
}

fn count_path_references(doc: &MarkdownDocument, doc_path: &str, project_root: &str, candidate: &str) -> usize {
    let doc_dir = Path::new(doc_path).parent().unwrap_or_else(|| Path::new(""));
    let mut distinct = HashSet::new();
    for reference in &doc.file_paths {
        let resolved = if reference.is_absolute {
            Path::new(project_root).join(reference.path.trim_start_matches('/'))
        } else {
            doc_dir.join(&reference.path)
        };
        if paths_match(&resolved, candidate) {
            distinct.insert(reference.path.clone());
        }
    }
    distinct.len()
}

fn paths_match(resolved: &Path, candidate: &str) -> bool {
    let candidate_path = Path::new(candidate);
    resolved == candidate_path
        || resolved
            .file_name()
            .zip(candidate_path.file_name())
            .map(|(a, b)| a == b)
            .unwrap_or(false)
            && resolved.ends_with(candidate_path.file_name().unwrap_or_default())
}

fn count_symbol_references(doc: &MarkdownDocument, symbol_names: &[String]) -> usize {
    let mut mentioned = HashSet::new();
    for name in symbol_names {
        if name.is_empty() {
            continue;
        }
        if doc.text_content.contains(name.as_str())
            || doc.code_blocks.iter().any(|c| c.code.contains(name.as_str()))
        {
            mentioned.insert(name.clone());
        }
    }
    mentioned.len()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::MarkdownParser;

    #[test]
    fn file_path_reference_scores_half() {
        let doc = MarkdownParser::new().parse("see `src/lib.rs`");
        let code = CodeFile {
            path: "src/lib.rs",
            symbol_names: &[],
            source: "fn a() {}",
        };
        let matches = DocCodeLinker::new().calculate_related_score(&doc, "README.md", "", &[code]);
        assert_eq!(matches.len(), 1);
        assert!((matches[0].score - 0.5).abs() < 1e-6);
        assert_eq!(matches[0].reasons, vec![MatchReason::FilePathReference]);
    }

    #[test]
    fn no_match_is_excluded() {
        let doc = MarkdownParser::new().parse("nothing relevant here");
        let code = CodeFile {
            path: "src/lib.rs",
            symbol_names: &["totally_unrelated_fn".to_string()],
            source: "fn totally_unrelated_fn() {}",
        };
        let matches = DocCodeLinker::new().calculate_related_score(&doc, "README.md", "", &[code]);
        assert!(matches.is_empty());
    }

    #[test]
    fn ties_break_lexicographically() {
        let doc = MarkdownParser::new().parse("mentions `helper`");
        let a = CodeFile {
            path: "b.rs",
            symbol_names: &["helper".to_string()],
            source: "fn helper() {}",
        };
        let b = CodeFile {
            path: "a.rs",
            symbol_names: &["helper".to_string()],
            source: "fn helper() {}",
        };
        let matches = DocCodeLinker::new().calculate_related_score(&doc, "README.md", "", &[a, b]);
        assert_eq!(matches[0].file_path, "a.rs");
    }
}
