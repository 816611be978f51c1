// Chunker & Fingerprinter. Symbol-anchored chunking, with
// sliding_window.rs covering regions no symbol spans and all of Markdown.

pub mod sliding_window;

use crate::model::{Chunk, ChunkMetadata, Symbol, SymbolKind, SymbolScope};
use crate::search::bm25::tokenize;

const DEFAULT_WINDOW_SIZE: u32 = 40;
const CONTEXT_LINES: u32 = 3;

pub struct Chunker {
    window_size: u32,
}

impl Chunker {
    pub fn new() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    pub fn with_window_size(window_size: u32) -> Self {
        Self { window_size }
    }

    /// Chunks one file's source given its already-extracted symbols.
    /// `path`/`project_id`/`language` feed chunk metadata; `is_markdown`
    /// forces the sliding-window path regardless of symbols.
    pub fn chunk_file(
        &self,
        source: &str,
        symbols: &[Symbol],
        path: &str,
        project_id: &str,
        language: &str,
        is_markdown: bool,
    ) -> Vec<Chunk> {
        let lines: Vec<&str> = source.lines().collect();
        let total_lines = lines.len() as u32;
        if total_lines == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();

        if is_markdown || symbols.is_empty() {
            for window in sliding_window::windows(0, total_lines, self.window_size) {
                chunks.push(self.build_chunk(
                    &lines,
                    window.start_line,
                    window.end_line.saturating_sub(1),
                    path,
                    project_id,
                    language,
                    None,
                    None,
                ));
            }
            return chunks;
        }

        // Top-level symbols (global scope) become chunks; class members
        // become additional chunks inheriting symbolName from their parent.
        let mut covered = vec![false; total_lines as usize];
        for symbol in symbols.iter().filter(|s| s.scope == SymbolScope::Global) {
            self.mark_covered(&mut covered, symbol);
            chunks.push(self.chunk_for_symbol(&lines, symbol, None, path, project_id, language));
            for &member_id in &symbol.members {
                let member = &symbols[member_id];
                self.mark_covered(&mut covered, member);
                chunks.push(self.chunk_for_symbol(
                    &lines,
                    member,
                    Some(symbol.name.as_str()),
                    path,
                    project_id,
                    language,
                ));
            }
        }

        for gap in uncovered_ranges(&covered) {
            for window in sliding_window::windows(gap.0, gap.1, self.window_size) {
                chunks.push(self.build_chunk(
                    &lines,
                    window.start_line,
                    window.end_line.saturating_sub(1),
                    path,
                    project_id,
                    language,
                    None,
                    None,
                ));
            }
        }

        chunks.sort_by_key(|c| c.metadata.line_start);
        chunks
    }

    fn mark_covered(&self, covered: &mut [bool], symbol: &Symbol) {
        let start = symbol.location.start_line as usize;
        let end = (symbol.location.end_line as usize).min(covered.len().saturating_sub(1));
        for slot in covered.iter_mut().take(end + 1).skip(start) {
            *slot = true;
        }
    }

    fn chunk_for_symbol(
        &self,
        lines: &[&str],
        symbol: &Symbol,
        parent_name: Option<&str>,
        path: &str,
        project_id: &str,
        language: &str,
    ) -> Chunk {
        self.build_chunk(
            lines,
            symbol.location.start_line,
            symbol.location.end_line,
            path,
            project_id,
            language,
            Some(parent_name.unwrap_or(symbol.name.as_str()).to_string()),
            Some(symbol.kind),
        )
    }

    fn build_chunk(
        &self,
        lines: &[&str],
        start_line: u32,
        end_line: u32,
        path: &str,
        project_id: &str,
        language: &str,
        symbol_name: Option<String>,
        symbol_type: Option<SymbolKind>,
    ) -> Chunk {
        let context_start = start_line.saturating_sub(CONTEXT_LINES);
        let context_end = (end_line + CONTEXT_LINES).min(lines.len() as u32 - 1);
        let text = lines
            .get(context_start as usize..=context_end as usize)
            .unwrap_or(&[])
            .join("\n");

        let tokens = tokenize(&text);
        let id = Chunk::make_id(path, start_line);

        Chunk {
            id,
            text,
            vector: None,
            metadata: ChunkMetadata {
                language: language.to_string(),
                path: path.to_string(),
                line_start: start_line,
                line_end: end_line,
                project_id: project_id.to_string(),
                symbol_name,
                symbol_type,
            },
            tokens,
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

fn uncovered_ranges(covered: &[bool]) -> Vec<(u32, u32)> {
    let mut ranges = Vec::new();
    let mut start: Option<u32> = None;
    for (i, &is_covered) in covered.iter().enumerate() {
        if is_covered {
            if let Some(s) = start.take() {
                ranges.push((s, i as u32));
            }
        } else if start.is_none() {
            start = Some(i as u32);
        }
    }
    if let Some(s) = start {
        ranges.push((s, covered.len() as u32));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::symbols::SymbolExtractor;

    #[test]
    fn single_function_produces_one_symbol_chunk() {
        let source = "fn greet(name: &str) {\n    println!(\"{}\", name);\n}\n";
        let symbols = SymbolExtractor::new().extract(source, Language::Rust, "lib.rs");
        let chunks = Chunker::new().chunk_file(source, &symbols, "lib.rs", "proj", "rust", false);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "lib.rs:0");
        assert!(chunks[0].text.contains("greet"));
    }

    #[test]
    fn chunk_id_is_stable_across_unrelated_edits() {
        let source_a = "fn a() {}\nfn unrelated_b() {}\n";
        let source_b = "fn a() {}\nfn unrelated_b_renamed() {}\n";
        let symbols_a = SymbolExtractor::new().extract(source_a, Language::Rust, "lib.rs");
        let symbols_b = SymbolExtractor::new().extract(source_b, Language::Rust, "lib.rs");
        let chunks_a = Chunker::new().chunk_file(source_a, &symbols_a, "lib.rs", "proj", "rust", false);
        let chunks_b = Chunker::new().chunk_file(source_b, &symbols_b, "lib.rs", "proj", "rust", false);
        assert_eq!(chunks_a[0].id, chunks_b[0].id);
    }

    #[test]
    fn markdown_uses_sliding_window_regardless_of_symbols() {
        let mut source = String::new();
        for i in 0..100 {
            source.push_str(&format!("line {}\n", i));
        }
        let chunks = Chunker::new().chunk_file(&source, &[], "README.md", "proj", "markdown", true);
        assert!(chunks.len() >= 2);
    }
}
