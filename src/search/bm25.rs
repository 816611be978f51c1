// BM25Index and its binary persistence layout. `BM25Engine` is the
// single-collection Okapi BM25 scoring core (k1/b formula, epsilon-floored
// IDF); `BM25Index` wraps one per collection and adds deletion, a
// camelCase/Unicode-aware tokenizer, and binary persistence.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{IndexError, Result};

const MAGIC: &[u8; 4] = b"BM25";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct TermStats {
    pub document_frequency: usize,
    pub total_frequency: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentTerm {
    pub doc_id: String,
    pub term_frequency: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BM25Match {
    pub doc_id: String,
    pub score: f32,
}

/// One collection's inverted index.
#[derive(Debug, Clone)]
pub struct BM25Engine {
    k1: f32,
    b: f32,
    total_docs: usize,
    avg_doc_length: f32,
    term_frequencies: HashMap<String, TermStats>,
    document_lengths: HashMap<String, usize>,
    inverted_index: HashMap<String, Vec<DocumentTerm>>,
}

impl BM25Engine {
    pub fn new() -> Self {
        Self::with_params(1.2, 0.75)
    }

    pub fn with_params(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            total_docs: 0,
            avg_doc_length: 0.0,
            term_frequencies: HashMap::new(),
            document_lengths: HashMap::new(),
            inverted_index: HashMap::new(),
        }
    }

    /// Inserts or replaces `doc_id`'s token set.
    pub fn upsert(&mut self, doc_id: &str, tokens: &[String]) {
        if self.document_lengths.contains_key(doc_id) {
            self.delete(doc_id);
        }

        let doc_length = tokens.len();
        let total_length = (self.avg_doc_length * self.total_docs as f32) + doc_length as f32;
        self.total_docs += 1;
        self.avg_doc_length = total_length / self.total_docs as f32;
        self.document_lengths.insert(doc_id.to_string(), doc_length);

        let mut term_counts: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *term_counts.entry(token.to_lowercase()).or_insert(0) += 1;
        }

        for (term, freq) in term_counts {
            let stats = self
                .term_frequencies
                .entry(term.clone())
                .or_insert(TermStats {
                    document_frequency: 0,
                    total_frequency: 0,
                });
            stats.document_frequency += 1;
            stats.total_frequency += freq;

            self.inverted_index.entry(term).or_default().push(DocumentTerm {
                doc_id: doc_id.to_string(),
                term_frequency: freq,
            });
        }
    }

    /// Removes `doc_id`. Restores prior state bitwise if the delete is the
    /// exact inverse of the most recent upsert.
    pub fn delete(&mut self, doc_id: &str) {
        let Some(doc_length) = self.document_lengths.remove(doc_id) else {
            return;
        };

        let total_length = (self.avg_doc_length * self.total_docs as f32) - doc_length as f32;
        self.total_docs = self.total_docs.saturating_sub(1);
        self.avg_doc_length = if self.total_docs == 0 {
            0.0
        } else {
            total_length / self.total_docs as f32
        };

        let mut emptied_terms = Vec::new();
        for (term, postings) in self.inverted_index.iter_mut() {
            if let Some(pos) = postings.iter().position(|p| p.doc_id == doc_id) {
                let removed = postings.remove(pos);
                if let Some(stats) = self.term_frequencies.get_mut(term) {
                    stats.document_frequency = stats.document_frequency.saturating_sub(1);
                    stats.total_frequency = stats.total_frequency.saturating_sub(removed.term_frequency);
                    if stats.document_frequency == 0 {
                        emptied_terms.push(term.clone());
                    }
                }
            }
        }
        for term in emptied_terms {
            self.inverted_index.remove(&term);
            self.term_frequencies.remove(&term);
        }
    }

    pub fn calculate_idf(&self, term: &str) -> f32 {
        let term_lower = term.to_lowercase();
        if let Some(stats) = self.term_frequencies.get(&term_lower) {
            let n = self.total_docs as f32;
            let df = stats.document_frequency as f32;
            let raw_idf = ((n - df + 0.5) / (df + 0.5)).ln();
            let epsilon = 0.001f32;
            epsilon.max(raw_idf)
        } else {
            (self.total_docs as f32 + 1.0).ln()
        }
    }

    fn score(&self, query_terms: &[String], doc_id: &str) -> f32 {
        let Some(&doc_length) = self.document_lengths.get(doc_id) else {
            return 0.0;
        };
        let doc_length = doc_length as f32;

        let mut score = 0.0;
        for term in query_terms {
            let term_lower = term.to_lowercase();
            let idf = self.calculate_idf(&term_lower);
            let tf = self
                .inverted_index
                .get(&term_lower)
                .and_then(|docs| docs.iter().find(|d| d.doc_id == doc_id))
                .map(|d| d.term_frequency as f32)
                .unwrap_or(0.0);

            if tf > 0.0 {
                let norm_factor = 1.0 - self.b + self.b * (doc_length / self.avg_doc_length.max(f32::EPSILON));
                score += idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm_factor);
            }
        }
        score
    }

    /// Raw (unnormalized) matches for `query_terms`, descending by score.
    pub fn search_raw(&self, query_terms: &[String], top_k: usize) -> Vec<BM25Match> {
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut candidates: HashMap<String, ()> = HashMap::new();
        for term in query_terms {
            if let Some(docs) = self.inverted_index.get(&term.to_lowercase()) {
                for doc in docs {
                    candidates.insert(doc.doc_id.clone(), ());
                }
            }
        }

        let mut matches: Vec<BM25Match> = candidates
            .into_keys()
            .map(|doc_id| {
                let score = self.score(query_terms, &doc_id);
                BM25Match { doc_id, score }
            })
            .filter(|m| m.score.is_finite() && m.score > 0.0)
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        matches
    }

    pub fn total_docs(&self) -> usize {
        self.total_docs
    }
}

impl Default for BM25Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-collection map of `BM25Engine`s: a "per-collection inverted index"
/// instead of one engine shared across an entire process.
#[derive(Default)]
pub struct BM25Index {
    collections: HashMap<String, BM25Engine>,
}

impl BM25Index {
    pub fn new() -> Self {
        Self::default()
    }

    fn engine_mut(&mut self, collection: &str) -> &mut BM25Engine {
        self.collections
            .entry(collection.to_string())
            .or_insert_with(BM25Engine::new)
    }

    pub fn upsert(&mut self, collection: &str, id: &str, tokens: &[String]) {
        self.engine_mut(collection).upsert(id, tokens);
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        if let Some(engine) = self.collections.get_mut(collection) {
            engine.delete(id);
        }
    }

    /// Query tokens against `collection`, normalized into `[0, 1]` by
    /// dividing by the maximum observed score; empty when no
    /// matches or the collection doesn't exist.
    pub fn query(&self, collection: &str, tokens: &[String], top_k: usize) -> Vec<BM25Match> {
        let Some(engine) = self.collections.get(collection) else {
            return Vec::new();
        };
        let raw = engine.search_raw(tokens, top_k);
        let max_score = raw.iter().map(|m| m.score).fold(0.0f32, f32::max);
        if max_score <= 0.0 {
            return Vec::new();
        }
        raw.into_iter()
            .map(|m| BM25Match {
                doc_id: m.doc_id,
                score: m.score / max_score,
            })
            .collect()
    }

    pub fn clear(&mut self, collection: &str) {
        self.collections.remove(collection);
    }
}

/// Identifier-aware tokenizer: lowercased, preserves ASCII
/// alphanumerics/`_`, splits camelCase into subtokens while also retaining
/// the original token, and treats Unicode letters as tokens via
/// unicode-segmentation word boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.unicode_words() {
        tokens.push(word.to_lowercase());
        for sub in split_camel_case(word) {
            let lower = sub.to_lowercase();
            if lower != word.to_lowercase() {
                tokens.push(lower);
            }
        }
    }
    tokens
}

fn split_camel_case(word: &str) -> Vec<String> {
    if !word.is_ascii() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in word.chars() {
        if ch.is_uppercase() && prev_lower {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
        prev_lower = ch.is_lowercase();
    }
    if !current.is_empty() {
        parts.push(current);
    }
    if parts.len() > 1 {
        parts
    } else {
        Vec::new()
    }
}

/// Binary on-disk layout:
/// header `{magic:"BM25",version:u32,k1:f32,b:f32,avgDocLen:f32,totalDocs:u64}`
/// then a dictionary of `{tokenLen:u32, tokenBytes, postingsLen:u32,
/// postings: (docId:u32, tf:u32)*}` then a docId-to-chunkId table.
pub fn serialize(engine: &BM25Engine) -> io::Result<Vec<u8>> {
    let mut doc_ids: Vec<&String> = engine.document_lengths.keys().collect();
    doc_ids.sort();
    let doc_index: HashMap<&String, u32> = doc_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i as u32))
        .collect();

    let mut buf = Vec::new();
    buf.write_all(MAGIC)?;
    buf.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    buf.write_f32::<LittleEndian>(engine.k1)?;
    buf.write_f32::<LittleEndian>(engine.b)?;
    buf.write_f32::<LittleEndian>(engine.avg_doc_length)?;
    buf.write_u64::<LittleEndian>(engine.total_docs as u64)?;

    buf.write_u32::<LittleEndian>(engine.inverted_index.len() as u32)?;
    let mut terms: Vec<&String> = engine.inverted_index.keys().collect();
    terms.sort();
    for term in terms {
        let postings = &engine.inverted_index[term];
        let token_bytes = term.as_bytes();
        buf.write_u32::<LittleEndian>(token_bytes.len() as u32)?;
        buf.write_all(token_bytes)?;
        buf.write_u32::<LittleEndian>(postings.len() as u32)?;
        for posting in postings {
            let doc_id = doc_index.get(&posting.doc_id).copied().unwrap_or(u32::MAX);
            buf.write_u32::<LittleEndian>(doc_id)?;
            buf.write_u32::<LittleEndian>(posting.term_frequency as u32)?;
        }
    }

    buf.write_u32::<LittleEndian>(doc_ids.len() as u32)?;
    for id in &doc_ids {
        let bytes = id.as_bytes();
        buf.write_u32::<LittleEndian>(bytes.len() as u32)?;
        buf.write_all(bytes)?;
    }

    Ok(buf)
}

pub fn deserialize(bytes: &[u8]) -> Result<BM25Engine> {
    let mut cursor = io::Cursor::new(bytes);
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(IndexError::from)?;
    if &magic != MAGIC {
        return Err(IndexError::ParseError {
            path: "bm25.idx".to_string(),
            message: "bad magic bytes".to_string(),
        });
    }
    let _version = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)?;
    let k1 = cursor.read_f32::<LittleEndian>().map_err(IndexError::from)?;
    let b = cursor.read_f32::<LittleEndian>().map_err(IndexError::from)?;
    let avg_doc_length = cursor.read_f32::<LittleEndian>().map_err(IndexError::from)?;
    let total_docs = cursor.read_u64::<LittleEndian>().map_err(IndexError::from)? as usize;

    let term_count = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)?;
    let mut inverted_index = HashMap::new();
    let mut term_frequencies = HashMap::new();
    let mut raw_postings: Vec<(String, Vec<(u32, u32)>)> = Vec::with_capacity(term_count as usize);
    for _ in 0..term_count {
        let token_len = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)? as usize;
        let mut token_bytes = vec![0u8; token_len];
        cursor.read_exact(&mut token_bytes).map_err(IndexError::from)?;
        let token = String::from_utf8(token_bytes).map_err(|e| IndexError::ParseError {
            path: "bm25.idx".to_string(),
            message: e.to_string(),
        })?;
        let postings_len = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)?;
        let mut postings = Vec::with_capacity(postings_len as usize);
        for _ in 0..postings_len {
            let doc_id = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)?;
            let tf = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)?;
            postings.push((doc_id, tf));
        }
        raw_postings.push((token, postings));
    }

    let doc_count = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)?;
    let mut doc_ids = Vec::with_capacity(doc_count as usize);
    for _ in 0..doc_count {
        let len = cursor.read_u32::<LittleEndian>().map_err(IndexError::from)? as usize;
        let mut bytes = vec![0u8; len];
        cursor.read_exact(&mut bytes).map_err(IndexError::from)?;
        doc_ids.push(String::from_utf8(bytes).map_err(|e| IndexError::ParseError {
            path: "bm25.idx".to_string(),
            message: e.to_string(),
        })?);
    }

    let mut document_lengths = HashMap::new();
    for (token, postings) in raw_postings {
        let mut doc_terms = Vec::with_capacity(postings.len());
        for (doc_idx, tf) in &postings {
            let Some(doc_id) = doc_ids.get(*doc_idx as usize) else {
                continue;
            };
            doc_terms.push(DocumentTerm {
                doc_id: doc_id.clone(),
                term_frequency: *tf as usize,
            });
        }
        term_frequencies.insert(
            token.clone(),
            TermStats {
                document_frequency: doc_terms.len(),
                total_frequency: doc_terms.iter().map(|d| d.term_frequency).sum(),
            },
        );
        inverted_index.insert(token, doc_terms);
    }

    for doc_id in &doc_ids {
        let length = inverted_index
            .values()
            .flatten()
            .filter(|d| &d.doc_id == doc_id)
            .map(|d| d.term_frequency)
            .sum();
        document_lengths.insert(doc_id.clone(), length);
    }

    Ok(BM25Engine {
        k1,
        b,
        total_docs,
        avg_doc_length,
        term_frequencies,
        document_lengths,
        inverted_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn higher_term_frequency_scores_higher() {
        let mut engine = BM25Engine::new();
        engine.upsert("doc1", &tokens(&["quick", "brown", "fox"]));
        engine.upsert("doc2", &tokens(&["quick", "quick", "dog"]));
        let results = engine.search_raw(&tokens(&["quick"]), 10);
        assert_eq!(results[0].doc_id, "doc2");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn upsert_then_delete_restores_prior_state() {
        let mut engine = BM25Engine::new();
        engine.upsert("doc1", &tokens(&["alpha", "beta"]));
        let before = serialize(&engine).unwrap();
        engine.upsert("doc2", &tokens(&["gamma"]));
        engine.delete("doc2");
        let after = serialize(&engine).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn serialize_round_trips() {
        let mut engine = BM25Engine::new();
        engine.upsert("a.rs:0", &tokens(&["fn", "getUserName", "user"]));
        engine.upsert("b.rs:0", &tokens(&["struct", "User"]));
        let bytes = serialize(&engine).unwrap();
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(restored.total_docs, engine.total_docs);
        assert_eq!(restored.document_lengths, engine.document_lengths);
    }

    #[test]
    fn camel_case_splits_but_keeps_original() {
        let toks = tokenize("getUserName");
        assert!(toks.contains(&"getusername".to_string()));
        assert!(toks.contains(&"get".to_string()));
        assert!(toks.contains(&"user".to_string()));
        assert!(toks.contains(&"name".to_string()));
    }

    #[test]
    fn index_normalizes_scores_into_unit_range() {
        let mut index = BM25Index::new();
        index.upsert("proj", "a", &tokens(&["fox", "fox"]));
        index.upsert("proj", "b", &tokens(&["fox"]));
        let results = index.query("proj", &tokens(&["fox"]), 10);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results.iter().all(|m| m.score <= 1.0 && m.score >= 0.0));
    }

    #[test]
    fn empty_query_on_missing_collection_is_empty() {
        let index = BM25Index::new();
        assert!(index.query("missing", &tokens(&["x"]), 10).is_empty());
    }
}
