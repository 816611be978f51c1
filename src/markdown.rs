// Markdown structural extraction: a pure extraction stage (headings,
// code blocks, links, file-path references, images). Linking and scoring
// against code files live in doc_linker.rs. Built on pulldown-cmark.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub text: String,
    pub url: String,
    pub link_type: LinkType,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilePathRef {
    pub path: String,
    pub is_absolute: bool,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub alt: String,
    pub url: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownDocument {
    pub headings: Vec<Heading>,
    pub code_blocks: Vec<CodeBlock>,
    pub links: Vec<Link>,
    pub file_paths: Vec<FilePathRef>,
    pub images: Vec<Image>,
    /// Flattened prose + inline-code text, used by doc_linker's
    /// symbol-reference scoring leg.
    pub text_content: String,
}

pub struct MarkdownParser;

impl MarkdownParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source: &str) -> MarkdownDocument {
        let mut doc = MarkdownDocument::default();
        let parser = Parser::new_ext(source, Options::empty()).into_offset_iter();

        let mut heading_level: Option<HeadingLevel> = None;
        let mut heading_text = String::new();
        let mut code_lang: Option<String> = None;
        let mut code_text = String::new();
        let mut in_code_block = false;
        let mut code_start_line = 0u32;

        for (event, range) in parser {
            let line = line_of(source, range.start);
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    heading_level = Some(level);
                    heading_text.clear();
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(level) = heading_level.take() {
                        doc.headings.push(Heading {
                            level: heading_level_to_u8(level),
                            text: heading_text.trim().to_string(),
                            line,
                        });
                    }
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_text.clear();
                    code_start_line = line;
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    doc.code_blocks.push(CodeBlock {
                        language: code_lang.take(),
                        code: code_text.clone(),
                        start_line: code_start_line,
                        end_line: line_of(source, range.end),
                    });
                }
                Event::Start(Tag::Link { dest_url, .. }) => {
                    let link_type = classify_link(&dest_url);
                    doc.links.push(Link {
                        text: String::new(),
                        url: dest_url.to_string(),
                        link_type,
                        line,
                    });
                }
                Event::Start(Tag::Image { dest_url, .. }) => {
                    doc.images.push(Image {
                        alt: String::new(),
                        url: dest_url.to_string(),
                        line,
                    });
                }
                Event::Text(text) => {
                    if in_code_block {
                        code_text.push_str(&text);
                    } else if heading_level.is_some() {
                        heading_text.push_str(&text);
                        doc.text_content.push_str(&text);
                        doc.text_content.push(' ');
                    } else {
                        if let Some(last) = doc.links.last_mut() {
                            if last.text.is_empty() {
                                last.text = text.to_string();
                            }
                        }
                        if let Some(last) = doc.images.last_mut() {
                            if last.alt.is_empty() {
                                last.alt = text.to_string();
                            }
                        }
                        doc.text_content.push_str(&text);
                        doc.text_content.push(' ');
                    }
                }
                Event::Code(text) => {
                    doc.text_content.push_str(&text);
                    doc.text_content.push(' ');
                    if let Some(path_ref) = detect_file_path(&text, line) {
                        doc.file_paths.push(path_ref);
                    }
                }
                _ => {}
            }
        }

        doc
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn classify_link(url: &CowStr) -> LinkType {
    if url.starts_with("http://") || url.starts_with("https://") {
        LinkType::External
    } else {
        LinkType::Internal
    }
}

fn line_of(source: &str, byte_offset: usize) -> u32 {
    source[..byte_offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count() as u32
}

/// Detects an absolute or relative (containing `/`) path inside an inline
/// code span.
fn detect_file_path(text: &str, line: u32) -> Option<FilePathRef> {
    let candidate = text.trim();
    if candidate.is_empty() || candidate.contains(char::is_whitespace) {
        return None;
    }
    let is_absolute = candidate.starts_with('/');
    if is_absolute || candidate.contains('/') {
        Some(FilePathRef {
            path: candidate.to_string(),
            is_absolute,
            line,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_headings_and_code_blocks() {
        let source = "# Title\n\n```rust\nfn a() {}\n```\n";
        let doc = MarkdownParser::new().parse(source);
        assert_eq!(doc.headings.len(), 1);
        assert_eq!(doc.headings[0].text, "Title");
        assert_eq!(doc.code_blocks.len(), 1);
        assert_eq!(doc.code_blocks[0].language.as_deref(), Some("rust"));
    }

    #[test]
    fn external_link_is_classified() {
        let source = "[docs](https://example.com) and [local](./a.md)";
        let doc = MarkdownParser::new().parse(source);
        assert_eq!(doc.links[0].link_type, LinkType::External);
        assert_eq!(doc.links[1].link_type, LinkType::Internal);
    }

    #[test]
    fn detects_relative_file_path_in_inline_code() {
        let source = "see `src/lib.rs` for details";
        let doc = MarkdownParser::new().parse(source);
        assert_eq!(doc.file_paths.len(), 1);
        assert!(!doc.file_paths[0].is_absolute);
    }
}
