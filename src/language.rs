// Language detection from file extension/basename, pulled into its own
// enum so the parser and chunker can both consult the same mapping.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Go,
    Rust,
    Java,
    C,
    Cpp,
    Markdown,
}

impl Language {
    /// tree-sitter grammars report node kinds per-language; a handful of
    /// source constructs (e.g. Arduino's implicit `setup`/`loop`) need a
    /// special case even though they parse as plain C++.
    pub fn is_arduino_special(&self, path: &Path) -> bool {
        matches!(self, Language::Cpp)
            && path.extension().and_then(|e| e.to_str()) == Some("ino")
    }
}

/// Maps a file path to its `Language`, or `None` when the extension/basename
/// isn't one this crate indexes.
pub fn detect_language(path: &Path) -> Option<Language> {
    if path.file_name().and_then(|n| n.to_str()) == Some("platformio.ini") {
        return Some(Language::Cpp);
    }

    let ext = path.extension()?.to_str()?;
    let lang = match ext {
        "ts" | "tsx" => Language::TypeScript,
        "js" | "jsx" | "mjs" => Language::JavaScript,
        "py" => Language::Python,
        "go" => Language::Go,
        "rs" => Language::Rust,
        "java" => Language::Java,
        "c" | "h" => Language::C,
        "cpp" | "cc" | "cxx" | "hpp" | "ino" => Language::Cpp,
        "md" => Language::Markdown,
        _ => return None,
    };
    Some(lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_extensions() {
        assert_eq!(detect_language(Path::new("a.rs")), Some(Language::Rust));
        assert_eq!(detect_language(Path::new("a.tsx")), Some(Language::TypeScript));
        assert_eq!(detect_language(Path::new("a.mjs")), Some(Language::JavaScript));
        assert_eq!(detect_language(Path::new("a.ino")), Some(Language::Cpp));
        assert_eq!(detect_language(Path::new("platformio.ini")), Some(Language::Cpp));
        assert_eq!(detect_language(Path::new("README.md")), Some(Language::Markdown));
    }

    #[test]
    fn unsupported_extension_is_none() {
        assert_eq!(detect_language(Path::new("image.png")), None);
        assert_eq!(detect_language(Path::new("noextension")), None);
    }

    #[test]
    fn arduino_marker_only_for_ino() {
        let ino = Path::new("sketch.ino");
        let cpp = Path::new("main.cpp");
        assert!(Language::Cpp.is_arduino_special(ino));
        assert!(!Language::Cpp.is_arduino_special(cpp));
    }
}
