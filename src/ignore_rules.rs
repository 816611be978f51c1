// Ignore-rule composition: default exclusions, per-directory
// .gitignore/.mcpignore files, and custom excludes. Built on the `ignore`
// crate's gitignore matcher, layering .mcpignore on top of .gitignore and a
// caller-supplied override set.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::overrides::{Override, OverrideBuilder};

use crate::error::{IndexError, Result};

/// Default exclusion globs for directories and file patterns that should
/// never be indexed.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules/**",
    ".git/**",
    "dist/**",
    "build/**",
    "coverage/**",
    ".next/**",
    ".nuxt/**",
    ".cache/**",
    "vendor/**",
    "__pycache__/**",
    "*.pyc",
    "target/**",
    "bin/**",
    "obj/**",
    "**/.env",
    "**/.env.*",
    "**/credentials.json",
    "**/secrets.json",
    "**/id_rsa",
    "**/id_rsa.pub",
    "**/id_ed25519",
    "**/id_ed25519.pub",
    "**/*.key",
    "**/*.pem",
    "**/*.p12",
];

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "py", "go", "rs", "java", "c", "cpp", "cc", "cxx", "h", "hpp",
    "ino", "md",
];

/// Composed ignore rule set for one scan root: default excludes, a walked
/// gitignore/mcpignore matcher, and custom excludes passed by the caller.
pub struct IgnoreRules {
    root: std::path::PathBuf,
    defaults: Override,
    custom: Override,
    extension_allowlist: Option<Vec<String>>,
}

impl IgnoreRules {
    pub fn new(
        root: &Path,
        custom_excludes: &[String],
        extension_allowlist: Option<Vec<String>>,
    ) -> Result<Self> {
        let mut defaults_builder = OverrideBuilder::new(root);
        for pattern in DEFAULT_EXCLUDES {
            defaults_builder
                .add(&format!("!{}", pattern))
                .map_err(|e| IndexError::InvalidParams {
                    message: format!("bad default exclude '{}': {}", pattern, e),
                })?;
        }
        let defaults = defaults_builder
            .build()
            .map_err(|e| IndexError::InvalidParams {
                message: format!("failed to build default excludes: {}", e),
            })?;

        let mut custom_builder = OverrideBuilder::new(root);
        for pattern in custom_excludes {
            custom_builder
                .add(&format!("!{}", pattern))
                .map_err(|e| IndexError::InvalidParams {
                    message: format!("bad custom exclude '{}': {}", pattern, e),
                })?;
        }
        let custom = custom_builder
            .build()
            .map_err(|e| IndexError::InvalidParams {
                message: format!("failed to build custom excludes: {}", e),
            })?;

        Ok(Self {
            root: root.to_path_buf(),
            defaults,
            custom,
            extension_allowlist,
        })
    }

    /// Loads `.gitignore` and `.mcpignore` from `dir` (if present), for the
    /// scanner's depth-first walk to accumulate per-directory.
    pub fn load_directory_ignores(dir: &Path) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(dir);
        let mut any = false;
        for name in [".gitignore", ".mcpignore"] {
            let path = dir.join(name);
            if path.is_file() {
                if builder.add(&path).is_none() {
                    any = true;
                }
            }
        }
        if any {
            builder.build().ok()
        } else {
            None
        }
    }

    /// True when `path` should be excluded from indexing, given the
    /// accumulated per-directory ignore chain from root to `path`'s parent.
    pub fn should_exclude(&self, path: &Path, is_dir: bool, chain: &[Gitignore]) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);

        if self.defaults.matched(rel, is_dir).is_whitelist() {
            return true;
        }
        if self.custom.matched(rel, is_dir).is_whitelist() {
            return true;
        }
        for gi in chain {
            if gi.matched(path, is_dir).is_ignore() {
                return true;
            }
        }
        false
    }

    /// True when `path`'s extension (or exact basename `platformio.ini`) is
    /// eligible for indexing.
    pub fn is_supported_file(&self, path: &Path) -> bool {
        if path.file_name().and_then(|n| n.to_str()) == Some("platformio.ini") {
            return true;
        }
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e,
            None => return false,
        };
        match &self.extension_allowlist {
            Some(allow) => allow.iter().any(|a| a.trim_start_matches('.') == ext),
            None => SUPPORTED_EXTENSIONS.contains(&ext),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn excludes_default_directories() {
        let tmp = TempDir::new().unwrap();
        let rules = IgnoreRules::new(tmp.path(), &[], None).unwrap();
        let node_modules = tmp.path().join("node_modules/x.js");
        assert!(rules.should_exclude(&node_modules, false, &[]));
    }

    #[test]
    fn supported_extension_allows_ts() {
        let tmp = TempDir::new().unwrap();
        let rules = IgnoreRules::new(tmp.path(), &[], None).unwrap();
        assert!(rules.is_supported_file(Path::new("src/a.ts")));
        assert!(rules.is_supported_file(Path::new("platformio.ini")));
        assert!(!rules.is_supported_file(Path::new("image.png")));
    }

    #[test]
    fn custom_exclude_is_respected() {
        let tmp = TempDir::new().unwrap();
        let rules = IgnoreRules::new(tmp.path(), &["scratch/**".to_string()], None).unwrap();
        assert!(rules.should_exclude(&tmp.path().join("scratch/x.ts"), false, &[]));
    }
}
