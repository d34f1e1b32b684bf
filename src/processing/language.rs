//! Programming language identification.
//!
//! Languages are identified from file extensions, well-known filenames and
//! shebang lines. The enum is the key used by the grammar registry, the
//! classifier memo and the extension layer.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    // Bundled grammars
    Python,
    JavaScript,
    JavaScriptReact,
    TypeScript,
    TypeScriptReact,
    Go,
    Rust,
    Java,
    C,
    Cpp,
    Ruby,

    // Grammars registered at runtime
    CSharp,
    Php,
    Kotlin,
    Swift,
    Scala,
    Html,
    Css,
    Shell,

    // Text-like
    Markdown,
    Json,
    Yaml,
    Toml,
    Xml,
    Sql,

    Unknown,
}

impl Language {
    /// Every language with a grammar bundled into the crate.
    pub const BUNDLED: [Language; 11] = [
        Language::Python,
        Language::JavaScript,
        Language::JavaScriptReact,
        Language::TypeScript,
        Language::TypeScriptReact,
        Language::Go,
        Language::Rust,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::Ruby,
    ];

    /// Get the tree-sitter grammar name for this language.
    pub fn tree_sitter_name(&self) -> Option<&'static str> {
        match self {
            Language::Python => Some("python"),
            Language::JavaScript | Language::JavaScriptReact => Some("javascript"),
            Language::TypeScript => Some("typescript"),
            Language::TypeScriptReact => Some("tsx"),
            Language::Go => Some("go"),
            Language::Rust => Some("rust"),
            Language::Java => Some("java"),
            Language::C => Some("c"),
            Language::Cpp => Some("cpp"),
            Language::Ruby => Some("ruby"),
            Language::CSharp => Some("c_sharp"),
            Language::Php => Some("php"),
            Language::Kotlin => Some("kotlin"),
            Language::Swift => Some("swift"),
            Language::Scala => Some("scala"),
            Language::Html => Some("html"),
            Language::Css => Some("css"),
            Language::Shell => Some("bash"),
            _ => None,
        }
    }

    /// Whether a grammar for this language ships with the crate.
    pub fn is_bundled(&self) -> bool {
        Self::BUNDLED.contains(self)
    }

    /// Whether this language uses JSX-flavored markup.
    pub fn is_jsx_family(&self) -> bool {
        matches!(
            self,
            Language::JavaScript
                | Language::JavaScriptReact
                | Language::TypeScript
                | Language::TypeScriptReact
        )
    }

    /// Get the language from a string identifier.
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "python" | "py" => Language::Python,
            "javascript" | "js" => Language::JavaScript,
            "jsx" => Language::JavaScriptReact,
            "typescript" | "ts" => Language::TypeScript,
            "tsx" => Language::TypeScriptReact,
            "go" | "golang" => Language::Go,
            "rust" | "rs" => Language::Rust,
            "java" => Language::Java,
            "c" => Language::C,
            "cpp" | "c++" | "cxx" => Language::Cpp,
            "ruby" | "rb" => Language::Ruby,
            "csharp" | "c#" | "cs" | "c_sharp" => Language::CSharp,
            "php" => Language::Php,
            "kotlin" | "kt" => Language::Kotlin,
            "swift" => Language::Swift,
            "scala" => Language::Scala,
            "html" | "htm" => Language::Html,
            "css" | "scss" | "less" => Language::Css,
            "shell" | "bash" | "sh" | "zsh" => Language::Shell,
            "markdown" | "md" => Language::Markdown,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "toml" => Language::Toml,
            "xml" => Language::Xml,
            "sql" => Language::Sql,
            _ => Language::Unknown,
        }
    }

    /// Get the language for a bare file extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" => Language::JavaScript,
            "jsx" => Language::JavaScriptReact,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::TypeScriptReact,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Language::Cpp,
            "rb" | "rake" => Language::Ruby,
            "cs" => Language::CSharp,
            "php" => Language::Php,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            "scala" | "sc" => Language::Scala,
            "html" | "htm" => Language::Html,
            "css" | "scss" | "less" => Language::Css,
            "sh" | "bash" | "zsh" => Language::Shell,
            "md" | "markdown" => Language::Markdown,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "toml" => Language::Toml,
            "xml" => Language::Xml,
            "sql" => Language::Sql,
            _ => Language::Unknown,
        }
    }

    /// Detect the language of a file from its name, extension or shebang.
    pub fn detect(path: &Path, content: Option<&str>) -> Self {
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        match filename {
            "Rakefile" | "Gemfile" => return Language::Ruby,
            "Dockerfile" | "Makefile" => return Language::Shell,
            _ => {}
        }

        let by_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);
        if by_ext != Language::Unknown {
            return by_ext;
        }

        content
            .and_then(|c| c.lines().next())
            .filter(|line| line.starts_with("#!"))
            .map(Self::from_shebang)
            .unwrap_or(Language::Unknown)
    }

    fn from_shebang(shebang: &str) -> Self {
        let lower = shebang.to_lowercase();
        if lower.contains("python") {
            Language::Python
        } else if lower.contains("node") || lower.contains("deno") {
            Language::JavaScript
        } else if lower.contains("ruby") {
            Language::Ruby
        } else if lower.contains("php") {
            Language::Php
        } else {
            Language::Shell
        }
    }

    /// Get a string representation of the language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::JavaScriptReact => "jsx",
            Language::TypeScript => "typescript",
            Language::TypeScriptReact => "tsx",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Ruby => "ruby",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Scala => "scala",
            Language::Html => "html",
            Language::Css => "css",
            Language::Shell => "shell",
            Language::Markdown => "markdown",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Xml => "xml",
            Language::Sql => "sql",
            Language::Unknown => "unknown",
        }
    }

    /// Human readable name, used in chunk titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::JavaScriptReact => "JSX",
            Language::TypeScript => "TypeScript",
            Language::TypeScriptReact => "TSX",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Ruby => "Ruby",
            Language::CSharp => "C#",
            Language::Php => "PHP",
            Language::Kotlin => "Kotlin",
            Language::Swift => "Swift",
            Language::Scala => "Scala",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Shell => "Shell",
            Language::Markdown => "Markdown",
            Language::Json => "JSON",
            Language::Yaml => "YAML",
            Language::Toml => "TOML",
            Language::Xml => "XML",
            Language::Sql => "SQL",
            Language::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_detection() {
        assert_eq!(Language::detect(Path::new("main.py"), None), Language::Python);
        assert_eq!(Language::detect(Path::new("app.jsx"), None), Language::JavaScriptReact);
        assert_eq!(Language::detect(Path::new("src/lib.rs"), None), Language::Rust);
        assert_eq!(Language::detect(Path::new("Button.tsx"), None), Language::TypeScriptReact);
    }

    #[test]
    fn test_filename_and_shebang_detection() {
        assert_eq!(Language::detect(Path::new("Rakefile"), None), Language::Ruby);
        assert_eq!(
            Language::detect(Path::new("script"), Some("#!/usr/bin/env python3\nprint(1)")),
            Language::Python
        );
        assert_eq!(
            Language::detect(Path::new("script"), Some("#!/bin/bash\necho hi")),
            Language::Shell
        );
        assert_eq!(Language::detect(Path::new("notes"), Some("hello")), Language::Unknown);
    }

    #[test]
    fn test_language_from_name() {
        assert_eq!(Language::from_name("python"), Language::Python);
        assert_eq!(Language::from_name("RUST"), Language::Rust);
        assert_eq!(Language::from_name("c++"), Language::Cpp);
        assert_eq!(Language::from_name("tsx"), Language::TypeScriptReact);
    }

    #[test]
    fn test_bundled_languages() {
        assert!(Language::Python.is_bundled());
        assert!(!Language::Php.is_bundled());
        assert!(Language::TypeScriptReact.is_jsx_family());
        assert!(!Language::Go.is_jsx_family());
    }
}
