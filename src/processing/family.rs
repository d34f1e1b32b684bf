//! Language family detection from code samples.
//!
//! Families group languages with similar delimiter conventions. Detection
//! counts characteristic delimiters per family, weights each one by how
//! distinctive it is (shared delimiters count for less) and picks the best
//! scoring family. The detector is CPU-bound, so the async entry point runs
//! it on the blocking pool.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Language;

/// Default minimum number of matched delimiters to accept a family.
pub const DEFAULT_FAMILY_MIN_CONFIDENCE: usize = 3;

/// Major language family classifications based on syntax patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageFamily {
    CStyle,
    PythonStyle,
    MlStyle,
    LispStyle,
    MarkupStyle,
    ShellStyle,
    FunctionalStyle,
    LatexStyle,
    RubyStyle,
    MatlabStyle,
    Unknown,
}

impl LanguageFamily {
    const DETECTABLE: [LanguageFamily; 10] = [
        LanguageFamily::CStyle,
        LanguageFamily::PythonStyle,
        LanguageFamily::MlStyle,
        LanguageFamily::LispStyle,
        LanguageFamily::MarkupStyle,
        LanguageFamily::ShellStyle,
        LanguageFamily::FunctionalStyle,
        LanguageFamily::LatexStyle,
        LanguageFamily::RubyStyle,
        LanguageFamily::MatlabStyle,
    ];

    /// Deterministic family for a known language.
    pub fn from_language(language: Language) -> Self {
        match language {
            Language::C
            | Language::Cpp
            | Language::CSharp
            | Language::Java
            | Language::JavaScript
            | Language::TypeScript
            | Language::Go
            | Language::Rust
            | Language::Swift
            | Language::Kotlin
            | Language::Scala
            | Language::Php
            | Language::Css => LanguageFamily::CStyle,
            Language::Python => LanguageFamily::PythonStyle,
            Language::Html | Language::Xml | Language::JavaScriptReact | Language::TypeScriptReact => {
                LanguageFamily::MarkupStyle
            }
            Language::Shell => LanguageFamily::ShellStyle,
            Language::Ruby => LanguageFamily::RubyStyle,
            _ => LanguageFamily::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageFamily::CStyle => "c_style",
            LanguageFamily::PythonStyle => "python_style",
            LanguageFamily::MlStyle => "ml_style",
            LanguageFamily::LispStyle => "lisp_style",
            LanguageFamily::MarkupStyle => "markup_style",
            LanguageFamily::ShellStyle => "shell_style",
            LanguageFamily::FunctionalStyle => "functional_style",
            LanguageFamily::LatexStyle => "latex_style",
            LanguageFamily::RubyStyle => "ruby_style",
            LanguageFamily::MatlabStyle => "matlab_style",
            LanguageFamily::Unknown => "unknown",
        }
    }

    fn delimiters(&self) -> &'static [&'static str] {
        match self {
            LanguageFamily::CStyle => &[
                "{", "}", "/*", "*/", "//", ";\n", "function ", "struct ", "class ", "return ",
                "if (", "for (", "while (", "switch (", "=>",
            ],
            LanguageFamily::PythonStyle => &[
                "def ", "class ", "import ", "from ", "elif ", "\"\"\"", "lambda ", "self.",
                "__init__", "):\n", "return ",
            ],
            LanguageFamily::MlStyle => &[
                "let ", "(*", "*)", "match ", " with\n", "->", "|>", "fun ", "type ", " rec ",
                ";;",
            ],
            LanguageFamily::LispStyle => &["(defun ", "(define ", "(let ", "(lambda ", "(setq ", "'(", ";;", "(if ", "(cond "],
            LanguageFamily::MarkupStyle => &["</", "/>", "<!--", "-->", "<div", "<span", "class=\"", "<!DOCTYPE"],
            LanguageFamily::ShellStyle => &["#!/bin/", "fi\n", "done\n", "esac", "then\n", "$(", "${", "echo ", "export "],
            LanguageFamily::FunctionalStyle => &["::", "->", "where\n", "data ", "module ", "import ", "{-", "-}", "<-", "case "],
            LanguageFamily::LatexStyle => &["\\begin{", "\\end{", "\\section", "\\usepackage", "\\documentclass", "$$", "\\label{"],
            LanguageFamily::RubyStyle => &["def ", "end\n", "do |", "elsif ", "require ", "module ", "puts ", "attr_accessor", "@"],
            LanguageFamily::MatlabStyle => &["function ", "end\n", "%{", "%}", "elseif ", "disp(", "zeros(", "plot("],
            LanguageFamily::Unknown => &[],
        }
    }
}

lazy_static! {
    /// How many families share each delimiter.
    static ref DELIMITER_SHARE: HashMap<&'static str, usize> = {
        let mut share = HashMap::new();
        for family in LanguageFamily::DETECTABLE {
            for delimiter in family.delimiters() {
                *share.entry(*delimiter).or_insert(0) += 1;
            }
        }
        share
    };
}

/// Per-family detection scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilyScore {
    pub family: LanguageFamily,
    /// Number of characteristic delimiters present
    pub matches: usize,
    /// Matches weighted by delimiter distinctiveness
    pub weighted_score: f64,
    /// Fraction of the family's delimiters that matched
    pub confidence: f64,
}

/// Score every detectable family against a code sample.
pub fn family_characteristics(content: &str) -> Vec<FamilyScore> {
    LanguageFamily::DETECTABLE
        .iter()
        .map(|&family| {
            let delimiters = family.delimiters();
            let mut matches = 0;
            let mut weighted_score = 0.0;
            for delimiter in delimiters {
                if content.contains(delimiter) {
                    matches += 1;
                    let share = DELIMITER_SHARE.get(delimiter).copied().unwrap_or(1).max(1);
                    weighted_score += 1.0 / share as f64;
                }
            }
            FamilyScore {
                family,
                matches,
                weighted_score,
                confidence: matches as f64 / delimiters.len().max(1) as f64,
            }
        })
        .collect()
}

/// Detect the language family of a code sample.
///
/// Returns [`LanguageFamily::Unknown`] when the winning family matched fewer
/// than `min_confidence` delimiters.
pub fn detect_language_family_sync(content: &str, min_confidence: usize) -> LanguageFamily {
    let mut best: Option<FamilyScore> = None;

    for score in family_characteristics(content) {
        let better = match &best {
            None => true,
            Some(current) => {
                if score.weighted_score > current.weighted_score + 0.001 {
                    true
                } else if (score.weighted_score - current.weighted_score).abs() <= 0.001 {
                    score.matches > current.matches
                        || (score.matches == current.matches && score.confidence > current.confidence)
                } else {
                    false
                }
            }
        };
        if better {
            best = Some(score);
        }
    }

    match best {
        Some(score) if score.matches >= min_confidence => {
            debug!(family = score.family.as_str(), matches = score.matches, "Detected language family");
            score.family
        }
        _ => LanguageFamily::Unknown,
    }
}

/// Detect the language family without blocking the async scheduler.
pub async fn detect_language_family(content: String, min_confidence: usize) -> LanguageFamily {
    tokio::task::spawn_blocking(move || detect_language_family_sync(&content, min_confidence))
        .await
        .unwrap_or(LanguageFamily::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_c_style() {
        let code = "int main(void) {\n    /* entry */\n    for (int i = 0; i < 3; i++) {\n        return 0;\n    }\n}\n";
        assert_eq!(detect_language_family_sync(code, 3), LanguageFamily::CStyle);
    }

    #[test]
    fn test_detects_python_style() {
        let code = "class Greeter:\n    def __init__(self):\n        self.name = 'x'\n\n    def greet(self):\n        return self.name\n";
        assert_eq!(detect_language_family_sync(code, 3), LanguageFamily::PythonStyle);
    }

    #[test]
    fn test_below_min_confidence_is_unknown() {
        assert_eq!(detect_language_family_sync("hello world", 3), LanguageFamily::Unknown);
        assert_eq!(detect_language_family_sync("", 1), LanguageFamily::Unknown);
    }

    #[test]
    fn test_distinctive_delimiters_weigh_more() {
        let scores = family_characteristics("\\begin{document}\\end{document}");
        let latex = scores.iter().find(|s| s.family == LanguageFamily::LatexStyle).unwrap();
        assert_eq!(latex.matches, 2);
        assert!((latex.weighted_score - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_language() {
        assert_eq!(LanguageFamily::from_language(Language::Rust), LanguageFamily::CStyle);
        assert_eq!(LanguageFamily::from_language(Language::Ruby), LanguageFamily::RubyStyle);
        assert_eq!(LanguageFamily::from_language(Language::Unknown), LanguageFamily::Unknown);
    }

    #[tokio::test]
    async fn test_async_detection_matches_sync() {
        let code = "#!/bin/bash\nif [ -f x ]; then\n  echo ${HOME}\nfi\n";
        let expected = detect_language_family_sync(code, 3);
        let detected = detect_language_family(code.to_string(), 3).await;
        assert_eq!(detected, expected);
        assert_eq!(detected, LanguageFamily::ShellStyle);
    }
}
