//! Language identification.
//!
//! This module provides:
//! - Language detection from file names, extensions and shebangs
//! - Language family detection from raw content

pub mod family;
pub mod language;

pub use family::{
    detect_language_family, detect_language_family_sync, family_characteristics, FamilyScore,
    LanguageFamily, DEFAULT_FAMILY_MIN_CONFIDENCE,
};
pub use language::Language;
