//! Evidence-weighted classification results and their aggregation.
//!
//! A result's confidence is derived, never stored:
//! `clamp(0, 1, (sum of evidence weights + adjustment) / 100)`.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::classes::{ImportanceRank, SemanticClass};

/// Ranked signal types used to compute confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Heuristic,
    SimpleNamePattern,
    Language,
    Connections,
    Categories,
    Roles,
    SpecificThing,
    Purpose,
}

impl EvidenceKind {
    pub fn weight(&self) -> i32 {
        match self {
            EvidenceKind::Heuristic => 10,
            EvidenceKind::SimpleNamePattern => 20,
            EvidenceKind::Language => 30,
            EvidenceKind::Connections => 65,
            EvidenceKind::Categories => 80,
            EvidenceKind::Roles => 85,
            EvidenceKind::SpecificThing => 90,
            EvidenceKind::Purpose => 95,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Heuristic => "heuristic",
            EvidenceKind::SimpleNamePattern => "simple_name_pattern",
            EvidenceKind::Language => "language",
            EvidenceKind::Connections => "connections",
            EvidenceKind::Categories => "categories",
            EvidenceKind::Roles => "roles",
            EvidenceKind::SpecificThing => "specific_thing",
            EvidenceKind::Purpose => "purpose",
        }
    }
}

/// Which phase produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    KnownException,
    Anywhere,
    TokenPurpose,
    Category,
    ConnectionInference,
    Positional,
    RegistryMapping,
    PatternMatch,
}

impl ClassificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMethod::KnownException => "known_exception",
            ClassificationMethod::Anywhere => "anywhere",
            ClassificationMethod::TokenPurpose => "token_purpose",
            ClassificationMethod::Category => "category",
            ClassificationMethod::ConnectionInference => "connection_inference",
            ClassificationMethod::Positional => "positional",
            ClassificationMethod::RegistryMapping => "registry_mapping",
            ClassificationMethod::PatternMatch => "pattern_match",
        }
    }

    /// Whether the result came from the language extension layer.
    pub fn is_extension(&self) -> bool {
        matches!(self, ClassificationMethod::RegistryMapping | ClassificationMethod::PatternMatch)
    }
}

pub type EvidenceSet = BTreeSet<EvidenceKind>;

/// Outcome of classifying one node kind. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    classification: SemanticClass,
    method: ClassificationMethod,
    evidence: EvidenceSet,
    adjustment: i32,
    alternates: HashMap<SemanticClass, EvidenceSet>,
}

impl ClassificationResult {
    pub fn new(
        classification: SemanticClass,
        method: ClassificationMethod,
        evidence: impl IntoIterator<Item = EvidenceKind>,
        adjustment: i32,
    ) -> Self {
        Self {
            classification,
            method,
            evidence: evidence.into_iter().collect(),
            adjustment,
            alternates: HashMap::new(),
        }
    }

    /// Build a result whose adjustment is chosen to land on `confidence`.
    pub fn with_target_confidence(
        classification: SemanticClass,
        method: ClassificationMethod,
        evidence: impl IntoIterator<Item = EvidenceKind>,
        confidence: f64,
    ) -> Self {
        let evidence: EvidenceSet = evidence.into_iter().collect();
        let adjustment = adjustment_for(&evidence, confidence);
        Self {
            classification,
            method,
            evidence,
            adjustment,
            alternates: HashMap::new(),
        }
    }

    pub fn classification(&self) -> SemanticClass {
        self.classification
    }

    pub fn rank(&self) -> ImportanceRank {
        self.classification.rank()
    }

    pub fn method(&self) -> ClassificationMethod {
        self.method
    }

    pub fn evidence(&self) -> &EvidenceSet {
        &self.evidence
    }

    pub fn adjustment(&self) -> i32 {
        self.adjustment
    }

    pub fn alternates(&self) -> &HashMap<SemanticClass, EvidenceSet> {
        &self.alternates
    }

    pub fn evidence_weight(&self) -> i32 {
        self.evidence.iter().map(EvidenceKind::weight).sum()
    }

    /// Strongest single piece of evidence, used to break confidence ties.
    fn strongest_evidence(&self) -> i32 {
        self.evidence.iter().map(EvidenceKind::weight).max().unwrap_or(0)
    }

    pub fn confidence(&self) -> f64 {
        ((self.evidence_weight() + self.adjustment) as f64 / 100.0).clamp(0.0, 1.0)
    }

    pub fn is_high_confidence(&self) -> bool {
        self.confidence() >= 0.8
    }

    pub fn is_reliable(&self) -> bool {
        self.confidence() >= 0.6
    }

    /// A copy with a different confidence, keeping evidence and alternates.
    pub fn rescored(&self, confidence: f64) -> Self {
        Self {
            adjustment: adjustment_for(&self.evidence, confidence),
            ..self.clone()
        }
    }

    /// A copy carrying additional alternates.
    pub fn with_alternates(&self, alternates: impl IntoIterator<Item = (SemanticClass, EvidenceSet)>) -> Self {
        let mut result = self.clone();
        for (class, evidence) in alternates {
            if class != result.classification {
                result.alternates.entry(class).or_default().extend(evidence);
            }
        }
        result
    }
}

fn adjustment_for(evidence: &EvidenceSet, confidence: f64) -> i32 {
    let weight: i32 = evidence.iter().map(EvidenceKind::weight).sum();
    (confidence * 100.0).round() as i32 - weight
}

/// Penalty threshold for the mean tier distance between candidates.
const DISPARITY_THRESHOLD: f64 = 5.0;

/// Combine candidates from every phase into one result.
///
/// The highest-confidence candidate wins (ties go to the strongest single
/// evidence, then to the earlier phase). Candidates agreeing with the winner
/// merge their evidence; the adjustment is then reinforced when all
/// candidates share a tier, or penalized when the mean tier distance from
/// the winner reaches [`DISPARITY_THRESHOLD`]. Disagreeing candidates become
/// alternates.
pub fn aggregate(candidates: Vec<ClassificationResult>) -> Option<ClassificationResult> {
    let mut winner_idx = 0;
    for (idx, candidate) in candidates.iter().enumerate().skip(1) {
        let best = &candidates[winner_idx];
        let better = candidate.confidence() > best.confidence()
            || (candidate.confidence() == best.confidence()
                && candidate.strongest_evidence() > best.strongest_evidence());
        if better {
            winner_idx = idx;
        }
    }
    let winner = candidates.get(winner_idx)?;

    let others: Vec<&ClassificationResult> = candidates
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != winner_idx)
        .map(|(_, c)| c)
        .collect();

    let mut result = winner.clone();
    let agreeing: Vec<&&ClassificationResult> = others
        .iter()
        .filter(|c| c.classification == winner.classification)
        .collect();

    if !agreeing.is_empty() {
        for candidate in &agreeing {
            result.evidence.extend(candidate.evidence.iter().copied());
        }

        let same_rank = others.iter().all(|c| c.rank() == winner.rank());
        if same_rank {
            result.adjustment += 10;
        } else {
            let winner_tier = f64::from(winner.rank().tier());
            let disparity = others
                .iter()
                .map(|c| (f64::from(c.rank().tier()) - winner_tier).abs())
                .sum::<f64>()
                / others.len() as f64;
            if disparity >= DISPARITY_THRESHOLD {
                let penalty = (5.0 * disparity - 5.0).max(5.0).round() as i32;
                result.adjustment -= penalty;
            }
        }
    }

    let alternates: Vec<(SemanticClass, EvidenceSet)> = others
        .iter()
        .filter(|c| c.classification != winner.classification)
        .map(|c| (c.classification, c.evidence.clone()))
        .collect();
    Some(result.with_alternates(alternates))
}
