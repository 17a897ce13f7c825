// caseforge-core/src/domain/profile.rs
// ============================================================================
// Module: Suspect Profile
// Description: The per-case merged suspect description and its merge rules.
// Purpose: Define SuspectProfile, SuspectAttributes, and the
//          higher-confidence-wins merge used by the profile pipeline.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A case has at most one [`SuspectProfile`], built incrementally from
//! witness statements. Merging is pure and pinned by tests: for scalar
//! attributes the higher-confidence value wins; for distinctive features,
//! the union keyed by description, averaging confidence on duplicates.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::identifiers::CaseId;
use crate::domain::identifiers::CommitId;

/// Minimum confidence an attribute must clear to count toward the
/// portrait-generation threshold.
pub const PORTRAIT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Minimum number of qualifying attributes required to trigger portrait
/// generation.
pub const PORTRAIT_ATTRIBUTE_COUNT: usize = 3;

/// A single attribute value with its confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// The attribute's value, generically typed (string, range, etc.).
    pub value: serde_json::Value,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Commits whose statements support this value.
    pub supporting_sources: Vec<CommitId>,
    /// Commits whose statements conflict with this value.
    pub conflicting_sources: Vec<CommitId>,
}

impl AttributeValue {
    /// Merges two observations of the same attribute by the
    /// higher-confidence-wins rule: the winner's value and confidence are
    /// kept; both sides' sources are unioned.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let (mut winner, loser) = if self.confidence >= other.confidence {
            (self.clone(), other)
        } else {
            (other.clone(), self)
        };
        for source in &loser.supporting_sources {
            if !winner.supporting_sources.contains(source) {
                winner.supporting_sources.push(source.clone());
            }
        }
        for source in &loser.conflicting_sources {
            if !winner.conflicting_sources.contains(source) {
                winner.conflicting_sources.push(source.clone());
            }
        }
        winner
    }
}

/// Hair description, color and style tracked independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HairAttribute {
    /// Hair color.
    pub color: Option<AttributeValue>,
    /// Hair style.
    pub style: Option<AttributeValue>,
}

impl HairAttribute {
    fn merge(&self, other: &Self) -> Self {
        Self {
            color: merge_optional(&self.color, &other.color),
            style: merge_optional(&self.style, &other.style),
        }
    }
}

/// A distinctive feature called out by one or more witnesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistinctiveFeature {
    /// Free-text description, used as the merge key.
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Commits whose statements support this feature.
    pub supporting_sources: Vec<CommitId>,
}

/// The attribute set extracted and merged from witness statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuspectAttributes {
    /// Estimated age range (e.g. `"30-40"`).
    pub age_range: Option<AttributeValue>,
    /// Estimated height range in centimeters.
    pub height_range_cm: Option<AttributeValue>,
    /// Build (e.g. `"athletic"`).
    pub build: Option<AttributeValue>,
    /// Skin tone.
    pub skin_tone: Option<AttributeValue>,
    /// Hair color and style.
    pub hair: HairAttribute,
    /// Facial hair description.
    pub facial_hair: Option<AttributeValue>,
    /// Whether the suspect was seen wearing glasses.
    pub glasses: Option<AttributeValue>,
    /// Distinctive features, keyed by description; order carries no meaning.
    pub distinctive_features: Vec<DistinctiveFeature>,
}

fn merge_optional(a: &Option<AttributeValue>, b: &Option<AttributeValue>) -> Option<AttributeValue> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(b)),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}

impl SuspectAttributes {
    /// Merges two attribute sets: scalar attributes by higher-confidence-wins,
    /// `distinctive_features` by union keyed on description with averaged
    /// confidence on duplicates.
    ///
    /// This operation is idempotent: `a.merge(&a) == a` for any `a` whose
    /// distinctive features have no internal duplicates, and
    /// `a.merge(&b).merge(&b) == a.merge(&b)`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut distinctive_features: Vec<DistinctiveFeature> = Vec::new();
        for feature in self.distinctive_features.iter().chain(other.distinctive_features.iter()) {
            if let Some(existing) = distinctive_features
                .iter_mut()
                .find(|f: &&mut DistinctiveFeature| f.description == feature.description)
            {
                existing.confidence = (existing.confidence + feature.confidence) / 2.0;
                for source in &feature.supporting_sources {
                    if !existing.supporting_sources.contains(source) {
                        existing.supporting_sources.push(source.clone());
                    }
                }
            } else {
                distinctive_features.push(feature.clone());
            }
        }

        Self {
            age_range: merge_optional(&self.age_range, &other.age_range),
            height_range_cm: merge_optional(&self.height_range_cm, &other.height_range_cm),
            build: merge_optional(&self.build, &other.build),
            skin_tone: merge_optional(&self.skin_tone, &other.skin_tone),
            hair: self.hair.merge(&other.hair),
            facial_hair: merge_optional(&self.facial_hair, &other.facial_hair),
            glasses: merge_optional(&self.glasses, &other.glasses),
            distinctive_features,
        }
    }

    /// Returns whether at least [`PORTRAIT_ATTRIBUTE_COUNT`] of
    /// `{age_range, build, hair, skin_tone}` clear
    /// [`PORTRAIT_CONFIDENCE_THRESHOLD`], per the portrait-generation trigger.
    #[must_use]
    pub fn meets_portrait_threshold(&self) -> bool {
        let hair_confidence = self
            .hair
            .color
            .as_ref()
            .or(self.hair.style.as_ref())
            .map_or(0.0, |a| a.confidence);
        let qualifies = |a: &Option<AttributeValue>| {
            a.as_ref().is_some_and(|v| v.confidence > PORTRAIT_CONFIDENCE_THRESHOLD)
        };
        let count = [
            qualifies(&self.age_range),
            qualifies(&self.build),
            hair_confidence > PORTRAIT_CONFIDENCE_THRESHOLD,
            qualifies(&self.skin_tone),
        ]
        .into_iter()
        .filter(|b| *b)
        .count();
        count >= PORTRAIT_ATTRIBUTE_COUNT
    }
}

/// The merged, per-case suspect description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspectProfile {
    /// The case this profile belongs to.
    pub case_id: CaseId,
    /// The commit id of the most recent `profile_update`, if any.
    pub last_commit_id: Option<CommitId>,
    /// The merged attribute set.
    pub attributes: SuspectAttributes,
    /// Storage key of the generated portrait image, once produced.
    pub portrait_asset_key: Option<String>,
    /// Last-modified timestamp.
    pub updated_at: OffsetDateTime,
}

impl SuspectProfile {
    /// An empty profile for a case with no witness statements yet.
    #[must_use]
    pub fn empty(case_id: CaseId, updated_at: OffsetDateTime) -> Self {
        Self {
            case_id,
            last_commit_id: None,
            attributes: SuspectAttributes::default(),
            portrait_asset_key: None,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(confidence: f64) -> AttributeValue {
        AttributeValue {
            value: serde_json::json!("athletic"),
            confidence,
            supporting_sources: vec![CommitId::new("c1")],
            conflicting_sources: Vec::new(),
        }
    }

    #[test]
    fn merge_keeps_higher_confidence_value() {
        let low = SuspectAttributes { build: Some(attr(0.3)), ..Default::default() };
        let high = SuspectAttributes { build: Some(attr(0.9)), ..Default::default() };
        let merged = low.merge(&high);
        assert_eq!(merged.build.unwrap().confidence, 0.9);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = SuspectAttributes { build: Some(attr(0.4)), ..Default::default() };
        let b = SuspectAttributes { build: Some(attr(0.8)), ..Default::default() };
        let once = a.merge(&b);
        let twice = once.merge(&b);
        assert_eq!(once, twice);
    }

    #[test]
    fn distinctive_features_union_and_average_duplicates() {
        let a = SuspectAttributes {
            distinctive_features: vec![DistinctiveFeature {
                description: "scar on left cheek".into(),
                confidence: 0.4,
                supporting_sources: vec![CommitId::new("c1")],
            }],
            ..Default::default()
        };
        let b = SuspectAttributes {
            distinctive_features: vec![
                DistinctiveFeature {
                    description: "scar on left cheek".into(),
                    confidence: 0.8,
                    supporting_sources: vec![CommitId::new("c2")],
                },
                DistinctiveFeature {
                    description: "tattoo on neck".into(),
                    confidence: 0.6,
                    supporting_sources: vec![CommitId::new("c2")],
                },
            ],
            ..Default::default()
        };
        let merged = a.merge(&b);
        assert_eq!(merged.distinctive_features.len(), 2);
        let scar = merged
            .distinctive_features
            .iter()
            .find(|f| f.description == "scar on left cheek")
            .unwrap();
        assert_eq!(scar.confidence, 0.6);
        assert_eq!(scar.supporting_sources.len(), 2);
    }

    #[test]
    fn portrait_threshold_requires_three_qualifying_attributes() {
        let attrs = SuspectAttributes {
            age_range: Some(attr(0.9)),
            build: Some(attr(0.8)),
            skin_tone: Some(attr(0.2)),
            hair: HairAttribute { color: Some(attr(0.7)), style: None },
            ..Default::default()
        };
        assert!(attrs.meets_portrait_threshold());

        let below = SuspectAttributes { age_range: Some(attr(0.9)), ..Default::default() };
        assert!(!below.meets_portrait_threshold());
    }
}
