// caseforge-clients/src/profile.rs
// ============================================================================
// Module: Mock Profile Client
// Description: Deterministic stand-in for a witness-statement attribute
//              extraction vendor.
// Purpose: Implement ProfileClient without a network dependency.
// Dependencies: async-trait, caseforge-core
// ============================================================================

//! ## Overview
//! Extracts attributes by keyword matching against each statement's
//! content, lower-cased. This is obviously not an LLM, but it exercises
//! the same shape the real extraction would: zero or more attribute
//! fields set, each carrying a confidence derived from the witness's
//! reported credibility.

use async_trait::async_trait;
use caseforge_core::domain::profile::AttributeValue;
use caseforge_core::domain::profile::DistinctiveFeature;
use caseforge_core::domain::profile::HairAttribute;
use caseforge_core::domain::profile::SuspectAttributes;
use caseforge_core::interfaces::clients::ProfileClient;
use caseforge_core::interfaces::clients::WitnessStatementInput;
use caseforge_core::ClientError;

use crate::common::FailureTriggers;

/// Deterministic [`ProfileClient`] mock.
pub struct MockProfileClient {
    triggers: FailureTriggers,
}

impl MockProfileClient {
    /// Builds a mock with no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self { triggers: FailureTriggers::new() }
    }

    /// Builds a mock with a custom failure-trigger table, scanned against
    /// each statement's content.
    #[must_use]
    pub fn with_triggers(triggers: FailureTriggers) -> Self {
        Self { triggers }
    }
}

impl Default for MockProfileClient {
    fn default() -> Self {
        Self::new()
    }
}

fn value_if_any_keyword(content: &str, confidence: f64, pairs: &[(&str, &str)]) -> Option<AttributeValue> {
    pairs.iter().find(|(keyword, _)| content.contains(keyword)).map(|(_, value)| AttributeValue {
        value: serde_json::Value::String((*value).to_string()),
        confidence,
        supporting_sources: Vec::new(),
        conflicting_sources: Vec::new(),
    })
}

fn extract_one(statement: &WitnessStatementInput) -> SuspectAttributes {
    let content = statement.content.to_lowercase();
    let confidence = statement.credibility.clamp(0.0, 1.0);

    let age_range = value_if_any_keyword(&content, confidence, &[("young", "18-30"), ("middle-aged", "35-50"), ("elderly", "60+")]);
    let height_range_cm = value_if_any_keyword(&content, confidence, &[("tall", "180-195"), ("short", "155-165"), ("average height", "165-180")]);
    let build = value_if_any_keyword(&content, confidence, &[("athletic", "athletic"), ("stocky", "stocky"), ("slim", "slim"), ("heavyset", "heavy")]);
    let skin_tone = value_if_any_keyword(&content, confidence, &[("light skin", "light"), ("dark skin", "dark"), ("olive skin", "olive")]);
    let hair_color = value_if_any_keyword(&content, confidence, &[("blonde hair", "blonde"), ("dark hair", "dark"), ("red hair", "red"), ("gray hair", "gray")]);
    let hair_style = value_if_any_keyword(&content, confidence, &[("short hair", "short"), ("long hair", "long"), ("curly hair", "curly")]);
    let facial_hair = value_if_any_keyword(&content, confidence, &[("beard", "beard"), ("mustache", "mustache"), ("clean-shaven", "none")]);
    let glasses = value_if_any_keyword(&content, confidence, &[("wearing glasses", "yes"), ("no glasses", "no")]);

    let mut distinctive_features = Vec::new();
    for (keyword, description) in [("scar", "visible scar"), ("tattoo", "visible tattoo"), ("limp", "noticeable limp")] {
        if content.contains(keyword) {
            distinctive_features.push(DistinctiveFeature { description: description.to_string(), confidence, supporting_sources: Vec::new() });
        }
    }

    SuspectAttributes {
        age_range,
        height_range_cm,
        build,
        skin_tone,
        hair: HairAttribute { color: hair_color, style: hair_style },
        facial_hair,
        glasses,
        distinctive_features,
    }
}

#[async_trait]
impl ProfileClient for MockProfileClient {
    async fn extract_profile(&self, statements: Vec<WitnessStatementInput>, existing: Option<SuspectAttributes>) -> Result<SuspectAttributes, ClientError> {
        if statements.is_empty() {
            return Err(ClientError::InvalidInput("statements must be non-empty".to_string()));
        }
        for statement in &statements {
            if let Some(error) = self.triggers.check(&statement.content) {
                return Err(error);
            }
        }

        let extracted = statements.iter().map(extract_one).fold(SuspectAttributes::default(), |acc, next| acc.merge(&next));
        Ok(match existing {
            Some(existing) => existing.merge(&extracted),
            None => extracted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(content: &str, credibility: f64) -> WitnessStatementInput {
        WitnessStatementInput { source_name: "witness-1".to_string(), content: content.to_string(), credibility }
    }

    #[tokio::test]
    async fn extract_profile_rejects_empty_statements() {
        let client = MockProfileClient::new();
        let result = client.extract_profile(Vec::new(), None).await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn extract_profile_matches_keywords_in_content() {
        let client = MockProfileClient::new();
        let attributes = client
            .extract_profile(vec![statement("a tall man with a visible scar and a beard", 0.8)], None)
            .await
            .expect("extraction succeeds");
        assert_eq!(attributes.height_range_cm.expect("height detected").value, serde_json::json!("180-195"));
        assert_eq!(attributes.facial_hair.expect("facial hair detected").value, serde_json::json!("beard"));
        assert_eq!(attributes.distinctive_features.len(), 1);
    }

    #[tokio::test]
    async fn extract_profile_merges_into_existing_attributes() {
        let client = MockProfileClient::new();
        let first = client.extract_profile(vec![statement("a tall man", 0.9)], None).await.expect("extraction succeeds");
        let second = client.extract_profile(vec![statement("wearing glasses", 0.7)], Some(first)).await.expect("extraction succeeds");
        assert!(second.height_range_cm.is_some());
        assert!(second.glasses.is_some());
    }
}
