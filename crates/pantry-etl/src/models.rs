// Pantry ETL Data Models

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Raw Document
// ============================================================================

/// A raw product payload as persisted by the collection stage.
///
/// The store assigns `id`; `content_hash` is the order-independent
/// fingerprint of `payload` and is unique within the raw collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: i64,
    pub source: String,
    pub fetched_at: String,
    pub content_hash: String,
    pub payload: Value,
}

impl RawDocument {
    /// The identity enriched records reference, as a string key
    pub fn raw_id(&self) -> String {
        self.id.to_string()
    }
}

// ============================================================================
// Enrichment Status
// ============================================================================

/// Outcome of the enrichment transform for one raw document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Success,
    Failed,
    Pending,
}

impl EnrichmentStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "success" => Ok(EnrichmentStatus::Success),
            "failed" => Ok(EnrichmentStatus::Failed),
            "pending" => Ok(EnrichmentStatus::Pending),
            _ => Err(format!("Unknown enrichment status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Success => "success",
            EnrichmentStatus::Failed => "failed",
            EnrichmentStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Enriched Record
// ============================================================================

/// Terminal error carried by a failed enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentFailure {
    /// Categorical error name (e.g., "invalid_payload")
    pub kind: String,
    /// Human-readable detail
    pub message: String,
}

/// One enrichment outcome per raw document, upserted by `raw_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Identity of the source raw document
    pub raw_id: String,

    pub status: EnrichmentStatus,

    /// UTC timestamp (ISO-8601, "Z" suffix) of this enrichment
    pub enriched_at: Option<String>,

    /// Derived product facts; present only on success
    pub data: Option<ProductFacts>,

    /// Terminal error; present only on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnrichmentFailure>,
}

impl EnrichedRecord {
    /// Build a successful record stamped with the current UTC time
    pub fn success(raw_id: String, data: ProductFacts) -> Self {
        EnrichedRecord {
            raw_id,
            status: EnrichmentStatus::Success,
            enriched_at: Some(now_iso8601()),
            data: Some(data),
            error: None,
        }
    }

    /// Build a terminally failed record carrying the error kind and message
    pub fn failed(raw_id: String, kind: String, message: String) -> Self {
        EnrichedRecord {
            raw_id,
            status: EnrichmentStatus::Failed,
            enriched_at: Some(now_iso8601()),
            data: None,
            error: Some(EnrichmentFailure { kind, message }),
        }
    }
}

/// Current UTC time as ISO-8601 with a "Z" suffix
pub fn now_iso8601() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

// ============================================================================
// Product Facts
// ============================================================================

/// The derived payload of a successful enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFacts {
    /// Barcode; the sole business key for relational upserts
    pub code: String,

    pub product_name: String,

    pub brand_name: String,

    /// Normalized display category, or "Uncategorized"
    pub category_name: String,

    /// Combined nutriscore/completeness score, 0-100
    pub quality_score: i64,

    /// One of a-e, or "" when unknown
    pub nutriscore_grade: String,

    /// Food processing classification, 1-4
    pub nova_group: Option<i64>,

    pub image_url: Option<String>,

    pub nutrition: Option<NutritionPer100g>,
}

/// Per-100g nutrient values; absent and null are both `None`, never zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionPer100g {
    pub energy_kcal: Option<f64>,
    pub fat: Option<f64>,
    pub saturated_fat: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub sugars: Option<f64>,
    pub fiber: Option<f64>,
    pub proteins: Option<f64>,
    pub salt: Option<f64>,
}

impl NutritionPer100g {
    /// True when no nutrient field is populated
    pub fn is_empty(&self) -> bool {
        self.energy_kcal.is_none()
            && self.fat.is_none()
            && self.saturated_fat.is_none()
            && self.carbohydrates.is_none()
            && self.sugars.is_none()
            && self.fiber.is_none()
            && self.proteins.is_none()
            && self.salt.is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trip() {
        for status in [
            EnrichmentStatus::Success,
            EnrichmentStatus::Failed,
            EnrichmentStatus::Pending,
        ] {
            assert_eq!(EnrichmentStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(EnrichmentStatus::from_str("unknown").is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(EnrichmentStatus::Success).unwrap(),
            json!("success")
        );
    }

    #[test]
    fn test_raw_id_is_stringified_store_id() {
        let doc = RawDocument {
            id: 42,
            source: "openfoodfacts".to_string(),
            fetched_at: now_iso8601(),
            content_hash: "0".repeat(64),
            payload: json!({}),
        };
        assert_eq!(doc.raw_id(), "42");
    }

    #[test]
    fn test_failed_record_has_error_and_no_data() {
        let record = EnrichedRecord::failed(
            "1".to_string(),
            "invalid_payload".to_string(),
            "payload is not a JSON object".to_string(),
        );
        assert_eq!(record.status, EnrichmentStatus::Failed);
        assert!(record.data.is_none());
        assert_eq!(record.error.unwrap().kind, "invalid_payload");
    }

    #[test]
    fn test_nutrition_is_empty() {
        assert!(NutritionPer100g::default().is_empty());

        let partial = NutritionPer100g {
            salt: Some(0.1),
            ..Default::default()
        };
        assert!(!partial.is_empty());
    }

    #[test]
    fn test_timestamp_has_z_suffix() {
        let ts = now_iso8601();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }
}
