// Enrichment Engine
//
// Pure transform from one raw catalog payload to one enriched record:
// quality scoring, category normalization, image selection, and nutrition
// extraction. No network or storage I/O happens here; the only non-input
// dependency is the clock used for the `enriched_at` stamp.
//
// The engine never returns an error to the caller. Typed extraction failures
// are retried in a bounded loop and, once exhausted, converted into a
// terminal `failed` record carrying the error kind and message.

use crate::models::{EnrichedRecord, NutritionPer100g, ProductFacts, RawDocument};
use crate::{COMPLETENESS_COMPONENT_WEIGHT, DEFAULT_MAX_RETRIES, NUTRISCORE_COMPONENT_WEIGHT};
use serde_json::{Map, Value};
use tracing::debug;

/// Sentinel category when the payload carries no usable tag
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Candidate payload fields probed for a product image, in preference order
const IMAGE_FIELDS: [&str; 4] = [
    "image_front_small_url",
    "image_front_url",
    "image_url",
    "image_small_url",
];

/// Per-100g nutrient keys read from the nested `nutriments` object,
/// paired with the `NutritionPer100g` field they populate
const NUTRIMENT_KEYS: [&str; 8] = [
    "energy-kcal_100g",
    "fat_100g",
    "saturated-fat_100g",
    "carbohydrates_100g",
    "sugars_100g",
    "fiber_100g",
    "proteins_100g",
    "salt_100g",
];

/// Extraction failure inside the enrichment transform
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("payload is not a JSON object")]
    InvalidPayload,

    #[error("field `{field}` is not {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
    },
}

impl EnrichError {
    /// Categorical name persisted in the failed record
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichError::InvalidPayload => "invalid_payload",
            EnrichError::FieldType { .. } => "field_type",
        }
    }
}

/// Enrichment engine with a bounded internal retry budget
pub struct Enricher {
    max_retries: u32,
}

impl Enricher {
    /// Create an enricher with the default retry budget
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Create an enricher with a custom retry budget
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Enrich one raw document.
    ///
    /// Always returns a well-formed record: `success` with derived
    /// `ProductFacts`, or `failed` with the terminal error after
    /// `max_retries` additional attempts. Idempotent on every field except
    /// `enriched_at`.
    pub fn enrich(&self, raw: &RawDocument) -> EnrichedRecord {
        let raw_id = raw.raw_id();
        let mut attempt: u32 = 0;

        loop {
            match assemble(&raw.payload) {
                Ok(facts) => return EnrichedRecord::success(raw_id, facts),
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(
                        raw_id = %raw_id,
                        attempt,
                        error = %err,
                        "enrichment attempt failed, retrying"
                    );
                },
                Err(err) => {
                    debug!(raw_id = %raw_id, error = %err, "enrichment failed terminally");
                    return EnrichedRecord::failed(
                        raw_id,
                        err.kind().to_string(),
                        err.to_string(),
                    );
                },
            }
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Field derivation
// ============================================================================

/// Derive the full `ProductFacts` from one payload
fn assemble(payload: &Value) -> Result<ProductFacts, EnrichError> {
    let fields = payload.as_object().ok_or(EnrichError::InvalidPayload)?;

    let grade = nutriscore_grade(fields)?;
    let completeness = opt_f64_field(fields, "completeness")?.unwrap_or(0.0);

    Ok(ProductFacts {
        code: string_field(fields, "code")?,
        product_name: string_field(fields, "product_name")?,
        brand_name: string_field(fields, "brands")?,
        category_name: categorize(fields)?,
        quality_score: quality_score(&grade, completeness),
        nutriscore_grade: grade,
        nova_group: nova_group(fields)?,
        image_url: image_url(fields)?,
        nutrition: nutrition(fields)?,
    })
}

/// Numeric weight of a nutriscore grade; unknown grades contribute nothing
fn nutriscore_weight(grade: &str) -> f64 {
    match grade {
        "a" => 100.0,
        "b" => 80.0,
        "c" => 60.0,
        "d" => 40.0,
        "e" => 20.0,
        _ => 0.0,
    }
}

/// Combined quality score: nutriscore and completeness, half weight each,
/// clamped to [0, 100] and truncated to an integer
fn quality_score(grade: &str, completeness: f64) -> i64 {
    let score = nutriscore_weight(grade) * NUTRISCORE_COMPONENT_WEIGHT
        + completeness * COMPLETENESS_COMPONENT_WEIGHT;
    score.clamp(0.0, 100.0) as i64
}

/// Normalized grade: lowercased, constrained to a-e, "" otherwise
fn nutriscore_grade(fields: &Map<String, Value>) -> Result<String, EnrichError> {
    let grade = string_field(fields, "nutriscore_grade")?.trim().to_lowercase();
    match grade.as_str() {
        "a" | "b" | "c" | "d" | "e" => Ok(grade),
        _ => Ok(String::new()),
    }
}

/// Pick the display category: `main_category`, else the first entry of
/// `categories_tags`, else the sentinel
fn categorize(fields: &Map<String, Value>) -> Result<String, EnrichError> {
    let main_category = string_field(fields, "main_category")?;
    if !main_category.is_empty() {
        return Ok(normalize_category_tag(&main_category));
    }

    if let Some(value) = fields.get("categories_tags") {
        if !value.is_null() {
            let tags = value.as_array().ok_or_else(|| EnrichError::FieldType {
                field: "categories_tags".to_string(),
                expected: "an array",
            })?;
            if let Some(first) = tags.first() {
                let tag = first.as_str().ok_or_else(|| EnrichError::FieldType {
                    field: "categories_tags[0]".to_string(),
                    expected: "a string",
                })?;
                return Ok(normalize_category_tag(tag));
            }
        }
    }

    Ok(UNCATEGORIZED.to_string())
}

/// Turn a catalog tag into a display name:
/// "en:breakfast-cereals" -> "Breakfast Cereals"
fn normalize_category_tag(tag: &str) -> String {
    let stripped = tag.split_once(':').map(|(_, rest)| rest).unwrap_or(tag);
    title_case(&stripped.replace('-', " "))
}

/// Capitalize the first letter of each space-separated word
fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                },
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First present, non-null image candidate
fn image_url(fields: &Map<String, Value>) -> Result<Option<String>, EnrichError> {
    for field in IMAGE_FIELDS {
        match fields.get(field) {
            Some(Value::Null) | None => continue,
            Some(Value::String(url)) => return Ok(Some(url.clone())),
            Some(_) => {
                return Err(EnrichError::FieldType {
                    field: field.to_string(),
                    expected: "a string",
                })
            },
        }
    }
    Ok(None)
}

/// NOVA group, kept only when it is an integer in 1-4
fn nova_group(fields: &Map<String, Value>) -> Result<Option<i64>, EnrichError> {
    Ok(opt_i64_field(fields, "nova_group")?.filter(|nova| (1..=4).contains(nova)))
}

/// Per-100g nutrients from the nested `nutriments` object.
///
/// `None` when the object itself is absent; inside it, each field is
/// independently optional and absent stays `None`, never zero.
fn nutrition(fields: &Map<String, Value>) -> Result<Option<NutritionPer100g>, EnrichError> {
    let nutriments = match fields.get("nutriments") {
        Some(Value::Null) | None => return Ok(None),
        Some(value) => value.as_object().ok_or_else(|| EnrichError::FieldType {
            field: "nutriments".to_string(),
            expected: "an object",
        })?,
    };

    let mut values = [None; 8];
    for (slot, key) in values.iter_mut().zip(NUTRIMENT_KEYS) {
        *slot = opt_f64_field(nutriments, key)?;
    }

    let [energy_kcal, fat, saturated_fat, carbohydrates, sugars, fiber, proteins, salt] = values;
    Ok(Some(NutritionPer100g {
        energy_kcal,
        fat,
        saturated_fat,
        carbohydrates,
        sugars,
        fiber,
        proteins,
        salt,
    }))
}

// ============================================================================
// Typed field extraction
// ============================================================================

/// String field; absent, null, and empty are all ""
fn string_field(fields: &Map<String, Value>, field: &str) -> Result<String, EnrichError> {
    match fields.get(field) {
        Some(Value::Null) | None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(EnrichError::FieldType {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

/// Optional float field; absent and null are both `None`
fn opt_f64_field(fields: &Map<String, Value>, field: &str) -> Result<Option<f64>, EnrichError> {
    match fields.get(field) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| EnrichError::FieldType {
                field: field.to_string(),
                expected: "a number",
            }),
    }
}

/// Optional integer field; absent and null are both `None`
fn opt_i64_field(fields: &Map<String, Value>, field: &str) -> Result<Option<i64>, EnrichError> {
    match fields.get(field) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| EnrichError::FieldType {
                field: field.to_string(),
                expected: "an integer",
            }),
    }
}

// ============================================================================
// Tests
// ============================================================================
