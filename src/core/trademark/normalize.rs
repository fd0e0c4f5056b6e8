//! Document Normalization
//!
//! Turns a raw trademark record (as loaded from the data file) into the
//! document that is indexed:
//!
//! 1. `pid` kept when present, otherwise allocated.
//! 2. `viewCount` kept when present, otherwise 0.
//! 3. Every other key copied, with `null` and the string `"null"` dropped.
//! 4. Date fields reformatted from `YYYYMMDD` to `YYYY-MM-DD`.
//! 5. List fields coerced to lists.
//! 6. `productName_chosung` derived from `productName`.
//! 7. `productNameEngPronunciation` and its chosung derived from
//!    `productNameEng`.
//!
//! Derived fields are recomputed on every run; values authored in the raw
//! record are discarded so they cannot drift from their source.

use serde_json::{Map, Value};

use super::chosung::extract_chosung;
use super::error::NormalizationFieldError;
use super::pid::PidAllocator;
use super::pronunciation::Transliterator;
use crate::core::store::Document;

/// Fields holding `YYYYMMDD` dates.
pub const DATE_FIELDS: &[&str] = &[
    "applicationDate",
    "publicationDate",
    "registrationDate",
    "internationalRegDate",
    "priorityClaimDateList",
];

/// Fields stored as lists even when a single value is supplied.
pub const LIST_FIELDS: &[&str] = &[
    "registrationNumber",
    "internationalRegNumbers",
    "priorityClaimNumList",
    "asignProductMainCodeList",
    "asignProductSubCodeList",
    "viennaCodeList",
];

pub const PRODUCT_NAME: &str = "productName";
pub const PRODUCT_NAME_ENG: &str = "productNameEng";
pub const PRODUCT_NAME_CHOSUNG: &str = "productName_chosung";
pub const PRONUNCIATION: &str = "productNameEngPronunciation";
pub const PRONUNCIATION_CHOSUNG: &str = "productNameEngPronunciation_chosung";

const DERIVED_FIELDS: &[&str] = &[PRODUCT_NAME_CHOSUNG, PRONUNCIATION, PRONUNCIATION_CHOSUNG];

// ============================================================================
// Field Helpers
// ============================================================================

/// `"20230101"` -> `"2023-01-01"`. Anything but exactly eight ASCII digits
/// yields `None`.
pub fn format_date(raw: &str) -> Option<String> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8]))
}

/// Null or the `"null"` sentinel.
fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s == "null",
        _ => false,
    }
}

/// Lists pass through (an empty list stays empty), scalars are wrapped,
/// absent and null-like values become `None`.
pub fn normalize_list(value: Option<&Value>) -> Option<Value> {
    match value {
        None => None,
        Some(v) if is_null_like(v) => None,
        Some(Value::Array(items)) => Some(Value::Array(items.clone())),
        Some(scalar) => Some(Value::Array(vec![scalar.clone()])),
    }
}

fn date_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => format_date(s.trim()),
        Value::Number(n) => format_date(&n.to_string()),
        _ => None,
    }
}

/// Scalars become a formatted date or disappear. Lists keep only the
/// elements that format.
fn normalize_date(value: &Value) -> Option<Value> {
    match value {
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(date_text)
                .map(Value::String)
                .collect(),
        )),
        scalar => date_text(scalar).map(Value::String),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

fn view_count(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Number(n)) => Value::Number(n.clone()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(0)),
        _ => Value::from(0),
    }
}

pub(crate) fn pid_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() && s != "null" => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Builds indexable documents. Pure apart from the pid source.
#[derive(Debug, Clone, Default)]
pub struct DocumentNormalizer {
    transliterator: Transliterator,
}

impl DocumentNormalizer {
    pub fn new(transliterator: Transliterator) -> Self {
        Self { transliterator }
    }

    pub fn transliterator(&self) -> &Transliterator {
        &self.transliterator
    }

    /// Normalize one record, asking the allocator for a pid when needed.
    pub async fn normalize(&self, raw: &Map<String, Value>, allocator: &PidAllocator) -> Document {
        let pid = match pid_text(raw.get("pid")) {
            Some(pid) => pid,
            None => allocator.next_id().await,
        };
        self.normalize_with(raw, || pid)
    }

    /// Normalize one record; `assign_pid` runs only if the record has none.
    pub fn normalize_with<F>(&self, raw: &Map<String, Value>, assign_pid: F) -> Document
    where
        F: FnOnce() -> String,
    {
        let mut doc = Document::new();

        let pid = pid_text(raw.get("pid")).unwrap_or_else(assign_pid);
        doc.insert("pid".to_string(), Value::String(pid.clone()));
        doc.insert("viewCount".to_string(), view_count(raw.get("viewCount")));

        for (key, value) in raw {
            if key == "pid" || key == "viewCount" || DERIVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if is_null_like(value) {
                continue;
            }
            doc.insert(key.clone(), value.clone());
        }

        for field in DATE_FIELDS {
            let formatted = match doc.get(*field) {
                Some(value) if is_truthy(value) => normalize_date(value),
                _ => None,
            };
            match formatted {
                Some(value) => doc.insert(field.to_string(), value),
                None => doc.remove(*field),
            };
        }

        for field in LIST_FIELDS {
            match normalize_list(doc.get(*field)) {
                Some(value) => doc.insert(field.to_string(), value),
                None => doc.remove(*field),
            };
        }

        if let Err(e) = self.derive_chosung(&mut doc) {
            log::warn!("pid {}: {}", pid, e);
        }
        if let Err(e) = self.derive_pronunciation(&mut doc) {
            log::warn!("pid {}: {}", pid, e);
        }

        doc
    }

    fn derive_chosung(&self, doc: &mut Document) -> Result<(), NormalizationFieldError> {
        let chosung = match doc.get(PRODUCT_NAME) {
            None => return Ok(()),
            Some(Value::String(name)) => extract_chosung(name),
            Some(other) => {
                return Err(NormalizationFieldError::new(
                    PRODUCT_NAME_CHOSUNG,
                    format!("productName is not text: {}", other),
                ))
            }
        };
        doc.insert(PRODUCT_NAME_CHOSUNG.to_string(), Value::String(chosung));
        Ok(())
    }

    fn derive_pronunciation(&self, doc: &mut Document) -> Result<(), NormalizationFieldError> {
        let pronunciation = match doc.get(PRODUCT_NAME_ENG) {
            None => return Ok(()),
            Some(Value::String(name)) => self.transliterator.transliterate(name),
            Some(other) => {
                return Err(NormalizationFieldError::new(
                    PRONUNCIATION,
                    format!("productNameEng is not text: {}", other),
                ))
            }
        };

        if let Some(pronunciation) = pronunciation {
            let chosung = extract_chosung(&pronunciation);
            doc.insert(PRONUNCIATION.to_string(), Value::String(pronunciation));
            doc.insert(PRONUNCIATION_CHOSUNG.to_string(), Value::String(chosung));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MockDocumentStore;
    use crate::core::trademark::pid::FallbackSequence;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::Arc;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn normalizer() -> DocumentNormalizer {
        DocumentNormalizer::new(Transliterator::rule_based())
    }

    #[rstest]
    #[case("20230101", Some("2023-01-01"))]
    #[case("19991231", Some("1999-12-31"))]
    #[case("null", None)]
    #[case("202301", None)]
    #[case("202301010", None)]
    #[case("2023-01-01", None)]
    #[case("2023O101", None)]
    #[case("", None)]
    fn test_format_date(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(format_date(input).as_deref(), expected);
    }

    #[test]
    fn test_normalize_list() {
        assert_eq!(normalize_list(Some(&json!(["a", "b"]))), Some(json!(["a", "b"])));
        assert_eq!(normalize_list(Some(&json!("x"))), Some(json!(["x"])));
        assert_eq!(normalize_list(None), None);
        assert_eq!(normalize_list(Some(&json!(null))), None);
        assert_eq!(normalize_list(Some(&json!("null"))), None);
        assert_eq!(normalize_list(Some(&json!([]))), Some(json!([])));
    }

    #[test]
    fn test_keeps_pid_and_derives_chosung() {
        let doc = normalizer().normalize_with(
            &raw(json!({"pid": "5", "productName": "삼성전자"})),
            || panic!("pid already present"),
        );
        assert_eq!(doc["pid"], "5");
        assert_eq!(doc["productName_chosung"], "ㅅㅅㅈㅈ");
        assert_eq!(doc["viewCount"], 0);
    }

    #[test]
    fn test_assigns_pid_when_missing_or_blank() {
        let n = normalizer();
        let doc = n.normalize_with(&raw(json!({"productName": "카카오"})), || "9".to_string());
        assert_eq!(doc["pid"], "9");
        let doc = n.normalize_with(&raw(json!({"pid": ""})), || "10".to_string());
        assert_eq!(doc["pid"], "10");
        let doc = n.normalize_with(&raw(json!({"pid": 12})), || "x".to_string());
        assert_eq!(doc["pid"], "12");
    }

    #[test]
    fn test_view_count() {
        let n = normalizer();
        let doc = n.normalize_with(&raw(json!({"viewCount": 4})), || "1".into());
        assert_eq!(doc["viewCount"], 4);
        let doc = n.normalize_with(&raw(json!({"viewCount": null})), || "1".into());
        assert_eq!(doc["viewCount"], 0);
        let doc = n.normalize_with(&raw(json!({"viewCount": "3"})), || "1".into());
        assert_eq!(doc["viewCount"], 3);
    }

    #[test]
    fn test_null_sentinels_dropped() {
        let doc = normalizer().normalize_with(
            &raw(json!({"registerStatus": "null", "applicantName": null, "keep": 0})),
            || "1".into(),
        );
        assert!(!doc.contains_key("registerStatus"));
        assert!(!doc.contains_key("applicantName"));
        assert_eq!(doc["keep"], 0);
    }

    #[test]
    fn test_dates_formatted_or_removed() {
        let doc = normalizer().normalize_with(
            &raw(json!({
                "applicationDate": "20200115",
                "publicationDate": "2020",
                "registrationDate": "",
                "internationalRegDate": 20210203,
                "priorityClaimDateList": ["20190101", "bad", null, "20190202"]
            })),
            || "1".into(),
        );
        assert_eq!(doc["applicationDate"], "2020-01-15");
        assert!(!doc.contains_key("publicationDate"));
        assert!(!doc.contains_key("registrationDate"));
        assert_eq!(doc["internationalRegDate"], "2021-02-03");
        assert_eq!(doc["priorityClaimDateList"], json!(["2019-01-01", "2019-02-02"]));
    }

    #[test]
    fn test_list_fields_coerced() {
        let doc = normalizer().normalize_with(
            &raw(json!({
                "registrationNumber": "4000000000000",
                "asignProductMainCodeList": ["09", "35"],
                "viennaCodeList": [],
                "priorityClaimNumList": "null"
            })),
            || "1".into(),
        );
        assert_eq!(doc["registrationNumber"], json!(["4000000000000"]));
        assert_eq!(doc["asignProductMainCodeList"], json!(["09", "35"]));
        assert_eq!(doc["viennaCodeList"], json!([]));
        assert!(!doc.contains_key("priorityClaimNumList"));
    }

    #[test]
    fn test_pronunciation_fields() {
        let doc = normalizer().normalize_with(
            &raw(json!({"productNameEng": "Samsung"})),
            || "1".into(),
        );
        assert_eq!(doc["productNameEngPronunciation"], "삼성");
        assert_eq!(doc["productNameEngPronunciation_chosung"], "ㅅㅅ");
    }

    #[test]
    fn test_absent_sources_leave_derived_fields_absent() {
        let doc = normalizer().normalize_with(
            &raw(json!({
                "productName_chosung": "stale",
                "productNameEngPronunciation": "stale"
            })),
            || "1".into(),
        );
        assert!(!doc.contains_key("productName_chosung"));
        assert!(!doc.contains_key("productNameEngPronunciation"));
        assert!(!doc.contains_key("productNameEngPronunciation_chosung"));
    }

    #[test]
    fn test_punctuation_only_english_name_has_no_pronunciation() {
        let doc = normalizer().normalize_with(&raw(json!({"productNameEng": "!!!"})), || "1".into());
        assert_eq!(doc["productNameEng"], "!!!");
        assert!(!doc.contains_key("productNameEngPronunciation"));
    }

    #[test]
    fn test_field_failure_does_not_abort_record() {
        let doc = normalizer().normalize_with(
            &raw(json!({"productName": 42, "productNameEng": "kakao"})),
            || "1".into(),
        );
        assert_eq!(doc["productName"], 42);
        assert!(!doc.contains_key("productName_chosung"));
        assert_eq!(doc["productNameEngPronunciation"], "카카오");
    }

    #[test]
    fn test_empty_product_name_gives_empty_chosung() {
        let doc = normalizer().normalize_with(&raw(json!({"productName": ""})), || "1".into());
        assert_eq!(doc["productName_chosung"], "");
    }

    #[tokio::test]
    async fn test_normalize_uses_allocator() {
        let mut store = MockDocumentStore::new();
        store.expect_exists().returning(|_| Ok(false));
        let allocator = PidAllocator::new(
            Arc::new(store),
            "trademarks",
            Arc::new(FallbackSequence::new()),
        );

        let doc = normalizer()
            .normalize(&raw(json!({"productName": "삼성전자"})), &allocator)
            .await;
        assert_eq!(doc["pid"], "1");
    }
}
