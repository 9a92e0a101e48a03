//! Language-model diagnosis prompt and response parsing
//!
//! The parser never fails: whatever comes back from the model is turned into a
//! [`ScanDraft`], with defaults for anything missing or malformed.

use crate::models::{CategoryScores, IssueDraft, ScanDraft, Severity};
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_OVERALL_SCORE: u8 = 50;

const DEFAULT_RECOMMENDATIONS: [&str; 3] = [
    "Compress and lazy-load product images to improve page speed",
    "Add unique meta titles and descriptions to every product page",
    "Simplify checkout by reducing required form fields",
];

/// Prompt asking for a store diagnosis in the JSON shape `parse_response` reads
pub fn build_prompt(store_name: &str, store_url: &str) -> String {
    format!(
        r#"You are an e-commerce conversion and technical SEO expert.
Analyze the online store "{name}" at https://{url} and report its health.

Respond with a single JSON object and nothing else, using this shape:
{{
  "overallScore": <0-100>,
  "performanceScore": <0-100>,
  "seoScore": <0-100>,
  "accessibilityScore": <0-100>,
  "conversionScore": <0-100>,
  "securityScore": <0-100>,
  "issues": [
    {{
      "title": "<short problem title>",
      "category": "<performance|seo|accessibility|conversion|security>",
      "severity": "<high|medium|low>",
      "impact": "<expected business impact>",
      "recommendation": "<concrete fix>"
    }}
  ],
  "recommendations": ["<top priority action>", "..."]
}}"#,
        name = store_name.trim(),
        url = store_url.trim().trim_start_matches("https://").trim_start_matches("http://"),
    )
}

/// Turn a raw model reply into a scan draft
pub fn parse_response(raw: &str) -> ScanDraft {
    let value = match extract_json_object(raw) {
        Some(value) => value,
        None => {
            warn!(len = raw.len(), "analysis response contained no JSON object, using defaults");
            return fallback_draft();
        }
    };

    let overall = value
        .get("overallScore")
        .and_then(read_score)
        .unwrap_or(DEFAULT_OVERALL_SCORE);

    let category = |short: &str, key: &str| {
        value
            .get(key)
            .or_else(|| value.get("scores").and_then(|s| s.get(short)))
            .and_then(read_score)
            .unwrap_or(overall)
    };
    let scores = CategoryScores {
        performance_score: category("performance", "performanceScore"),
        seo_score: category("seo", "seoScore"),
        accessibility_score: category("accessibility", "accessibilityScore"),
        conversion_score: category("conversion", "conversionScore"),
        security_score: category("security", "securityScore"),
    };

    let issues: Vec<IssueDraft> = value
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(read_issue).collect())
        .unwrap_or_default();

    let mut recommendations: Vec<String> = value
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if recommendations.is_empty() {
        recommendations = default_recommendations();
    }

    ScanDraft {
        overall_score: overall,
        scores,
        issues,
        recommendations,
    }
}

/// Draft used when the reply is unusable
pub fn fallback_draft() -> ScanDraft {
    ScanDraft {
        overall_score: DEFAULT_OVERALL_SCORE,
        scores: CategoryScores::uniform(DEFAULT_OVERALL_SCORE),
        issues: Vec::new(),
        recommendations: default_recommendations(),
    }
}

fn default_recommendations() -> Vec<String> {
    DEFAULT_RECOMMENDATIONS.iter().map(|r| r.to_string()).collect()
}

/// First JSON object embedded in the reply, ignoring surrounding prose
fn extract_json_object(raw: &str) -> Option<Value> {
    raw.char_indices()
        .filter(|&(_, c)| c == '{')
        .find_map(|(start, _)| {
            let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
            match values.next() {
                Some(Ok(value @ Value::Object(_))) => Some(value),
                _ => None,
            }
        })
}

/// Numbers and numeric strings, rounded and clamped to 0..=100
fn read_score(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, 100.0) as u8)
}

fn read_issue(value: &Value) -> Option<IssueDraft> {
    let title = value.get("title").and_then(Value::as_str)?.trim();
    if title.is_empty() {
        return None;
    }
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    let category = text("category");

    Some(IssueDraft {
        id: None,
        title: title.to_string(),
        category: if category.is_empty() {
            "general".to_string()
        } else {
            category.to_ascii_lowercase()
        },
        severity: value
            .get("severity")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or_default(),
        impact: text("impact"),
        recommendation: text("recommendation"),
    })
}
