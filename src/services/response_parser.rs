//! Turns free-form model output into an [`AnalysisResult`].
//!
//! Three tiers, always yielding a result:
//! 1. a well-formed JSON object between the first `{` and the last `}` is
//!    read field by field, with defaults for anything missing;
//! 2. no such span: the first 200 characters of the reply become the analysis
//!    at confidence 0.5;
//! 3. the span is not valid JSON, or a field cannot be coerced: a
//!    `PARSE_ERROR` result at confidence 0.0.

use serde_json::{Map, Value};

use crate::constants::*;
use crate::models::{AnalysisFlag, AnalysisResult, FlagSeverity, ItemStatus, Priority};

pub fn parse_response(raw: &str) -> AnalysisResult {
    let Some(span) = json_span(raw) else {
        return excerpt_fallback(raw);
    };
    let fields = match serde_json::from_str::<Map<String, Value>>(span) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(error = %e, "model reply carried malformed JSON");
            return parse_error(&e.to_string());
        }
    };

    match extract(&fields) {
        Ok(result) => result,
        Err(reason) => {
            tracing::warn!(%reason, "model reply could not be coerced into an analysis");
            parse_error(&reason)
        }
    }
}

fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn extract(fields: &Map<String, Value>) -> Result<AnalysisResult, String> {
    let analysis = match present(fields, "analysis") {
        None => DEFAULT_ANALYSIS_TEXT.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(format!("analysis must be text, got {other}")),
    };

    // Unknown priority labels fall back to the default rather than failing.
    let suggested_priority = match present(fields, "suggestedPriority") {
        None => Priority::P2,
        Some(Value::String(s)) => Priority::parse(s).unwrap_or(Priority::P2),
        Some(other) => return Err(format!("suggestedPriority must be text, got {other}")),
    };

    let suggested_status = match present(fields, "suggestedStatus") {
        Some(Value::String(s)) => ItemStatus::parse(s),
        _ => None,
    };

    let confidence = match present(fields, "confidence") {
        None => DEFAULT_CONFIDENCE,
        Some(value) => coerce_confidence(value)?,
    };

    let flags = match present(fields, "flags") {
        None => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .map(coerce_flag)
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => return Err(format!("flags must be a list, got {other}")),
    };

    Ok(AnalysisResult {
        analysis,
        suggested_priority,
        suggested_status,
        confidence,
        flags,
        provider_used: None,
        response_time: None,
    })
}

/// A key that is absent or explicitly null counts as missing.
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn coerce_confidence(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n.clamp(0.0, 1.0)),
        _ => Err(format!("could not convert confidence {value} to a number")),
    }
}

fn coerce_flag(entry: &Value) -> Result<AnalysisFlag, String> {
    let Value::Object(flag) = entry else {
        return Err(format!("flag entries must be objects, got {entry}"));
    };
    let text = |key: &str| flag.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(AnalysisFlag {
        code: text("code").unwrap_or_else(|| "UNSPECIFIED".to_string()),
        message: text("message").unwrap_or_default(),
        severity: text("severity")
            .as_deref()
            .and_then(FlagSeverity::parse)
            .unwrap_or(FlagSeverity::Medium),
        field: text("field"),
    })
}

fn excerpt_fallback(raw: &str) -> AnalysisResult {
    let analysis = if raw.chars().count() > FALLBACK_EXCERPT_CHARS {
        let head: String = raw.chars().take(FALLBACK_EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        raw.to_string()
    };

    AnalysisResult {
        analysis,
        suggested_priority: Priority::P2,
        suggested_status: None,
        confidence: FALLBACK_CONFIDENCE,
        flags: Vec::new(),
        provider_used: None,
        response_time: None,
    }
}

fn parse_error(reason: &str) -> AnalysisResult {
    AnalysisResult {
        analysis: format!("Failed to parse AI response: {reason}"),
        suggested_priority: Priority::P2,
        suggested_status: None,
        confidence: 0.0,
        flags: vec![AnalysisFlag::new(
            FLAG_PARSE_ERROR,
            "Unable to parse AI response format",
            FlagSeverity::Medium,
        )],
        provider_used: None,
        response_time: None,
    }
}
