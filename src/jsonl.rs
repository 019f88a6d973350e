//! JSONL artifact framing shared by every writer and reader in the crate.
//!
//! Each artifact starts with `{"_meta": {...}}` and, once complete, ends with
//! `{"_meta_end": {...}}`. Everything in between is one record per line.

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use serde_json::{Map, Value, json};

pub const META_KEY: &str = "_meta";
pub const META_END_KEY: &str = "_meta_end";

/// `YYYYMMDD_HHMMSS_<micros>_<pid>`, local time.
pub fn new_run_id() -> String {
    let now = Local::now();
    format!(
        "{}_{:06}_{}",
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_subsec_micros(),
        std::process::id()
    )
}

/// Local timestamp with offset, used for `generated_at` and audit `ts`.
pub fn now_iso() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Header of an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMeta {
    fields: Map<String, Value>,
}

impl RunMeta {
    pub fn new(kind: &str, run_id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("kind".into(), Value::from(kind));
        fields.insert("run_id".into(), Value::from(run_id));
        fields.insert("generated_at".into(), Value::from(now_iso()));
        Self { fields }
    }

    /// Add or replace a field. Values that fail to serialize become `null`.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Serialize) {
        let v = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), v);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn to_line(&self) -> String {
        json!({ META_KEY: self.fields }).to_string()
    }
}

/// `{"_meta_end": <summary>}`
pub fn meta_end_line(summary: &impl Serialize) -> serde_json::Result<String> {
    Ok(json!({ META_END_KEY: serde_json::to_value(summary)? }).to_string())
}

/// Classification of one parsed artifact line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Meta(Map<String, Value>),
    MetaEnd(Map<String, Value>),
    Record(Map<String, Value>),
}

fn into_map(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/// Parse one line. `None` for blank lines; `Err` for anything that is not a JSON object.
/// A leading UTF-8 BOM is ignored.
pub fn parse_line(raw: &str) -> Option<Result<Line, String>> {
    let s = raw.trim_start_matches('\u{feff}').trim();
    if s.is_empty() {
        return None;
    }
    let v: Value = match serde_json::from_str(s) {
        Ok(v) => v,
        Err(e) => return Some(Err(format!("invalid JSON: {e}"))),
    };
    let Value::Object(mut obj) = v else {
        return Some(Err("not a JSON object".to_string()));
    };
    if let Some(inner) = obj.remove(META_KEY) {
        return Some(Ok(Line::Meta(into_map(inner))));
    }
    if let Some(inner) = obj.remove(META_END_KEY) {
        return Some(Ok(Line::MetaEnd(into_map(inner))));
    }
    Some(Ok(Line::Record(obj)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_shape() {
        let id = new_run_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 4, "{id}");
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3], std::process::id().to_string());
    }

    #[test]
    fn meta_line_wraps_fields() {
        let line = RunMeta::new("inventory", "r1").with("files", 3).to_line();
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["_meta"]["kind"], "inventory");
        assert_eq!(v["_meta"]["run_id"], "r1");
        assert_eq!(v["_meta"]["files"], 3);
    }

    #[test]
    fn classify_lines() {
        assert!(parse_line("   ").is_none());
        assert!(matches!(parse_line("{\"_meta\":{\"kind\":\"x\"}}"), Some(Ok(Line::Meta(_)))));
        assert!(matches!(parse_line("\u{feff}{\"_meta_end\":{}}"), Some(Ok(Line::MetaEnd(_)))));
        assert!(matches!(parse_line("{\"a\":1}"), Some(Ok(Line::Record(_)))));
        assert!(matches!(parse_line("[1]"), Some(Err(_))));
        assert!(matches!(parse_line("{\"a\":"), Some(Err(_))));
    }
}
