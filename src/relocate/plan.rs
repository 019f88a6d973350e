//! Plan file reading: one `{path_id, src, dst}` object per line.
//!
//! Lines are split on raw bytes so a single undecodable line is reported on its own and
//! the rest of the plan still runs.

use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::errors::RelocateError;
use crate::jsonl::{self, Line};

/// A parsed plan object. `src`/`dst` are `None` when absent, empty or not strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEntry {
    /// 1-based line number in the plan file.
    pub line: usize,
    pub path_id: Option<String>,
    pub src: Option<String>,
    pub dst: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanItem {
    Entry(MoveEntry),
    Malformed { line: usize, message: String },
}

/// Plan row as written by the rollback-plan builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRow {
    pub path_id: Option<String>,
    pub src: String,
    pub dst: String,
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn path_id_field(obj: &serde_json::Map<String, Value>) -> Option<String> {
    match obj.get("path_id").or_else(|| obj.get("pathId")) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse one raw line. `None` for blank lines and `_meta`/`_meta_end` framing.
pub fn parse_plan_line(line: usize, raw: &[u8]) -> Option<PlanItem> {
    let text = match std::str::from_utf8(raw) {
        Ok(t) => t,
        Err(e) => {
            return Some(PlanItem::Malformed {
                line,
                message: format!("invalid UTF-8: {e}"),
            });
        }
    };
    match jsonl::parse_line(text)? {
        Ok(Line::Meta(_)) | Ok(Line::MetaEnd(_)) => None,
        Ok(Line::Record(obj)) => Some(PlanItem::Entry(MoveEntry {
            line,
            path_id: path_id_field(&obj),
            src: string_field(&obj, "src"),
            dst: string_field(&obj, "dst"),
        })),
        Err(message) => Some(PlanItem::Malformed { line, message }),
    }
}

/// Streaming iterator over the items of a plan.
pub struct PlanReader<R> {
    inner: R,
    line: usize,
}

impl<R: BufRead> PlanReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line: 0 }
    }
}

impl<R: BufRead> Iterator for PlanReader<R> {
    type Item = io::Result<PlanItem>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.inner.read_until(b'\n', &mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    if let Some(item) = parse_plan_line(self.line, &buf) {
                        return Some(Ok(item));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Open a plan file. Missing or unreadable -> `PlanNotFound`.
pub fn open_plan(path: &Path) -> Result<PlanReader<BufReader<File>>, RelocateError> {
    match File::open(path) {
        Ok(f) if f.metadata().map(|m| m.is_file()).unwrap_or(false) => {
            Ok(PlanReader::new(BufReader::new(f)))
        }
        _ => Err(RelocateError::PlanNotFound(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(text: &[u8]) -> Vec<PlanItem> {
        PlanReader::new(text).map(|r| r.unwrap()).collect()
    }

    #[test]
    fn reads_entries_and_skips_framing() {
        let plan = b"\xef\xbb\xbf{\"_meta\":{\"kind\":\"plan\"}}\n\n{\"path_id\":7,\"src\":\"C:\\\\a\",\"dst\":\"D:\\\\a\",\"extra\":1}\r\n{\"_meta_end\":{}}\n";
        let got = items(plan);
        assert_eq!(
            got,
            vec![PlanItem::Entry(MoveEntry {
                line: 3,
                path_id: Some("7".into()),
                src: Some(r"C:\a".into()),
                dst: Some(r"D:\a".into()),
            })]
        );
    }

    #[test]
    fn bad_lines_are_malformed_with_line_numbers() {
        let got = items(b"not json\n[1,2]\n\xff\xfe\n{\"src\":\"C:\\\\a\"}\n");
        assert!(matches!(got[0], PlanItem::Malformed { line: 1, .. }));
        assert!(matches!(got[1], PlanItem::Malformed { line: 2, .. }));
        assert!(matches!(got[2], PlanItem::Malformed { line: 3, .. }));
        match &got[3] {
            PlanItem::Entry(e) => {
                assert_eq!(e.line, 4);
                assert!(e.dst.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn camel_case_path_id_and_blank_paths() {
        let got = items(b"{\"pathId\":\"p1\",\"src\":\"  \",\"dst\":5}\n");
        assert_eq!(
            got,
            vec![PlanItem::Entry(MoveEntry {
                line: 1,
                path_id: Some("p1".into()),
                src: None,
                dst: None,
            })]
        );
    }
}
