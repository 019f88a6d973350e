//! PowerShell 7 bridge adapter for [`FileSystemGateway`].
//!
//! Each call spawns `pwsh -NoProfile -NonInteractive -EncodedCommand <b64>`. Scripts get
//! their paths as single-quoted literals, print one compact JSON object per line, and on
//! failure write the exception message to stderr and exit 1 (2 when the item is missing).
//! The command travels base64-encoded (UTF-16LE) so nothing is re-quoted on the way
//! through WSL interop.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::io;
use std::process::{Command, Stdio};
use tracing::{debug, trace};

use super::{DirEntryInfo, EntryFault, EntryKind, FileStat, FileSystemGateway};
use crate::errors::RelocateError;
use crate::path_codec::PathLiteral;

/// Executables tried, in order, when none is configured.
pub const PWSH_CANDIDATES: &[&str] = &[
    "pwsh.exe",
    "/mnt/c/Program Files/PowerShell/7/pwsh.exe",
    "pwsh",
];

const PRELUDE: &str = "$ErrorActionPreference = 'Stop'\n\
$ProgressPreference = 'SilentlyContinue'\n\
[Console]::OutputEncoding = [System.Text.UTF8Encoding]::new($false)\n\
function Emit($o) { [Console]::Out.WriteLine(($o | ConvertTo-Json -Compress -Depth 3)) }\n\
try {\n";

const EPILOGUE: &str = "\n} catch [System.IO.FileNotFoundException], [System.IO.DirectoryNotFoundException], [System.Management.Automation.ItemNotFoundException] {\n\
  [Console]::Error.WriteLine($_.Exception.Message); exit 2\n\
} catch {\n\
  [Console]::Error.WriteLine($_.Exception.Message); exit 1\n\
}\n";

/// Quote `s` as a PowerShell single-quoted literal. Every character PowerShell treats as
/// a single quote is doubled.
pub fn ps_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Base64 of the UTF-16LE script, as `-EncodedCommand` expects.
pub fn encode_command(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(bytes)
}

/// Every JSON object line of `stdout`. Non-JSON noise (banners, warnings) is skipped.
pub fn parse_json_lines(stdout: &str) -> Vec<Map<String, Value>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| match serde_json::from_str::<Value>(l) {
            Ok(Value::Object(m)) => Some(m),
            _ => None,
        })
        .collect()
}

fn script(body: &str) -> String {
    format!("{PRELUDE}{body}{EPILOGUE}")
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn kind_from(s: &str) -> EntryKind {
    match s {
        "file" => EntryKind::File,
        "dir" => EntryKind::Dir,
        _ => EntryKind::Other,
    }
}

/// Gateway that runs every primitive in a PowerShell 7 subprocess.
#[derive(Debug, Clone)]
pub struct PwshGateway {
    exe: String,
}

impl PwshGateway {
    /// Use `exe` without probing it.
    pub fn with_executable(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }

    pub fn executable(&self) -> &str {
        &self.exe
    }

    /// Find a working pwsh: `configured` first, then [`PWSH_CANDIDATES`]. A candidate
    /// counts when a version probe exits 0.
    pub fn discover(configured: Option<&str>) -> Result<Self, RelocateError> {
        let mut tried = Vec::new();
        for exe in configured.into_iter().chain(PWSH_CANDIDATES.iter().copied()) {
            tried.push(exe.to_string());
            let probe = Command::new(exe)
                .args(["-NoProfile", "-NonInteractive", "-Command"])
                .arg("$PSVersionTable.PSVersion.ToString()")
                .stdin(Stdio::null())
                .output();
            match probe {
                Ok(out) if out.status.success() => {
                    let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                    debug!(exe, version = %version, "found pwsh");
                    return Ok(Self::with_executable(exe));
                }
                Ok(out) => trace!(exe, status = ?out.status, "pwsh probe failed"),
                Err(e) => trace!(exe, error = %e, "pwsh probe failed to spawn"),
            }
        }
        Err(RelocateError::Bridge(format!(
            "pwsh not found (tried: {})",
            tried.join(", ")
        )))
    }

    /// Run a script body and return its JSON object lines.
    fn run(&self, body: &str) -> io::Result<Vec<Map<String, Value>>> {
        let out = Command::new(&self.exe)
            .args(["-NoProfile", "-NonInteractive", "-EncodedCommand"])
            .arg(encode_command(&script(body)))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| io::Error::new(e.kind(), format!("spawn {}: {e}", self.exe)))?;
        let stdout = String::from_utf8_lossy(&out.stdout);
        if out.status.success() {
            return Ok(parse_json_lines(&stdout));
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        let details: Vec<&str> = [stderr.trim(), stdout.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        let msg = if details.is_empty() {
            format!("pwsh failed with {}", out.status)
        } else {
            details.join("\n")
        };
        let kind = match out.status.code() {
            Some(2) => io::ErrorKind::NotFound,
            _ => io::ErrorKind::Other,
        };
        Err(io::Error::new(kind, msg))
    }

    fn run_one(&self, body: &str) -> io::Result<Map<String, Value>> {
        self.run(body)?
            .pop()
            .ok_or_else(|| invalid("pwsh produced no JSON result"))
    }
}

impl FileSystemGateway for PwshGateway {
    fn list_dir(&self, dir: &PathLiteral) -> io::Result<Vec<Result<DirEntryInfo, EntryFault>>> {
        let body = format!(
            "$d = [System.IO.DirectoryInfo]::new({p})\n\
             if (-not $d.Exists) {{ throw [System.IO.DirectoryNotFoundException]::new(\"directory not found: \" + $d.FullName) }}\n\
             foreach ($e in $d.EnumerateFileSystemInfos()) {{\n\
               try {{\n\
                 $a = $e.Attributes\n\
                 $k = if ($e -is [System.IO.DirectoryInfo]) {{ if ($a -band [System.IO.FileAttributes]::ReparsePoint) {{ 'other' }} else {{ 'dir' }} }} else {{ 'file' }}\n\
                 Emit @{{ name = $e.Name; kind = $k }}\n\
               }} catch {{ Emit @{{ name = $e.Name; error = $_.Exception.Message }} }}\n\
             }}",
            p = ps_quote(dir.as_str())
        );
        let rows = self.run(&body)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let name = row
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                match row.get("error").and_then(Value::as_str) {
                    Some(msg) => Err(EntryFault {
                        name,
                        message: msg.to_string(),
                    }),
                    None => Ok(DirEntryInfo {
                        name,
                        kind: kind_from(row.get("kind").and_then(Value::as_str).unwrap_or("")),
                    }),
                }
            })
            .collect())
    }

    fn stat(&self, path: &PathLiteral) -> io::Result<FileStat> {
        let body = format!(
            "$i = Get-Item -LiteralPath {p} -Force\n\
             $k = if ($i -is [System.IO.DirectoryInfo]) {{ 'dir' }} else {{ 'file' }}\n\
             $n = if ($k -eq 'file') {{ $i.Length }} else {{ 0 }}\n\
             Emit @{{ kind = $k; size = $n; mtimeUtc = $i.LastWriteTimeUtc.ToString('o') }}",
            p = ps_quote(path.as_str())
        );
        let row = self.run_one(&body)?;
        let modified = row
            .get("mtimeUtc")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        Ok(FileStat {
            kind: kind_from(row.get("kind").and_then(Value::as_str).unwrap_or("")),
            size: row.get("size").and_then(Value::as_u64).unwrap_or(0),
            modified,
        })
    }

    fn exists(&self, path: &PathLiteral) -> io::Result<bool> {
        let body = format!(
            "Emit @{{ exists = (Test-Path -LiteralPath {p}) }}",
            p = ps_quote(path.as_str())
        );
        self.run_one(&body)?
            .get("exists")
            .and_then(Value::as_bool)
            .ok_or_else(|| invalid("pwsh exists: missing 'exists'"))
    }

    fn read_head(&self, path: &PathLiteral, budget: usize) -> io::Result<usize> {
        let body = format!(
            "$share = [System.IO.FileShare]::ReadWrite -bor [System.IO.FileShare]::Delete\n\
             $fs = [System.IO.File]::Open({p}, [System.IO.FileMode]::Open, [System.IO.FileAccess]::Read, $share)\n\
             try {{\n\
               $buf = [byte[]]::new({n}); $total = 0\n\
               while ($total -lt {n}) {{ $r = $fs.Read($buf, $total, {n} - $total); if ($r -le 0) {{ break }}; $total += $r }}\n\
               Emit @{{ read = $total }}\n\
             }} finally {{ $fs.Dispose() }}",
            p = ps_quote(path.as_str()),
            n = budget.max(1)
        );
        self.run_one(&body)?
            .get("read")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| invalid("pwsh read_head: missing 'read'"))
    }

    fn sha256(&self, path: &PathLiteral) -> io::Result<String> {
        let body = format!(
            "$share = [System.IO.FileShare]::ReadWrite -bor [System.IO.FileShare]::Delete\n\
             $fs = [System.IO.File]::Open({p}, [System.IO.FileMode]::Open, [System.IO.FileAccess]::Read, $share)\n\
             try {{\n\
               $h = [System.Security.Cryptography.SHA256]::Create().ComputeHash($fs)\n\
               Emit @{{ sha256 = ([System.Convert]::ToHexString($h)).ToLowerInvariant() }}\n\
             }} finally {{ $fs.Dispose() }}",
            p = ps_quote(path.as_str())
        );
        self.run_one(&body)?
            .get("sha256")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| invalid("pwsh sha256: missing 'sha256'"))
    }

    fn ensure_dir(&self, dir: &PathLiteral) -> io::Result<()> {
        let body = format!(
            "[void][System.IO.Directory]::CreateDirectory({p})\nEmit @{{ ok = $true }}",
            p = ps_quote(dir.as_str())
        );
        self.run(&body).map(|_| ())
    }

    fn move_file(&self, src: &PathLiteral, dst: &PathLiteral) -> io::Result<()> {
        let body = format!(
            "Move-Item -LiteralPath {s} -Destination {d} -Force\nEmit @{{ ok = $true }}",
            s = ps_quote(src.as_str()),
            d = ps_quote(dst.as_str())
        );
        self.run(&body).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_doubles_every_single_quote_variant() {
        assert_eq!(ps_quote(r"C:\a b"), r"'C:\a b'");
        assert_eq!(ps_quote("it's"), "'it''s'");
        assert_eq!(ps_quote("\u{2018}x\u{2019}"), "'\u{2018}\u{2018}x\u{2019}\u{2019}'");
        assert_eq!(ps_quote("$env:X `n"), "'$env:X `n'");
    }

    #[test]
    fn encoded_command_is_utf16le_base64() {
        // "dir" -> 64 00 69 00 72 00
        assert_eq!(encode_command("dir"), "ZABpAHIA");
        let decoded = STANDARD.decode(encode_command("é")).unwrap();
        assert_eq!(decoded, vec![0xE9, 0x00]);
    }

    #[test]
    fn json_lines_skip_noise_and_non_objects() {
        let out = "WARNING: profile\n{\"name\":\"a\",\"kind\":\"file\"}\n\n[1,2]\n{\"name\":\"b\"}\r\n";
        let rows = parse_json_lines(out);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "a");
        assert_eq!(rows[1]["name"], "b");
    }

    #[test]
    fn script_wraps_body_in_error_handler() {
        let s = script("Emit @{ ok = $true }");
        assert!(s.starts_with("$ErrorActionPreference = 'Stop'"));
        assert!(s.contains("exit 1"));
        assert!(s.contains("Emit @{ ok = $true }"));
    }

    #[test]
    fn discover_reports_all_candidates_when_none_work() {
        let err = PwshGateway::discover(Some("/nonexistent/relocator-test-pwsh"));
        // A machine with pwsh installed finds a real candidate; otherwise the error lists them.
        if let Err(RelocateError::Bridge(msg)) = err {
            assert!(msg.contains("/nonexistent/relocator-test-pwsh"));
            assert!(msg.contains("pwsh.exe"));
        }
    }
}
