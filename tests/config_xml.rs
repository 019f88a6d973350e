use assert_fs::TempDir;
use assert_fs::prelude::*;

use relocator::config::{Backend, LogLevel, load_config, parse_config_xml};
use relocator::relocate::OnDstExists;
use std::path::PathBuf;

#[test]
fn full_config_is_read() {
    let xml = r#"
<config>
  <ops_root>/srv/relocator/ops</ops_root>
  <log_level>debug</log_level>
  <log_file>/var/log/relocator.log</log_file>
  <backend>pwsh</backend>
  <pwsh_exe>/opt/microsoft/powershell/7/pwsh</pwsh_exe>
  <on_dst_exists>rename_suffix</on_dst_exists>
  <corruption_read_bytes> 8192 </corruption_read_bytes>
  <scan_retry_count>3</scan_retry_count>
  <extensions>mp4, .MKV</extensions>
  <drive letter="d">/mnt/media</drive>
  <drive letter="E">/mnt/backup</drive>
</config>"#;
    let cfg = parse_config_xml(xml).unwrap();
    assert_eq!(cfg.ops_root, PathBuf::from("/srv/relocator/ops"));
    assert_eq!(cfg.log_level, LogLevel::Debug);
    assert_eq!(cfg.log_file, Some(PathBuf::from("/var/log/relocator.log")));
    assert_eq!(cfg.backend, Backend::Pwsh);
    assert_eq!(cfg.pwsh_exe.as_deref(), Some("/opt/microsoft/powershell/7/pwsh"));
    assert_eq!(cfg.on_dst_exists, OnDstExists::RenameSuffix);
    assert_eq!(cfg.corruption_read_bytes, 8192);
    assert_eq!(cfg.scan_retry_count, 3);
    assert_eq!(
        cfg.extensions.iter().cloned().collect::<Vec<_>>(),
        vec![".mkv".to_string(), ".mp4".to_string()]
    );
    assert_eq!(cfg.drives.get('D'), Some(PathBuf::from("/mnt/media").as_path()));
    assert_eq!(cfg.drives.get('e'), Some(PathBuf::from("/mnt/backup").as_path()));
}

#[test]
fn missing_elements_keep_defaults() {
    let cfg = parse_config_xml("<config><log_level>quiet</log_level></config>").unwrap();
    assert_eq!(cfg.log_level, LogLevel::Quiet);
    assert_eq!(cfg.backend, Backend::Native);
    assert_eq!(cfg.on_dst_exists, OnDstExists::Error);
    assert_eq!(cfg.corruption_read_bytes, 4096);
    assert_eq!(cfg.scan_retry_count, 1);
    assert_eq!(cfg.extensions.iter().cloned().collect::<Vec<_>>(), vec![".mp4".to_string()]);
    assert!(cfg.drives.is_empty());
    assert!(cfg.log_file.is_none());
}

#[test]
fn empty_and_whitespace_values_are_ignored() {
    let cfg = parse_config_xml(
        "<config><log_file>   </log_file><extensions></extensions><scan_retry_count> </scan_retry_count></config>",
    )
    .unwrap();
    assert!(cfg.log_file.is_none());
    assert_eq!(cfg.scan_retry_count, 1);
    assert_eq!(cfg.extensions.len(), 1);
}

#[test]
fn bad_values_and_unknown_elements_are_rejected() {
    assert!(parse_config_xml("<config><log_level>loud</log_level></config>").is_err());
    assert!(parse_config_xml("<config><backend>ftp</backend></config>").is_err());
    assert!(parse_config_xml("<config><on_dst_exists>skip</on_dst_exists></config>").is_err());
    assert!(parse_config_xml("<config><scan_retry_count>many</scan_retry_count></config>").is_err());
    assert!(parse_config_xml("<config><typo>1</typo></config>").is_err());
    assert!(parse_config_xml(r#"<config><drive letter="DD">/x</drive></config>"#).is_err());
    assert!(parse_config_xml("<config><ops_root>").is_err());
}

#[test]
fn explicit_file_is_loaded_and_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("relocator.xml");
    file.write_str("<config><backend>native</backend><scan_retry_count>0</scan_retry_count></config>")
        .unwrap();
    let loaded = load_config(Some(file.path())).unwrap();
    assert_eq!(loaded.source.as_deref(), Some(file.path()));
    assert_eq!(loaded.config.scan_retry_count, 0);

    let err = load_config(Some(dir.child("absent.xml").path())).unwrap_err();
    assert!(format!("{err:#}").contains("config file not found"));
}
