//! Configuration: types, default locations and the XML loader.
//! CLI overrides are applied on top by `cli::Args::apply_overrides`.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{CONFIG_ENV, config_location, default_config_path, default_ops_root, path_has_symlink_ancestor};
pub use types::{Backend, Config, LogLevel};
pub use xml::{LoadedConfig, load_config, parse_config_xml};

/// Extensions inventoried when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".mp4"];
pub const DEFAULT_SCAN_RETRY_COUNT: u32 = 1;
