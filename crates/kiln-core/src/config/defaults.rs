//! Default configuration values

use super::types::Config;

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "kiln.yaml";

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "kiln.toml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".kiln.yaml";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_YAML,
        DEFAULT_CONFIG_TOML,
        ALT_CONFIG_FILE,
        ".kiln.toml",
    ]
}

/// Generate default configuration YAML
pub fn default_config_yaml() -> String {
    let config = Config::default();
    serde_yaml::to_string(&config).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Generate default configuration TOML
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_default()
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# kiln configuration

project:
  name: project
  source_dirs: [src]
  include_dirs: [src]
  exclude: []
  out_dir: out
  bin_dir: bin
  library_dir: lib
  executables: [project]
  dynamic_libraries: []
  static_libraries: []
  build_kinds: [executable]

toolchain:
  name: clang
  msgc: opp_msgc
  msgc_flags: []
  cxx: clang++
  cxxflags: [-std=c++17, -fPIC]
  ldflags: []
  ar: ar
  debug_flags: [-O0, -g]
  release_flags: [-O3, -DNDEBUG]

build:
  mode: release
  concurrent: true
  failure_policy: halt
"#;
