/// `load_config` module: reads the desired-state YAML file into a validated [`DataConfig`].
///
/// This is the only place where user-supplied YAML is parsed.
///
/// # Responsibilities
/// - Parse the configuration file into the core's strongly typed [`DataConfig`]
/// - Resolve a relative `path_docs` against the directory holding the file, so the result does
///   not depend on the working directory
/// - Validate before anything talks to the remote store
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use textsync_core::config::DataConfig;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "docs/text.yaml";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DataConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: DataConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let base = path_ref.parent().unwrap_or_else(|| Path::new(""));
    config.path_docs = resolve(base, &config.path_docs);

    if let Err(e) = config.validate() {
        error!(error = %e, config_path = ?path_ref, "Configuration is invalid");
        return Err(anyhow::Error::new(e).context(format!("Invalid configuration {path_ref:?}")));
    }
    config.trace_loaded();

    Ok(config)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
