use std::fs;
use std::path::Path;

use super::root::Config;
use super::validator::validate;
use crate::error::{EngineError, Result};

pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let config: Config =
        toml::from_str(&text).map_err(|err| EngineError::Config(format!("failed to parse config: {err}")))?;

    if let Err(problems) = validate(&config) {
        return Err(EngineError::Config(problems.join("; ")));
    }

    Ok(config)
}
