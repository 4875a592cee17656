use serde::Deserialize;

/// Output destination for the rotating CSV collectors.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectorsConfig {
    /// Directory the rotated CSV files are written into.
    #[serde(rename = "out-dir")]
    pub out_dir: String,
}
