use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThreadMode {
    /// Derive the connection count from the CPU count and `auto_level`
    Auto,
    /// Use `custom_threads` connections
    Custom,
}

#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoLevel {
    Low,
    Medium,
    High,
    Maximum,
}
