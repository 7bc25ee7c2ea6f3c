use crate::error::{Error, Result};
use crate::filter::MatchMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/iptables-dynamic.yaml";
pub const DEFAULT_RULES_DIR: &str = "/etc/iptables";

/// Address family the save/restore tools operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn from_ipv6_flag(ipv6: bool) -> Self {
        if ipv6 { Self::V6 } else { Self::V4 }
    }

    /// Rules file suffix: `v4` or `v6`
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::V4 => "v4",
            Self::V6 => "v6",
        }
    }

    /// Tool name prefix: `iptables` or `ip6tables`
    pub fn tool_prefix(&self) -> &'static str {
        match self {
            Self::V4 => "iptables",
            Self::V6 => "ip6tables",
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// Save/restore program pair for one address family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPair {
    pub save: String,
    pub restore: String,
}

impl ToolPair {
    pub fn for_version(version: IpVersion) -> Self {
        Self {
            save: format!("{}-save", version.tool_prefix()),
            restore: format!("{}-restore", version.tool_prefix()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tools {
    #[serde(default = "default_v4_tools")]
    pub v4: ToolPair,
    #[serde(default = "default_v6_tools")]
    pub v6: ToolPair,
}

impl Tools {
    pub fn for_version(&self, version: IpVersion) -> &ToolPair {
        match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        }
    }
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            v4: default_v4_tools(),
            v6: default_v6_tools(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub tools: Tools,
}

impl Config {
    pub fn from_yaml(yaml: &str, origin: &Path) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|source| Error::Config {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        // An empty file deserializes to null rather than an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_yaml(&content, path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_dir: default_rules_dir(),
            match_mode: MatchMode::default(),
            tools: Tools::default(),
        }
    }
}

fn default_rules_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_DIR)
}

fn default_v4_tools() -> ToolPair {
    ToolPair::for_version(IpVersion::V4)
}

fn default_v6_tools() -> ToolPair {
    ToolPair::for_version(IpVersion::V6)
}
