use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or running a save/restore invocation
#[derive(Debug, Error)]
pub enum Error {
    /// Rules directory could not be created or is not writable
    #[error("{} is either invalid or inaccessible", .path.display())]
    RulesDirInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Can't selectively restore a rule file. You should instead selectively save a \
         rule file and restore it in its entirety."
    )]
    RestoreWithChains,

    #[error(
        "Must choose a chain to selectively save the rules. Use regular iptables-save if \
         no specific chain is needed to be saved"
    )]
    SaveWithoutChains,

    /// External save/restore tool exited unsuccessfully
    #[error("{program} failed (exit code {}): {stderr}", .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Invalid chain name '{0}'")]
    InvalidChain(String),

    #[error("Failed to parse config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
