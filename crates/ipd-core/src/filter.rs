use crate::dump::{COMMIT, TABLE_MARKER, Table};
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a requested chain name is located inside a rule line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Plain substring search. `INPUT` also matches `-A MYINPUT ...`.
    #[default]
    Substring,
    /// The name must be bounded by characters that cannot appear in a chain name
    Token,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "substring" => Ok(Self::Substring),
            "token" => Ok(Self::Token),
            other => Err(format!("Unknown match mode '{}'", other)),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring => write!(f, "substring"),
            Self::Token => write!(f, "token"),
        }
    }
}

#[derive(Debug, Clone)]
enum ChainPattern {
    Substring { upper: String, lower: String },
    Token(Regex),
}

impl ChainPattern {
    fn new(chain: &str, mode: MatchMode) -> Result<Self> {
        let upper = chain.to_uppercase();
        let lower = chain.to_lowercase();
        match mode {
            MatchMode::Substring => Ok(Self::Substring { upper, lower }),
            MatchMode::Token => {
                let pattern = format!(
                    r"(?:^|[^A-Za-z0-9_\-])(?:{}|{})(?:$|[^A-Za-z0-9_\-])",
                    regex::escape(&upper),
                    regex::escape(&lower)
                );
                Regex::new(&pattern)
                    .map(Self::Token)
                    .map_err(|_| Error::InvalidChain(chain.to_string()))
            }
        }
    }

    fn matches(&self, line: &str) -> bool {
        match self {
            Self::Substring { upper, lower } => {
                line.contains(upper.as_str()) || line.contains(lower.as_str())
            }
            Self::Token(re) => re.is_match(line),
        }
    }
}

/// Lines every table needs to stay loadable by the restore tool
pub fn is_structural(line: &str) -> bool {
    line.contains(TABLE_MARKER) || line.contains(COMMIT)
}

/// Result of filtering a dump down to the requested chains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Tables that still hold at least one chain-specific line, in dump order
    pub tables: Vec<Table>,
    /// Requested chains with no matching line in any retained table
    pub missing: Vec<String>,
}

impl FilterOutcome {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Keeps the lines of a dump that are needed to preserve a set of chains
#[derive(Debug, Clone)]
pub struct ChainFilter {
    chains: Vec<(String, ChainPattern)>,
    mode: MatchMode,
}

impl ChainFilter {
    pub fn new<I, S>(chains: I, mode: MatchMode) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled: Vec<(String, ChainPattern)> = Vec::new();
        for chain in chains {
            let chain = chain.as_ref().trim();
            if chain.is_empty() {
                return Err(Error::InvalidChain(chain.to_string()));
            }
            if compiled.iter().any(|(name, _)| name == chain) {
                continue;
            }
            compiled.push((chain.to_string(), ChainPattern::new(chain, mode)?));
        }

        Ok(Self {
            chains: compiled,
            mode,
        })
    }

    pub fn chains(&self) -> impl Iterator<Item = &str> {
        self.chains.iter().map(|(name, _)| name.as_str())
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    fn matches_any_chain(&self, line: &str) -> bool {
        self.chains.iter().any(|(_, pattern)| pattern.matches(line))
    }

    /// Strip a table down to structural and chain lines.
    ///
    /// Returns `None` when no chain line survives, since a table holding only
    /// its marker and `COMMIT` carries no state worth saving.
    pub fn filter_table(&self, table: &Table) -> Option<Table> {
        let lines: Vec<String> = table
            .lines
            .iter()
            .filter(|line| is_structural(line) || self.matches_any_chain(line))
            .cloned()
            .collect();

        if lines.iter().any(|line| self.matches_any_chain(line)) {
            Some(Table { lines })
        } else {
            None
        }
    }

    pub fn filter_tables(&self, tables: &[Table]) -> FilterOutcome {
        let kept: Vec<Table> = tables
            .iter()
            .filter_map(|table| {
                let filtered = self.filter_table(table);
                if filtered.is_none() {
                    tracing::debug!(
                        table = table.name().unwrap_or("?"),
                        "dropping table with no requested chains"
                    );
                }
                filtered
            })
            .collect();

        let missing: Vec<String> = self
            .chains
            .iter()
            .filter(|(_, pattern)| {
                !kept
                    .iter()
                    .flat_map(|t| t.lines.iter())
                    .any(|line| pattern.matches(line))
            })
            .map(|(name, _)| name.clone())
            .collect();

        for chain in &missing {
            tracing::info!(chain = %chain, "chain not found in dump");
        }

        FilterOutcome {
            tables: kept,
            missing,
        }
    }
}
