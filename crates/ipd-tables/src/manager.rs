use crate::diff::RulesDiff;
use crate::tool::RuleTool;
use anyhow::{Context, Result};
use ipd_core::{ChainFilter, FilterOutcome, RuleStore, parse_dump, render_tables};
use std::path::PathBuf;

/// Summary of a completed save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub rules_path: PathBuf,
    pub tables: usize,
    pub lines: usize,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(PathBuf),
    /// Nothing saved for this address family
    NoRules,
}

/// Drives save and restore for one address family
pub struct ChainManager<T> {
    tool: T,
    store: RuleStore,
}

impl<T: RuleTool> ChainManager<T> {
    pub fn new(tool: T, store: RuleStore) -> Self {
        Self { tool, store }
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Dump the live rules to the temp file and filter them down to `filter`'s chains
    async fn dump_and_filter(&self, filter: &ChainFilter) -> Result<FilterOutcome> {
        let version = self.tool.version();
        let temp_path = self.store.temp_path(version);

        self.tool.dump(&temp_path).await?;
        let dump = self
            .store
            .read_dump(version)
            .with_context(|| format!("Failed to read dump {}", temp_path.display()))?;

        let tables = parse_dump(&dump);
        tracing::debug!(tables = tables.len(), "parsed rule dump");

        Ok(filter.filter_tables(&tables))
    }

    /// Save only the rules needed to rebuild the chains selected by `filter`.
    ///
    /// Chains missing from the dump are reported but do not stop the save,
    /// which may then write an empty rules file.
    pub async fn save(&self, filter: &ChainFilter) -> Result<SaveReport> {
        let version = self.tool.version();
        let outcome = self.dump_and_filter(filter).await?;

        let content = render_tables(&outcome.tables);
        let rules_path = self
            .store
            .write_rules(version, &content)
            .context("Failed to write rules file")?;
        self.store.discard_dump(version)?;

        Ok(SaveReport {
            rules_path,
            tables: outcome.tables.len(),
            lines: outcome.tables.iter().map(|t| t.len()).sum(),
            missing: outcome.missing,
        })
    }

    /// Compute what `save` would write without touching the rules file
    pub async fn preview(&self, filter: &ChainFilter) -> Result<(RulesDiff, Vec<String>)> {
        let version = self.tool.version();
        let outcome = self.dump_and_filter(filter).await?;
        self.store.discard_dump(version)?;

        let desired = render_tables(&outcome.tables);
        let current = self.store.read_rules(version)?;
        let diff = RulesDiff::new(self.store.rules_path(version), current.as_deref(), &desired);

        Ok((diff, outcome.missing))
    }

    /// Load the saved rules file in its entirety, if one exists
    pub async fn restore(&self) -> Result<RestoreOutcome> {
        let version = self.tool.version();
        let rules_path = self.store.rules_path(version);

        if !self.store.has_rules(version) {
            tracing::debug!(path = %rules_path.display(), "no saved rules, skipping restore");
            return Ok(RestoreOutcome::NoRules);
        }

        self.tool.restore(&rules_path).await?;
        tracing::info!(path = %rules_path.display(), "restored rules");
        Ok(RestoreOutcome::Restored(rules_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipd_core::{IpVersion, MatchMode};
    use std::path::Path;
    use std::sync::Mutex;

    const DUMP: &str = "\
# Generated by iptables-save v1.8.7
*nat
:PREROUTING ACCEPT [0:0]
:DOCKER - [0:0]
-A PREROUTING -m addrtype --dst-type LOCAL -j DOCKER
COMMIT
*filter
:INPUT ACCEPT [0:0]
:LOGDROP - [0:0]
-A INPUT -j LOGDROP
-A INPUT -j LOGDROP
-A OUTPUT -j ACCEPT
-A LOGDROP -j DROP
COMMIT
";

    /// Records restore calls and serves a fixed dump
    struct FakeTool {
        version: IpVersion,
        dump: String,
        restored: Mutex<Vec<String>>,
    }

    impl FakeTool {
        fn new(version: IpVersion) -> Self {
            Self {
                version,
                dump: DUMP.to_string(),
                restored: Mutex::new(Vec::new()),
            }
        }
    }

    impl RuleTool for FakeTool {
        fn version(&self) -> IpVersion {
            self.version
        }

        async fn dump(&self, dest: &Path) -> Result<()> {
            std::fs::write(dest, &self.dump)?;
            Ok(())
        }

        async fn restore(&self, src: &Path) -> Result<()> {
            let content = std::fs::read_to_string(src)?;
            self.restored.lock().unwrap().push(content);
            Ok(())
        }
    }

    fn manager(dir: &Path, version: IpVersion) -> ChainManager<FakeTool> {
        ChainManager::new(FakeTool::new(version), RuleStore::open(dir).unwrap())
    }

    #[tokio::test]
    async fn save_writes_filtered_rules_and_removes_dump() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), IpVersion::V4);
        let filter = ChainFilter::new(["INPUT"], MatchMode::Substring).unwrap();

        let report = mgr.save(&filter).await.unwrap();

        assert_eq!(report.rules_path, dir.path().join("rules.v4"));
        assert_eq!(report.tables, 1);
        assert_eq!(report.lines, 4);
        assert!(report.missing.is_empty());
        assert_eq!(
            std::fs::read_to_string(&report.rules_path).unwrap(),
            "*filter\n:INPUT ACCEPT [0:0]\n-A INPUT -j LOGDROP\nCOMMIT\n"
        );
        assert!(!dir.path().join("temp.v4").exists());
    }

    #[tokio::test]
    async fn save_keeps_tables_for_every_requested_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), IpVersion::V6);
        let filter = ChainFilter::new(["docker", "logdrop"], MatchMode::Substring).unwrap();

        let report = mgr.save(&filter).await.unwrap();

        assert_eq!(report.rules_path, dir.path().join("rules.v6"));
        assert_eq!(report.tables, 2);
        let saved = std::fs::read_to_string(&report.rules_path).unwrap();
        assert!(saved.starts_with("*nat\n"));
        assert!(saved.contains("-A LOGDROP -j DROP\n"));
        assert!(!saved.contains("OUTPUT"));
    }

    #[tokio::test]
    async fn save_with_unknown_chain_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), IpVersion::V4);
        let filter = ChainFilter::new(["NOTFOUND"], MatchMode::Substring).unwrap();

        let report = mgr.save(&filter).await.unwrap();

        assert_eq!(report.missing, vec!["NOTFOUND".to_string()]);
        assert_eq!(report.tables, 0);
        assert_eq!(std::fs::read_to_string(&report.rules_path).unwrap(), "");
    }

    #[tokio::test]
    async fn preview_leaves_rules_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), IpVersion::V4);
        std::fs::write(dir.path().join("rules.v4"), "*filter\nCOMMIT\n").unwrap();
        let filter = ChainFilter::new(["LOGDROP"], MatchMode::Substring).unwrap();

        let (diff, missing) = mgr.preview(&filter).await.unwrap();

        assert!(missing.is_empty());
        assert!(diff.current_exists);
        assert!(!diff.matches);
        assert!(diff.diff.unwrap().contains("+-A LOGDROP -j DROP\n"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("rules.v4")).unwrap(),
            "*filter\nCOMMIT\n"
        );
        assert!(!dir.path().join("temp.v4").exists());
    }

    #[tokio::test]
    async fn restore_without_rules_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), IpVersion::V6);

        assert_eq!(mgr.restore().await.unwrap(), RestoreOutcome::NoRules);
        assert!(mgr.tool.restored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn restore_loads_saved_file() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), IpVersion::V4);
        let filter = ChainFilter::new(["INPUT"], MatchMode::Substring).unwrap();
        mgr.save(&filter).await.unwrap();

        let outcome = mgr.restore().await.unwrap();

        assert_eq!(
            outcome,
            RestoreOutcome::Restored(dir.path().join("rules.v4"))
        );
        let restored = mgr.tool.restored.lock().unwrap();
        assert_eq!(restored.len(), 1);
        assert!(restored[0].contains("-A INPUT -j LOGDROP"));
    }

    #[tokio::test]
    async fn restore_only_reads_own_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rules.v4"), "*filter\nCOMMIT\n").unwrap();
        let mgr = manager(dir.path(), IpVersion::V6);

        assert_eq!(mgr.restore().await.unwrap(), RestoreOutcome::NoRules);
    }
}
