use crate::config::IpVersion;
use crate::error::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory holding the full dump (`temp.vN`) and filtered rules (`rules.vN`)
#[derive(Debug, Clone)]
pub struct RuleStore {
    dir: PathBuf,
}

impl RuleStore {
    /// Create the directory if needed and check that it accepts new files
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let inaccessible = |source| Error::RulesDirInaccessible {
            path: dir.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(inaccessible)?;
        tempfile::Builder::new()
            .prefix(".ipd-probe")
            .tempfile_in(&dir)
            .map_err(inaccessible)?;

        tracing::debug!(dir = %dir.display(), "rules directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn temp_path(&self, version: IpVersion) -> PathBuf {
        self.dir.join(format!("temp.{}", version.suffix()))
    }

    pub fn rules_path(&self, version: IpVersion) -> PathBuf {
        self.dir.join(format!("rules.{}", version.suffix()))
    }

    pub fn has_rules(&self, version: IpVersion) -> bool {
        self.rules_path(version).is_file()
    }

    pub fn read_dump(&self, version: IpVersion) -> Result<String> {
        Ok(std::fs::read_to_string(self.temp_path(version))?)
    }

    /// Current rules file content, or `None` if nothing was saved yet
    pub fn read_rules(&self, version: IpVersion) -> Result<Option<String>> {
        match std::fs::read_to_string(self.rules_path(version)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the rules file through a sibling temp file and rename
    pub fn write_rules(&self, version: IpVersion, content: &str) -> Result<PathBuf> {
        let path = self.rules_path(version);
        let mut temp = tempfile::Builder::new()
            .prefix(".rules")
            .tempfile_in(&self.dir)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&path).map_err(|e| e.error)?;

        tracing::info!(path = %path.display(), bytes = content.len(), "wrote rules file");
        Ok(path)
    }

    /// Remove the full dump left by the save tool, if any
    pub fn discard_dump(&self, version: IpVersion) -> Result<()> {
        match std::fs::remove_file(self.temp_path(version)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
