use std::collections::HashSet;

/// Marker that opens a table block in iptables-save output (`*filter`, `*nat`, ...)
pub const TABLE_MARKER: &str = "*";
/// Line that closes a table block
pub const COMMIT: &str = "COMMIT";

/// One table block of a rule dump, from its `*name` line up to the next table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub lines: Vec<String>,
}

impl Table {
    /// Build a table, dropping lines that repeat an earlier line verbatim
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for line in lines {
            let line = line.into();
            if seen.insert(line.clone()) {
                unique.push(line);
            }
        }
        Self { lines: unique }
    }

    /// Table name taken from the marker line, e.g. `filter` for `*filter`
    pub fn name(&self) -> Option<&str> {
        self.lines
            .first()
            .and_then(|line| line.trim().strip_prefix(TABLE_MARKER))
            .map(str::trim)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Split a save-tool dump into tables.
///
/// Every line containing `*` starts a new table, which runs until the next
/// such line or the end of input. Lines before the first marker belong to no
/// table and are discarded, so a dump without any marker yields no tables.
pub fn derive_tables<S: AsRef<str>>(lines: &[S]) -> Vec<Table> {
    let mut bounds: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.as_ref().contains(TABLE_MARKER))
        .map(|(idx, _)| idx)
        .collect();

    if bounds.is_empty() {
        tracing::debug!(lines = lines.len(), "dump contains no table markers");
        return Vec::new();
    }

    bounds.push(lines.len());
    bounds.sort_unstable();
    bounds.dedup();

    bounds
        .windows(2)
        .map(|range| {
            Table::from_lines(
                lines[range[0]..range[1]]
                    .iter()
                    .map(|line| line.as_ref().to_string()),
            )
        })
        .collect()
}

/// Parse raw save-tool output into tables
pub fn parse_dump(text: &str) -> Vec<Table> {
    let lines: Vec<&str> = text.lines().collect();
    derive_tables(&lines)
}

/// Render tables back to the newline-terminated text the restore tool expects
pub fn render_tables(tables: &[Table]) -> String {
    let mut out = String::new();
    for line in tables.iter().flat_map(|t| t.lines.iter()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}
