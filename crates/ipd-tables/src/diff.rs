use similar::{ChangeTag, TextDiff};
use std::path::PathBuf;

/// Comparison between the saved rules file and freshly filtered rules
pub struct RulesDiff {
    pub path: PathBuf,
    pub matches: bool,
    pub current_exists: bool,
    pub diff: Option<String>,
}

impl RulesDiff {
    pub fn new(path: PathBuf, current: Option<&str>, desired: &str) -> Self {
        match current {
            Some(current) if current == desired => Self {
                path,
                matches: true,
                current_exists: true,
                diff: None,
            },
            Some(current) => Self {
                path,
                matches: false,
                current_exists: true,
                diff: Some(render_diff(current, desired)),
            },
            None => Self {
                path,
                matches: false,
                current_exists: false,
                diff: Some(render_diff("", desired)),
            },
        }
    }

    pub fn display(&self) {
        if self.matches {
            println!("✅ {} is up to date", self.path.display());
            return;
        }

        if self.current_exists {
            println!("📝 Changes to {}:\n", self.path.display());
        } else {
            println!("📝 {} does not exist yet, would create:\n", self.path.display());
        }

        if let Some(diff) = &self.diff {
            print!("{}", diff);
        }
    }
}

fn render_diff(current: &str, desired: &str) -> String {
    let diff = TextDiff::from_lines(current, desired);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        output.push(sign);
        output.push_str(change.value());
        if change.missing_newline() {
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_has_no_diff() {
        let diff = RulesDiff::new("rules.v4".into(), Some("*filter\nCOMMIT\n"), "*filter\nCOMMIT\n");
        assert!(diff.matches);
        assert!(diff.diff.is_none());
    }

    #[test]
    fn changed_lines_are_marked() {
        let current = "*filter\n-A INPUT -j DROP\nCOMMIT\n";
        let desired = "*filter\n-A INPUT -j ACCEPT\nCOMMIT\n";
        let diff = RulesDiff::new("rules.v4".into(), Some(current), desired);
        assert!(!diff.matches);
        assert!(diff.current_exists);
        let text = diff.diff.unwrap();
        assert!(text.contains("--A INPUT -j DROP\n"));
        assert!(text.contains("+-A INPUT -j ACCEPT\n"));
        assert!(text.contains(" *filter\n"));
    }

    #[test]
    fn missing_file_shows_full_insert() {
        let diff = RulesDiff::new("rules.v6".into(), None, "*filter\nCOMMIT");
        assert!(!diff.current_exists);
        assert_eq!(diff.diff.as_deref(), Some("+*filter\n+COMMIT\n"));
    }
}
