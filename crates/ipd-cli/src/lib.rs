use anyhow::Context;
use clap::{ArgGroup, Parser};
use ipd_core::{
    ChainFilter, Config, DEFAULT_CONFIG_PATH, Error, IpVersion, MatchMode, RuleStore,
};
use ipd_tables::{ChainManager, IptablesTool, RestoreOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Save and restore iptables rules for selected chains", long_about = None)]
#[command(group(ArgGroup::new("action").required(true).args(["save", "restore"])))]
pub struct Cli {
    /// Save the rules for the desired chains
    #[arg(short, long)]
    pub save: bool,

    /// Restore the saved rules in their entirety
    #[arg(short, long)]
    pub restore: bool,

    /// Chains to preserve when saving
    #[arg(short, long, num_args = 1..)]
    pub chains: Vec<String>,

    /// Operate on ip6tables and the v6 rules file
    #[arg(short = '6', long)]
    pub ipv6: bool,

    /// Show what --save would write without changing the rules file
    #[arg(long, requires = "save")]
    pub dry_run: bool,

    /// How chain names are matched against rule lines (substring or token)
    #[arg(long)]
    pub match_mode: Option<MatchMode>,

    /// Directory holding the rules files [default: /etc/iptables]
    #[arg(long)]
    pub rules_dir: Option<PathBuf>,

    /// YAML config file; a missing file means defaults
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated action requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Save { chains: Vec<String>, dry_run: bool },
    Restore,
}

impl Cli {
    /// Check flag combinations before anything touches the filesystem.
    ///
    /// A restore always loads the whole saved file, so naming chains there is
    /// rejected instead of silently ignored.
    pub fn action(&self) -> Result<Action, Error> {
        if self.restore && !self.chains.is_empty() {
            return Err(Error::RestoreWithChains);
        }
        if self.save && self.chains.is_empty() {
            return Err(Error::SaveWithoutChains);
        }

        if self.save {
            Ok(Action::Save {
                chains: self.chains.clone(),
                dry_run: self.dry_run,
            })
        } else {
            Ok(Action::Restore)
        }
    }

    pub fn ip_version(&self, always_ipv6: bool) -> IpVersion {
        IpVersion::from_ipv6_flag(always_ipv6 || self.ipv6)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point shared by `iptables-dynamic` and `ip6tables-dynamic`
pub fn run(always_ipv6: bool) -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let action = cli.action()?;
    let version = cli.ip_version(always_ipv6);

    let config = Config::load(&cli.config)?;
    let rules_dir = cli.rules_dir.clone().unwrap_or_else(|| config.rules_dir.clone());
    let match_mode = cli.match_mode.unwrap_or(config.match_mode);

    let store = RuleStore::open(rules_dir)?;
    let tool = IptablesTool::with_tools(version, config.tools.for_version(version).clone());
    let manager = ChainManager::new(tool, store);

    tracing::debug!(%version, ?action, %match_mode, "starting");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?
        .block_on(execute(&manager, action, match_mode))
}

async fn execute(
    manager: &ChainManager<IptablesTool>,
    action: Action,
    match_mode: MatchMode,
) -> anyhow::Result<()> {
    match action {
        Action::Save { chains, dry_run } => {
            let filter = ChainFilter::new(&chains, match_mode)?;
            if dry_run {
                preview_chains(manager, &filter).await
            } else {
                save_chains(manager, &filter).await
            }
        }
        Action::Restore => restore_rules(manager).await,
    }
}

fn report_missing(missing: &[String]) {
    for chain in missing {
        println!("The chain {} was not found", chain);
    }
}

async fn save_chains(
    manager: &ChainManager<IptablesTool>,
    filter: &ChainFilter,
) -> anyhow::Result<()> {
    let report = manager.save(filter).await?;
    report_missing(&report.missing);

    println!(
        "Saved {} line(s) from {} table(s) to {}",
        report.lines,
        report.tables,
        report.rules_path.display()
    );
    Ok(())
}

async fn preview_chains(
    manager: &ChainManager<IptablesTool>,
    filter: &ChainFilter,
) -> anyhow::Result<()> {
    let (diff, missing) = manager.preview(filter).await?;
    report_missing(&missing);
    diff.display();
    Ok(())
}

async fn restore_rules(manager: &ChainManager<IptablesTool>) -> anyhow::Result<()> {
    match manager.restore().await? {
        RestoreOutcome::Restored(path) => println!("Restored rules from {}", path.display()),
        RestoreOutcome::NoRules => {}
    }
    Ok(())
}
