// Same tool, bound to ip6tables-save / ip6tables-restore and the v6 rules file
fn main() -> anyhow::Result<()> {
    ipd_cli::run(true)
}
