fn main() -> anyhow::Result<()> {
    ipd_cli::run(false)
}
