fn main() -> anyhow::Result<()> {
    whisk::cli::run_cli()
}
