fn main() -> anyhow::Result<()> {
    eil_cli::run()
}
