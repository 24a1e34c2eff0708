fn main() -> anyhow::Result<()> {
    gk_cli::run()
}
