fn main() -> anyhow::Result<()> {
    sheet_optimizer::cli::run()
}
