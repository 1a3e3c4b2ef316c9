fn main() -> anyhow::Result<()> {
    work_diary::cli::run()
}
