fn main() -> anyhow::Result<()> {
    gnss_flow::run()
}
