#[tokio::main]
async fn main() -> anyhow::Result<()> {
    asset_hierarchy_db::run_server().await
}
