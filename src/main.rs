#[tokio::main]
async fn main() -> anyhow::Result<()> {
    visioncast_lib::run().await
}
