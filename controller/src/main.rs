mod host;
mod relays;
mod sensors;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
