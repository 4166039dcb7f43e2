//! Print the products view for the configured product API.

use anyhow::Context;
use product_core::{ClientConfig, ProductService, ProductsPage};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::load().context("failed to load configuration")?;
    let service = ProductService::from_config(&config)
        .await
        .context("failed to build product api client")?;

    let page = ProductsPage::load(&service).await;
    if let Some(message) = &page.error_message {
        eprintln!("{message}");
    }
    for product in &page.products {
        println!("{:>6}  {:<40}  {:>10.2}", product.id, product.name, product.price);
    }
    Ok(())
}
