use mock_server::{MockConfig, MockState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let config = MockConfig {
        token: std::env::var("MOCK_TOKEN").ok(),
        require_auth: std::env::var("MOCK_REQUIRE_AUTH").is_ok_and(|v| v == "1" || v == "true"),
        ..MockConfig::default()
    };
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, issues_tokens = config.token.is_some(), "mock product api listening");
    mock_server::serve(listener, MockState::new(config)).await
}
