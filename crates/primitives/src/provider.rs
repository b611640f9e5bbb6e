//! Utils for creating ethers providers

use ethers::providers::{Http, Provider, Ws};
use std::time::Duration;

/// Creates ethers provider with HTTP connection
pub async fn create_http_provider(
    addr: &str,
    poll_interval: Duration,
) -> eyre::Result<Provider<Http>> {
    let provider = Provider::<Http>::try_from(addr)?;

    Ok(provider.interval(poll_interval))
}

/// Creates ethers provider with WebSockets connection
pub async fn create_ws_provider(addr: &str) -> eyre::Result<Provider<Ws>> {
    let provider = Provider::<Ws>::connect_with_reconnects(addr, usize::MAX).await?;
    Ok(provider)
}
