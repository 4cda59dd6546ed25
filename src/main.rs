use clap::Parser;
use leased::{
    network::{self, LeaseApplier},
    Args, ClientConfig, DhcpClient, LogApplier, NetworkConfigurator,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ClientConfig::from(args);

    let mut interfaces = Vec::with_capacity(config.interfaces.len());
    for name in &config.interfaces {
        let iface = network::read_interface(name).await?;
        tracing::info!("Found MAC address {} on {}", iface.mac_string(), name);
        interfaces.push(iface);
    }

    let applier: Box<dyn LeaseApplier + Send> = if config.dry_run {
        Box::new(LogApplier)
    } else {
        Box::new(NetworkConfigurator::new())
    };

    tracing::info!(
        "Binding {} interface(s) to port {}...",
        interfaces.len(),
        config.client_port
    );
    let mut client = DhcpClient::new(config, interfaces, applier)?;
    client.run().await?;

    Ok(())
}
