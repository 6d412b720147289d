use burrow_core::burrow::burrow_client::BurrowClient;
use burrow_core::burrow::HealthCheckRequest;

pub async fn health_check(daemon_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = BurrowClient::connect(daemon_addr.to_string()).await?;
    let response = client.health_check(HealthCheckRequest {}).await?.into_inner();

    if response.healthy {
        println!("daemon is healthy (version {})", response.version);
    } else {
        println!("daemon is unhealthy (version {})", response.version);
    }

    Ok(())
}
