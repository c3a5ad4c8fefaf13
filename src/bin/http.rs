#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use mx_tracker::{ComplianceRegistry, http_api};

    let addr: SocketAddr = std::env::var("MX_TRACKER_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    println!("mx-tracker HTTP API listening on http://{addr}");
    let registry = ComplianceRegistry::new();
    http_api::serve(addr, registry).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
