use legallens::{analysis::AnalysisService, api, config, logging};
use std::{io, net::Ipv4Addr, ops::RangeInclusive, sync::Arc};
use tokio::net::TcpListener;

/// Ports probed in order when `SERVER_PORT` is unset.
const FALLBACK_PORTS: RangeInclusive<u16> = 4100..=4199;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();

    let service = Arc::new(AnalysisService::new(config));
    let app = api::create_router(service);

    let (listener, port) = bind_listener(config.server_port).await?;
    tracing::info!(port, "LegalLens listening on http://0.0.0.0:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(fixed_port: Option<u16>) -> io::Result<(TcpListener, u16)> {
    if let Some(port) = fixed_port {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        return Ok((listener, port));
    }

    for port in FALLBACK_PORTS {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port in use; trying next");
            }
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!(
            "no free port between {} and {}",
            FALLBACK_PORTS.start(),
            FALLBACK_PORTS.end()
        ),
    ))
}
