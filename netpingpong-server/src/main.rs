use std::future::IntoFuture as _;

use netpingpong_gate as gate;
use netpingpong_kubeapi::KubeApi;
use netpingpong_kubeapi::NodeMutator;

mod relay;

const PORT_VAR: &str = "PORT";
const DEFAULT_PORT: &str = ":8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    tracing::info!("Starting netpingpong-server");

    for var in gate::Config::from_env().missing() {
        tracing::warn!(var, "Environment variable is not set");
    }

    let interval = gate::probe_interval()?;
    let client = gate::http_client()?;
    let remediator = gate::TaintRemediator::new(NodeMutator::new(KubeApi::new()));
    let prober = gate::Prober::with_client(client.clone());
    let probe_loop = gate::ProbeLoop::new(prober, remediator, interval);
    let probe_loop = tokio::spawn(async move { probe_loop.run(gate::Config::from_env).await });

    let app = relay::router(client);
    let addr = listen_addr(std::env::var(PORT_VAR).ok().as_deref());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{addr}");
    }

    tokio::select! {
        served = axum::serve(listener, app).into_future() => served?,
        joined = probe_loop => {
            let Err(err) = joined?;
            tracing::error!(%err, "Probe loop stopped");
            return Err(err.into());
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    Ok(())
}

/// Turns a Go style listen address (`:8080`) or a bare port into something
/// `TcpListener::bind` accepts.
fn listen_addr(port: Option<&str>) -> String {
    let port = port
        .filter(|port| !port.is_empty())
        .unwrap_or(DEFAULT_PORT);
    if port.starts_with(':') {
        format!("0.0.0.0{port}")
    } else if port.parse::<u16>().is_ok() {
        format!("0.0.0.0:{port}")
    } else {
        port.to_string()
    }
}
