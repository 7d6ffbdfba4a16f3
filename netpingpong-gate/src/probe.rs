use reqwest::StatusCode;
use time::ext::NumericalStdDuration as _;

/// Builds the outbound HTTP client shared by probes and relays.
///
/// Requests are bounded by a 30 second overall timeout.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(30.std_seconds()).build()
}

#[derive(Debug)]
pub enum ProbeOutcome {
    /// The target answered 200.
    Healthy,
    /// The target answered with any other status.
    Unhealthy(StatusCode),
    /// No response: the request could not be built, connected or completed.
    TransportFailure(reqwest::Error),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

#[derive(Clone, Debug)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new() -> reqwest::Result<Self> {
        http_client().map(Self::with_client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Sends one authenticated `GET address` and classifies the answer.
    ///
    /// Never retries. The response body is drained before returning so the
    /// connection goes back to the pool.
    pub async fn probe(&self, address: &str, token: &str) -> ProbeOutcome {
        let response = match self.client.get(address).bearer_auth(token).send().await {
            Ok(response) => response,
            Err(err) => return ProbeOutcome::TransportFailure(err),
        };

        let status = response.status();
        drain(response).await;

        if status == StatusCode::OK {
            ProbeOutcome::Healthy
        } else {
            ProbeOutcome::Unhealthy(status)
        }
    }
}

/// Reads and discards the rest of `response`.
pub async fn drain(response: reqwest::Response) {
    if let Err(err) = response.bytes().await {
        tracing::debug!(?err, "Failed to drain response body");
    }
}
