use axum::Router;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use url::Url;

use super::*;

const ADDRESS_PARAM: &str = "address";

/// Serves the relay on every path and method.
pub(crate) fn router(client: reqwest::Client) -> Router {
    Router::new().fallback(relay).with_state(client)
}

/// Checks `?address=` on behalf of the caller and answers with its status.
///
/// No address: 200. Not an absolute URL: 400. No response: 500. When
/// `address` is repeated the first value wins.
async fn relay(
    State(client): State<reqwest::Client>,
    Query(params): Query<Vec<(String, String)>>,
) -> StatusCode {
    let Some(address) = first_address(params) else {
        return StatusCode::OK;
    };

    let url = match Url::parse(&address) {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(address, %err, "Rejecting malformed address");
            return StatusCode::BAD_REQUEST;
        }
    };

    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            gate::drain(response).await;
            tracing::debug!(address, %status, "Relayed health check");
            status
        }
        Err(err) => {
            tracing::warn!(address, %err, "Relayed health check failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn first_address(params: Vec<(String, String)>) -> Option<String> {
    params
        .into_iter()
        .find(|(name, _)| name == ADDRESS_PARAM)
        .map(|(_, address)| address)
        .filter(|address| !address.is_empty())
}
