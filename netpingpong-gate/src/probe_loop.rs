use std::convert::Infallible;

use reqwest::StatusCode;

use super::*;

/// What a single tick ended with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The token could not be read; nothing was probed.
    TokenUnavailable,
    /// The probe got no response.
    ProbeFailed,
    /// The probe got a non-200 response; the node was left alone.
    Unhealthy(StatusCode),
    /// The probe succeeded and the taint is gone from the node.
    Remediated,
}

#[derive(Debug)]
pub struct ProbeLoop<S> {
    prober: Prober,
    remediator: TaintRemediator<S>,
    interval: Duration,
}

impl<S> ProbeLoop<S>
where
    S: NodeStore,
{
    pub fn new(prober: Prober, remediator: TaintRemediator<S>, interval: Duration) -> Self {
        Self {
            prober,
            remediator,
            interval,
        }
    }

    pub fn remediator(&self) -> &TaintRemediator<S> {
        &self.remediator
    }

    /// Sleeps one interval, then ticks with a fresh `config()`, forever.
    /// Ticks never overlap. Returns only when remediation fails.
    ///
    /// Production passes [`Config::from_env`].
    pub async fn run(&self, config: impl Fn() -> Config) -> Result<Infallible, FatalError> {
        tracing::info!(interval = ?self.interval, "Starting probe loop");
        loop {
            tokio::time::sleep(self.interval).await;
            let config = config();
            self.tick(&config).await?;
        }
    }

    /// Reads the token, probes `config.address` and, on a 200, removes
    /// `config.taint` from `config.node`.
    pub async fn tick(&self, config: &Config) -> Result<Tick, FatalError> {
        tracing::debug!(address = %config.address, "Start the request loop");

        let token = match read_token(&config.token_path).await {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(path = %config.token_path.display(), %err, "Failed to read token");
                return Ok(Tick::TokenUnavailable);
            }
        };

        match self.prober.probe(&config.address, &token).await {
            ProbeOutcome::Healthy => {
                self.remediator
                    .remove_taint(&config.node, &config.taint)
                    .await?;
                Ok(Tick::Remediated)
            }
            ProbeOutcome::Unhealthy(status) => {
                tracing::warn!(address = %config.address, %status, "Received non-200 response");
                Ok(Tick::Unhealthy(status))
            }
            ProbeOutcome::TransportFailure(err) => {
                tracing::warn!(address = %config.address, %err, "Error sending request");
                Ok(Tick::ProbeFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use k8s::NodeExt as _;
    use k8s::TaintExt as _;
    use k8s::corev1;
    use netpingpong_kubeapi::Backoff;
    use netpingpong_kubeapi::fake::FakeNodeStore;
    use tempfile::NamedTempFile;

    use crate::testing;

    use super::*;

    const GATE: &str = "node.example.com/network-unavailable";

    fn probe_loop(store: FakeNodeStore) -> ProbeLoop<FakeNodeStore> {
        let prober = Prober::with_client(testing::client());
        let mutator = NodeMutator::with_backoff(store, Backoff::immediate(5));
        ProbeLoop::new(
            prober,
            TaintRemediator::new(mutator),
            Duration::from_millis(10),
        )
    }

    fn tainted() -> FakeNodeStore {
        let node = corev1::Node::new("worker-1").with_taints([
            corev1::Taint::no_schedule(GATE),
            corev1::Taint::no_schedule("dedicated"),
        ]);
        FakeNodeStore::new(node)
    }

    fn token_file() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), format!("{}\n", testing::TOKEN)).unwrap();
        file
    }

    fn config(address: impl ToString, token_path: impl Into<PathBuf>) -> Config {
        Config {
            address: address.to_string(),
            taint: GATE.to_string(),
            node: "worker-1".to_string(),
            token_path: token_path.into(),
        }
    }

    fn store(probe_loop: &ProbeLoop<FakeNodeStore>) -> &FakeNodeStore {
        probe_loop.remediator().mutator().store()
    }

    #[tokio::test]
    async fn tick_healthy_removes_taint() {
        let peer = testing::peer().await;
        let token = token_file();
        let probe_loop = probe_loop(tainted());

        let tick = probe_loop.tick(&config(peer, token.path())).await.unwrap();

        assert_eq!(tick, Tick::Remediated);
        assert_eq!(store(&probe_loop).gets(), 1);
        assert_eq!(store(&probe_loop).updates(), 1);
        let node = store(&probe_loop).node().unwrap();
        assert!(!node.has_taint(GATE));
        assert!(node.has_taint("dedicated"));
    }

    #[tokio::test]
    async fn tick_without_token_skips() {
        let peer = testing::peer().await;
        let dir = tempfile::tempdir().unwrap();
        let probe_loop = probe_loop(tainted());

        let tick = probe_loop
            .tick(&config(peer, dir.path().join("token")))
            .await
            .unwrap();

        assert_eq!(tick, Tick::TokenUnavailable);
        assert_eq!(store(&probe_loop).gets(), 0);
        assert_eq!(store(&probe_loop).updates(), 0);
    }

    #[tokio::test]
    async fn tick_unhealthy_leaves_node() {
        let peer = testing::peer().await;
        let token = token_file();
        let probe_loop = probe_loop(tainted());

        let tick = probe_loop
            .tick(&config(format!("{peer}/teapot"), token.path()))
            .await
            .unwrap();

        assert_eq!(tick, Tick::Unhealthy(StatusCode::IM_A_TEAPOT));
        assert_eq!(store(&probe_loop).gets(), 0);
        assert!(store(&probe_loop).node().unwrap().has_taint(GATE));
    }

    #[tokio::test]
    async fn tick_rejected_token_leaves_node() {
        let peer = testing::peer().await;
        let token = NamedTempFile::new().unwrap();
        std::fs::write(token.path(), "stale").unwrap();
        let probe_loop = probe_loop(tainted());

        let tick = probe_loop.tick(&config(peer, token.path())).await.unwrap();

        assert_eq!(tick, Tick::Unhealthy(StatusCode::UNAUTHORIZED));
        assert_eq!(store(&probe_loop).gets(), 0);
    }

    #[tokio::test]
    async fn tick_connection_refused() {
        let address = testing::refused().await;
        let token = token_file();
        let probe_loop = probe_loop(tainted());

        let tick = probe_loop
            .tick(&config(address, token.path()))
            .await
            .unwrap();

        assert_eq!(tick, Tick::ProbeFailed);
        assert_eq!(store(&probe_loop).gets(), 0);
    }

    #[tokio::test]
    async fn tick_empty_address() {
        let token = token_file();
        let probe_loop = probe_loop(tainted());

        let tick = probe_loop.tick(&config("", token.path())).await.unwrap();

        assert_eq!(tick, Tick::ProbeFailed);
        assert_eq!(store(&probe_loop).gets(), 0);
    }

    #[tokio::test]
    async fn tick_remediation_failure_is_fatal() {
        let peer = testing::peer().await;
        let token = token_file();
        let store = tainted();
        store.interfere(usize::MAX);
        let probe_loop = probe_loop(store);

        let err = probe_loop
            .tick(&config(peer, token.path()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FatalError::RemoveTaint {
                source: MutateError::ConflictExhausted { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn tick_repeated_stays_idempotent() {
        let peer = testing::peer().await;
        let token = token_file();
        let probe_loop = probe_loop(tainted());
        let config = config(peer, token.path());

        for _ in 0..3 {
            assert_eq!(probe_loop.tick(&config).await.unwrap(), Tick::Remediated);
        }

        assert_eq!(store(&probe_loop).updates(), 3);
        let node = store(&probe_loop).node().unwrap();
        assert_eq!(node.taints(), [corev1::Taint::no_schedule("dedicated")]);
    }

    #[tokio::test]
    async fn run_continues_until_remediation_fails() {
        let peer = testing::peer().await;
        let refused = testing::refused().await;
        let token = token_file();
        let dir = tempfile::tempdir().unwrap();
        let node_store = tainted();
        node_store.interfere(usize::MAX);
        let probe_loop = probe_loop(node_store);

        let configs = [
            config(&peer, dir.path().join("token")),
            config(format!("{peer}/teapot"), token.path()),
            config(&refused, token.path()),
            config(&peer, token.path()),
        ];
        let ticks = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            probe_loop.run(|| {
                let tick = ticks.fetch_add(1, Ordering::SeqCst);
                configs[tick.min(configs.len() - 1)].clone()
            }),
        )
        .await
        .unwrap();

        let Err(err) = result;
        assert!(matches!(
            err,
            FatalError::RemoveTaint {
                source: MutateError::ConflictExhausted { .. },
                ..
            }
        ));
        // Three non-fatal ticks were survived, the fourth was fatal, and
        // each was preceded by a full interval.
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(store(&probe_loop).gets(), 5);
        assert!(store(&probe_loop).node().unwrap().has_taint(GATE));
    }

    #[tokio::test]
    async fn run_keeps_ticking_after_remediation() {
        let peer = testing::peer().await;
        let token = token_file();
        let probe_loop = probe_loop(tainted());
        let config = config(&peer, token.path());
        let ticks = AtomicUsize::new(0);

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            probe_loop.run(|| {
                ticks.fetch_add(1, Ordering::SeqCst);
                config.clone()
            }),
        )
        .await;

        assert!(result.is_err(), "loop must not return while healthy");
        assert!(ticks.load(Ordering::SeqCst) >= 2);
        assert!(store(&probe_loop).updates() >= 2);
        assert!(!store(&probe_loop).node().unwrap().has_taint(GATE));
    }
}
