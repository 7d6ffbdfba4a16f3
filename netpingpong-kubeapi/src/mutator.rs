use std::time::Duration;

use time::ext::NumericalStdDuration as _;

use super::*;

/// Delay schedule between optimistic-concurrency attempts.
///
/// `steps` is the total number of attempts; the delay before attempt `n + 1`
/// is `duration * factor^(n - 1)`, capped at `cap`, stretched by up to
/// `jitter` (a fraction) at random. A jittered delay that does not fit in a
/// [`Duration`] falls back to `cap`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    pub steps: usize,
    pub duration: Duration,
    pub factor: u32,
    pub cap: Duration,
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            steps: 5,
            duration: 10.std_milliseconds(),
            factor: 2,
            cap: 1.std_seconds(),
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// A schedule of `steps` attempts with no delay between them.
    pub fn immediate(steps: usize) -> Self {
        Self {
            steps,
            duration: Duration::ZERO,
            jitter: 0.0,
            ..Self::default()
        }
    }

    /// Delays to sleep between consecutive attempts, one fewer than `steps`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let Self {
            steps,
            duration,
            factor,
            cap,
            jitter,
        } = *self;
        std::iter::successors(Some(duration.min(cap)), move |delay| {
            Some(delay.saturating_mul(factor).min(cap))
        })
        .take(steps.saturating_sub(1))
        .map(move |delay| {
            let stretch = 1.0 + jitter * fastrand::f64();
            Duration::try_from_secs_f64(delay.as_secs_f64() * stretch).unwrap_or(cap)
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MutateError {
    #[error("node {node:?} update still conflicting after {attempts} attempts")]
    ConflictExhausted { node: String, attempts: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-modify-write of a single node, retried on write conflicts.
#[derive(Debug)]
pub struct NodeMutator<S> {
    store: S,
    backoff: Backoff,
}

impl<S> NodeMutator<S>
where
    S: NodeStore,
{
    pub fn new(store: S) -> Self {
        Self::with_backoff(store, Backoff::default())
    }

    pub fn with_backoff(store: S, backoff: Backoff) -> Self {
        Self { store, backoff }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches node `name`, passes it through `transform` and writes the
    /// result back.
    ///
    /// Every attempt starts from a fresh read, so `transform` never sees a
    /// node older than the latest one fetched. Conflicts are retried
    /// according to the [`Backoff`]; any other error is returned at once.
    pub async fn mutate<F>(&self, name: &str, mut transform: F) -> Result<corev1::Node, MutateError>
    where
        F: FnMut(corev1::Node) -> corev1::Node,
    {
        let mut delays = self.backoff.delays();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(name, &mut transform).await {
                Ok(node) => return Ok(node),
                Err(err) if err.is_conflict() => {
                    let Some(delay) = delays.next() else {
                        tracing::warn!(node = name, attempts, %err, "Giving up on conflicting node update");
                        return Err(MutateError::ConflictExhausted {
                            node: name.to_string(),
                            attempts,
                        });
                    };
                    tracing::debug!(node = name, attempts, ?delay, %err, "Node update conflicted, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn attempt<F>(&self, name: &str, transform: &mut F) -> Result<corev1::Node, StoreError>
    where
        F: FnMut(corev1::Node) -> corev1::Node,
    {
        let node = self.store.get_node(name).await?;
        let node = transform(node);
        self.store.update_node(&node).await
    }
}
