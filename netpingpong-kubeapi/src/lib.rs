use std::fmt::Debug;
use std::future::Future;

use kube::api;
use kube::ResourceExt as _;
use netpingpong_ext as k8s;
use tokio::sync::OnceCell;

use k8s::corev1;

pub use mutator::Backoff;
pub use mutator::MutateError;
pub use mutator::NodeMutator;

#[cfg(any(test, feature = "fake"))]
pub mod fake;
mod mutator;

/// Read and write access to node objects.
///
/// `update_node` must reject a write whose resource version is stale with
/// [`StoreError::Conflict`].
pub trait NodeStore {
    fn get_node(&self, name: &str) -> impl Future<Output = Result<corev1::Node, StoreError>> + Send;
    fn update_node(
        &self,
        node: &corev1::Node,
    ) -> impl Future<Output = Result<corev1::Node, StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("node {0:?} not found")]
    NotFound(String),
    #[error(transparent)]
    Kube(kube::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    fn from_kube(name: &str, err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) if response.code == 409 => Self::Conflict(err.to_string()),
            kube::Error::Api(response) if response.code == 404 => Self::NotFound(name.to_string()),
            _ => Self::Kube(err),
        }
    }
}

pub struct KubeApi {
    post_params: api::PostParams,
    client: OnceCell<kube::Client>,
}

impl KubeApi {
    /// Create a KubeApi that connects with the default Kubernetes client on
    /// first use.
    ///
    /// In a pod this uses the in-cluster service account, elsewhere the
    /// local kubeconfig. Failing to build the client surfaces as a
    /// [`StoreError::Kube`] from the first node access, and is retried on
    /// the next one.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use netpingpong_kubeapi::NodeStore as _;
    /// # async fn run() -> Result<(), netpingpong_kubeapi::StoreError> {
    /// let api = netpingpong_kubeapi::KubeApi::new();
    /// let _node = api.get_node("worker-1").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self {
            post_params: api::PostParams::default(),
            client: OnceCell::new(),
        }
    }

    pub fn with_client(client: kube::Client) -> Self {
        Self {
            post_params: api::PostParams::default(),
            client: OnceCell::from(client),
        }
    }

    /// Whether the Kubernetes client has been built yet.
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    async fn nodes(&self) -> kube::Result<api::Api<corev1::Node>> {
        let client = self
            .client
            .get_or_try_init(|| {
                tracing::debug!("Creating Kubernetes client");
                kube::Client::try_default()
            })
            .await
            .inspect_err(|err| tracing::error!(?err, "Failed to create Kubernetes client"))?;
        Ok(api::Api::all(client.clone()))
    }

    fn post_params(&self) -> &api::PostParams {
        &self.post_params
    }
}

impl Default for KubeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for KubeApi {
    async fn get_node(&self, name: &str) -> Result<corev1::Node, StoreError> {
        let nodes = self.nodes().await.map_err(StoreError::Kube)?;
        nodes
            .get(name)
            .await
            .map_err(|err| StoreError::from_kube(name, err))
    }

    /// Replaces the node object. The API server compares the resource
    /// version carried in `node.metadata` and answers 409 when it is stale.
    async fn update_node(&self, node: &corev1::Node) -> Result<corev1::Node, StoreError> {
        let name = node.name_any();
        let pp = self.post_params();
        let nodes = self.nodes().await.map_err(StoreError::Kube)?;
        nodes
            .replace(&name, pp, node)
            .await
            .map_err(|err| StoreError::from_kube(&name, err))
    }
}

impl Debug for KubeApi {
    /// Formats the `KubeApi` for debugging, redacting the `client`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApi")
            .field("post_params", &self.post_params)
            .field(
                "client",
                &if self.is_connected() {
                    "<kube::Client>"
                } else {
                    "<pending>"
                },
            )
            .finish()
    }
}
