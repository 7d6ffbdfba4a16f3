//! In-memory [`NodeStore`] holding a single node, versioned the way the API
//! server versions objects.

use std::sync::Mutex;
use std::sync::PoisonError;

use kube::ResourceExt as _;

use super::*;

const EXTERNAL_WRITES: &str = "fake.netpingpong.io/external-writes";

#[derive(Debug, Default)]
pub struct FakeNodeStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    node: Option<corev1::Node>,
    version: u64,
    interference: usize,
    reject_updates: bool,
    gets: usize,
    updates: usize,
}

impl State {
    fn store(&mut self, mut node: corev1::Node) -> corev1::Node {
        self.version += 1;
        node.metadata.resource_version = Some(self.version.to_string());
        self.node = Some(node.clone());
        node
    }

    /// Another actor writes the node between our read and our write.
    fn external_write(&mut self) {
        if let Some(mut node) = self.node.take() {
            let writes = FakeNodeStore::external_writes(&node) + 1;
            node.metadata
                .annotations
                .get_or_insert_with(Default::default)
                .insert(EXTERNAL_WRITES.to_string(), writes.to_string());
            self.store(node);
        }
    }
}

impl FakeNodeStore {
    pub fn new(node: corev1::Node) -> Self {
        let mut state = State::default();
        state.store(node);
        let state = Mutex::new(state);
        Self { state }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Lets another writer modify the node right before each of the next
    /// `writes` update attempts, making them conflict.
    pub fn interfere(&self, writes: usize) {
        self.state().interference = writes;
    }

    /// Fails every subsequent update with [`StoreError::NotFound`].
    pub fn reject_updates(&self) {
        self.state().reject_updates = true;
    }

    pub fn node(&self) -> Option<corev1::Node> {
        self.state().node.clone()
    }

    pub fn gets(&self) -> usize {
        self.state().gets
    }

    pub fn updates(&self) -> usize {
        self.state().updates
    }

    /// Number of interfering writes recorded on `node`.
    pub fn external_writes(node: &corev1::Node) -> usize {
        node.metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(EXTERNAL_WRITES))
            .and_then(|writes| writes.parse().ok())
            .unwrap_or_default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NodeStore for FakeNodeStore {
    async fn get_node(&self, name: &str) -> Result<corev1::Node, StoreError> {
        let mut state = self.state();
        state.gets += 1;
        state
            .node
            .clone()
            .filter(|node| node.metadata.name.as_deref() == Some(name))
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update_node(&self, node: &corev1::Node) -> Result<corev1::Node, StoreError> {
        let mut state = self.state();
        state.updates += 1;
        let name = node.name_any();

        if state.reject_updates {
            return Err(StoreError::NotFound(name));
        }

        if state.interference > 0 {
            state.interference -= 1;
            state.external_write();
        }

        let current = state
            .node
            .as_ref()
            .filter(|current| current.metadata.name.as_deref() == Some(name.as_str()))
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;

        if current.metadata.resource_version != node.metadata.resource_version {
            let message = format!(
                "the object has been modified; please apply your changes to the latest version ({name})"
            );
            return Err(StoreError::Conflict(message));
        }

        Ok(state.store(node.clone()))
    }
}
