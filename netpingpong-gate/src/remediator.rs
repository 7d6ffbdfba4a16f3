use k8s::NodeExt as _;

use super::*;

#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("failed to remove taint {taint:?} from node {node:?}")]
    RemoveTaint {
        node: String,
        taint: String,
        #[source]
        source: MutateError,
    },
}

#[derive(Debug)]
pub struct TaintRemediator<S> {
    mutator: NodeMutator<S>,
}

impl<S> TaintRemediator<S>
where
    S: NodeStore,
{
    pub fn new(mutator: NodeMutator<S>) -> Self {
        Self { mutator }
    }

    pub fn mutator(&self) -> &NodeMutator<S> {
        &self.mutator
    }

    /// Ensures no taint keyed `taint` is left on `node`.
    ///
    /// The node is written back even if the taint is already gone. Any
    /// failure, retry exhaustion included, is returned as [`FatalError`].
    pub async fn remove_taint(&self, node: &str, taint: &str) -> Result<(), FatalError> {
        let mut present = false;
        self.mutator
            .mutate(node, |object| {
                present = object.has_taint(taint);
                object.without_taint(taint)
            })
            .await
            .map_err(|source| FatalError::RemoveTaint {
                node: node.to_string(),
                taint: taint.to_string(),
                source,
            })?;

        if present {
            tracing::info!(node, taint, "Removed taint from node");
        } else {
            tracing::debug!(node, taint, "Taint already absent from node");
        }
        Ok(())
    }
}
