//! Store change notifications

use crate::model::NodeRef;
use sl_remote::RemoteError;

/// Published on the store's broadcast channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// Tree replaced from the remote listing
    Loaded {
        /// Directory count
        directories: usize,
        /// Layer count
        layers: usize,
    },
    /// Local optimistic change applied
    Changed(NodeRef),
    /// Remote acknowledged; `canonical` differs from `node` after a create
    Reconciled {
        /// Node as known locally when the call was issued
        node: NodeRef,
        /// Node as the remote knows it
        canonical: NodeRef,
    },
    /// Remote refused; the local change was undone
    RolledBack {
        /// Node whose change was undone
        node: NodeRef,
        /// Remote failure
        error: RemoteError,
    },
    /// A late response was dropped because the node changed since
    StaleResponse(NodeRef),
    /// Store disposed
    Disposed,
}
