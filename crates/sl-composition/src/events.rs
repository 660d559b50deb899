//! Composition change notifications

use sl_remote::{Extent, ProjectId, ProjectLayerId, RemoteError};

/// Published on the composition's broadcast channel
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionEvent {
    /// Project and its stack loaded from the remote
    Loaded {
        /// Project
        project: ProjectId,
        /// Number of entries
        entries: usize,
    },
    /// Entry placed on top of the stack
    Added(ProjectLayerId),
    /// Provisional entry received its server id
    Confirmed {
        /// Id used until the remote answered
        provisional: ProjectLayerId,
        /// Server id
        id: ProjectLayerId,
    },
    /// Entry taken off the stack
    Removed(ProjectLayerId),
    /// Stack order replaced by the remote's, bottom first
    Reordered(Vec<ProjectLayerId>),
    /// Visibility flag flipped
    VisibilityChanged {
        /// Entry
        entry: ProjectLayerId,
        /// New flag
        visible: bool,
    },
    /// Style replaced
    StyleChanged(ProjectLayerId),
    /// Saved map extent updated
    ExtentSaved(Extent),
    /// Remote refused; the local change was undone
    RolledBack {
        /// Entry whose change was undone
        entry: ProjectLayerId,
        /// Remote failure
        error: RemoteError,
    },
    /// A late response was dropped because the entry changed since
    StaleResponse(ProjectLayerId),
    /// Composition disposed
    Disposed,
}
