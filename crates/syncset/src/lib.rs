//! Building Hive `SyncSet` and `SelectorSyncSet` resources from directories of
//! Kubernetes manifests and patches.

pub mod assemble;
pub mod manifest;
pub mod model;
pub mod patch;
pub mod render;
pub mod secret;
pub mod selector;

pub use assemble::{
	create_selector_sync_set, create_sync_set, AssembleError, AssembleOpts, SourceSet,
};
pub use model::{Artifact, Secret, SelectorSyncSet, SyncSet};
pub use render::{render, OutputFormat};
pub use secret::transform_secrets;
pub use selector::Selector;
