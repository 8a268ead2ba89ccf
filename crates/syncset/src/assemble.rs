//! Assembling SyncSets and SelectorSyncSets from manifest sources.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
	manifest::{self, ManifestError},
	model::{
		LocalObjectReference, PatchType, ResourceApplyMode, SelectorSyncSet, SelectorSyncSetSpec,
		SyncSet, SyncSetCommonSpec, SyncSetSpec,
	},
	patch::{self, PatchError},
	secret::{self, SecretError},
	selector::Selector,
};

/// Hub secret prefix for SyncSets.
pub const SYNC_SET_PREFIX: &str = "ss";
/// Hub secret prefix for SelectorSyncSets.
pub const SELECTOR_SYNC_SET_PREFIX: &str = "sss";

/// Origin reported for manifests passed as raw bytes.
pub const STREAM_ORIGIN: &str = "<stdin>";

#[derive(Debug, Error)]
pub enum AssembleError {
	#[error(transparent)]
	Manifest(#[from] ManifestError),

	#[error(transparent)]
	Patch(#[from] PatchError),

	#[error(transparent)]
	Secret(#[from] SecretError),

	#[error("{origin}: secret {name} must be placed in the resources directory")]
	StreamSecret { origin: String, name: String },
}

/// Where the manifests of one artifact come from.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
	/// Directory of resource manifests.
	pub resources: Option<PathBuf>,
	/// Directory of patch manifests.
	pub patches: Option<PathBuf>,
	/// Manifests already read into memory, appended after the directory ones.
	/// Only SelectorSyncSets use them.
	pub extra: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOpts {
	pub resource_apply_mode: ResourceApplyMode,
	/// Patch type for patch manifests without a type annotation.
	pub patch_type: PatchType,
}

fn common_spec(
	name: &str,
	prefix: &str,
	sources: &SourceSet,
	extra: Option<&[u8]>,
	opts: AssembleOpts,
) -> Result<SyncSetCommonSpec, AssembleError> {
	let mut resources = Vec::new();
	let mut secret_mappings = Vec::new();

	for manifest in manifest::load_optional_directory(sources.resources.as_deref())? {
		if manifest.is_secret() {
			secret_mappings.push(secret::secret_mapping(name, prefix, &manifest)?);
		} else {
			resources.push(manifest.into_value());
		}
	}

	if let Some(extra) = extra {
		for manifest in manifest::parse_stream(extra, STREAM_ORIGIN)? {
			if manifest.is_secret() {
				return Err(AssembleError::StreamSecret {
					origin: manifest.origin.clone(),
					name: manifest.name().unwrap_or_default().to_string(),
				});
			}
			resources.push(manifest.into_value());
		}
	}

	let patches = patch::load_patches(sources.patches.as_deref(), opts.patch_type)?;

	debug!(
		resources = resources.len(),
		patches = patches.len(),
		secrets = secret_mappings.len(),
		"Assembled spec"
	);
	Ok(SyncSetCommonSpec {
		resources,
		resource_apply_mode: opts.resource_apply_mode,
		patches,
		secret_mappings,
	})
}

/// Build a SyncSet targeting the cluster deployment `cluster_name`.
///
/// Built from the resource and patch directories alone, `sources.extra` is not read.
#[instrument(skip(sources, opts))]
pub fn create_sync_set(
	name: &str,
	cluster_name: &str,
	sources: &SourceSet,
	opts: AssembleOpts,
) -> Result<SyncSet, AssembleError> {
	let common = common_spec(name, SYNC_SET_PREFIX, sources, None, opts)?;
	Ok(SyncSet::new(
		name,
		SyncSetSpec {
			common,
			cluster_deployment_refs: vec![LocalObjectReference {
				name: cluster_name.to_string(),
			}],
		},
	))
}

/// Build a SelectorSyncSet targeting every cluster deployment matching `selector`.
#[instrument(skip(selector, sources, opts), fields(selector = %selector))]
pub fn create_selector_sync_set(
	name: &str,
	selector: &Selector,
	sources: &SourceSet,
	opts: AssembleOpts,
) -> Result<SelectorSyncSet, AssembleError> {
	let common = common_spec(
		name,
		SELECTOR_SYNC_SET_PREFIX,
		sources,
		sources.extra.as_deref(),
		opts,
	)?;
	Ok(SelectorSyncSet::new(
		name,
		SelectorSyncSetSpec {
			common,
			cluster_deployment_selector: selector.to_label_selector(),
		},
	))
}

#[cfg(test)]
mod tests {
	use std::fs;

	use assert_matches::assert_matches;
	use indoc::indoc;
	use serde_json::json;
	use tempfile::TempDir;

	use super::*;
	use crate::model::{SecretMapping, SecretReference};

	fn fixture() -> TempDir {
		let temp = TempDir::new().unwrap();
		let resources = temp.path().join("resources");
		let patches = temp.path().join("patches");
		fs::create_dir_all(&resources).unwrap();
		fs::create_dir_all(&patches).unwrap();

		fs::write(
			resources.join("namespace.yaml"),
			"apiVersion: v1\nkind: Namespace\nmetadata:\n  name: monitoring\n",
		)
		.unwrap();
		fs::write(
			resources.join("secret.yaml"),
			indoc! {"
				apiVersion: v1
				kind: Secret
				metadata:
				  name: token
				  namespace: monitoring
				stringData:
				  token: hunter2
			"},
		)
		.unwrap();
		fs::write(
			patches.join("scale.yaml"),
			indoc! {"
				apiVersion: apps/v1
				kind: Deployment
				metadata:
				  name: prometheus
				  namespace: monitoring
				spec:
				  replicas: 2
			"},
		)
		.unwrap();
		temp
	}

	fn sources(temp: &TempDir) -> SourceSet {
		SourceSet {
			resources: Some(temp.path().join("resources")),
			patches: Some(temp.path().join("patches")),
			extra: None,
		}
	}

	#[test]
	fn test_create_sync_set() {
		let temp = fixture();
		let ss = create_sync_set("monitoring", "prod-1", &sources(&temp), AssembleOpts::default())
			.unwrap();

		assert_eq!(ss.kind, "SyncSet");
		assert_eq!(ss.metadata.name, "monitoring");
		assert_eq!(
			ss.spec.cluster_deployment_refs,
			vec![LocalObjectReference {
				name: "prod-1".to_string()
			}]
		);
		assert_eq!(
			ss.spec.common.resources,
			vec![json!({
				"apiVersion": "v1",
				"kind": "Namespace",
				"metadata": {"name": "monitoring"}
			})]
		);
		assert_eq!(
			ss.spec.common.secret_mappings,
			vec![SecretMapping {
				source_ref: SecretReference {
					name: "ss-monitoring-token".to_string(),
					namespace: None,
				},
				target_ref: SecretReference {
					name: "token".to_string(),
					namespace: Some("monitoring".to_string()),
				},
			}]
		);
		assert_eq!(ss.spec.common.patches.len(), 1);
		assert_eq!(ss.spec.common.patches[0].name, "prometheus");
	}

	#[test]
	fn test_create_selector_sync_set_appends_stream() {
		let temp = fixture();
		let mut sources = sources(&temp);
		sources.extra = Some(b"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: piped\n".to_vec());
		let selector: Selector = "env=prod".parse().unwrap();
		let opts = AssembleOpts {
			resource_apply_mode: ResourceApplyMode::Upsert,
			patch_type: PatchType::Strategic,
		};

		let sss = create_selector_sync_set("monitoring", &selector, &sources, opts).unwrap();

		assert_eq!(sss.kind, "SelectorSyncSet");
		assert_eq!(
			sss.spec.cluster_deployment_selector.match_labels["env"],
			"prod"
		);
		assert_eq!(sss.spec.common.resource_apply_mode, ResourceApplyMode::Upsert);
		assert_eq!(sss.spec.common.resources.len(), 2);
		assert_eq!(sss.spec.common.resources[1]["metadata"]["name"], "piped");
		assert_eq!(
			sss.spec.common.secret_mappings[0].source_ref.name,
			"sss-monitoring-token"
		);
		assert_eq!(sss.spec.common.patches[0].patch_type, PatchType::Strategic);
	}

	#[test]
	fn test_stream_only() {
		let sources = SourceSet {
			extra: Some(b"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: only\n".to_vec()),
			..Default::default()
		};
		let selector: Selector = "env=prod".parse().unwrap();
		let sss =
			create_selector_sync_set("x", &selector, &sources, AssembleOpts::default()).unwrap();
		assert_eq!(sss.spec.common.resources.len(), 1);
		assert!(sss.spec.common.patches.is_empty());
		assert!(sss.spec.common.secret_mappings.is_empty());
	}

	#[test]
	fn test_sync_set_ignores_stream() {
		let temp = fixture();
		let mut sources = sources(&temp);
		sources.extra = Some(b"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: piped\n".to_vec());

		let ss = create_sync_set("monitoring", "prod-1", &sources, AssembleOpts::default()).unwrap();

		assert_eq!(ss.spec.common.resources.len(), 1);
		assert_eq!(ss.spec.common.resources[0]["kind"], "Namespace");
	}

	#[test]
	fn test_stream_secret_is_rejected() {
		let sources = SourceSet {
			extra: Some(b"apiVersion: v1\nkind: Secret\nmetadata:\n  name: leaked\n".to_vec()),
			..Default::default()
		};
		let selector: Selector = "env=prod".parse().unwrap();
		let err = create_selector_sync_set("x", &selector, &sources, AssembleOpts::default())
			.unwrap_err();
		assert_matches!(err, AssembleError::StreamSecret { name, .. } if name == "leaked");
	}

	#[test]
	fn test_missing_resource_directory() {
		let temp = TempDir::new().unwrap();
		let sources = SourceSet {
			resources: Some(temp.path().join("missing")),
			..Default::default()
		};
		let err = create_sync_set("x", "c", &sources, AssembleOpts::default()).unwrap_err();
		assert_matches!(
			err,
			AssembleError::Manifest(ManifestError::MissingDirectory(_))
		);
	}
}
