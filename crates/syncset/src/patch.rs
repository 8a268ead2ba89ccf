//! Turning patch manifests into Hive `SyncObjectPatch` entries.
//!
//! A patch manifest names its target through `apiVersion`, `kind`,
//! `metadata.name` and `metadata.namespace`. Whatever else it carries is the
//! patch body. Hive applies the patches on the managed cluster, so nothing is
//! merged locally.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
	manifest::{self, Manifest, ManifestError},
	model::{ParseEnumError, PatchType, SyncObjectPatch},
};

/// Annotation selecting the patch type of a single patch manifest.
pub const PATCH_TYPE_ANNOTATION: &str = "ss.openshift.io/patch-type";

#[derive(Debug, Error)]
pub enum PatchError {
	#[error(transparent)]
	Manifest(#[from] ManifestError),

	#[error("{origin}: patch for {kind} has no metadata.name")]
	MissingName { origin: String, kind: String },

	#[error("{origin}: {source}")]
	UnknownType {
		origin: String,
		#[source]
		source: ParseEnumError,
	},

	#[error("{origin}: json patch for {kind}/{name} must carry a non-empty `patch` list of operations")]
	MissingOperations {
		origin: String,
		kind: String,
		name: String,
	},

	#[error("{origin}: patch for {kind}/{name} has an empty body")]
	EmptyBody {
		origin: String,
		kind: String,
		name: String,
	},
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
	match map.shift_remove(key) {
		Some(Value::String(s)) => Some(s),
		_ => None,
	}
}

/// Remove the patch type annotation, dropping `annotations` if it ends up empty.
fn take_patch_type_annotation(metadata: &mut Map<String, Value>) -> Option<String> {
	let annotations = metadata.get_mut("annotations")?.as_object_mut()?;
	let value = take_string(annotations, PATCH_TYPE_ANNOTATION);
	if annotations.is_empty() {
		metadata.shift_remove("annotations");
	}
	value
}

/// Build a Hive patch from a single patch manifest.
pub fn patch_from_manifest(
	manifest: Manifest,
	default_type: PatchType,
) -> Result<SyncObjectPatch, PatchError> {
	let Manifest {
		origin,
		object: mut body,
	} = manifest;

	// Both were validated when the manifest was loaded
	let api_version = take_string(&mut body, "apiVersion").unwrap_or_default();
	let kind = take_string(&mut body, "kind").unwrap_or_default();

	let mut metadata = match body.shift_remove("metadata") {
		Some(Value::Object(metadata)) => metadata,
		_ => Map::new(),
	};
	let Some(name) = take_string(&mut metadata, "name") else {
		return Err(PatchError::MissingName { origin, kind });
	};
	let namespace = take_string(&mut metadata, "namespace");

	let patch_type = match take_patch_type_annotation(&mut metadata) {
		Some(value) => value
			.parse::<PatchType>()
			.map_err(|source| PatchError::UnknownType {
				origin: origin.clone(),
				source,
			})?,
		None => default_type,
	};

	// Remaining metadata (labels, annotations) leads the body
	let mut rest = Map::new();
	if !metadata.is_empty() {
		rest.insert("metadata".to_string(), Value::Object(metadata));
	}
	rest.extend(body);
	let mut body = rest;

	let patch = match patch_type {
		PatchType::Json => match body.shift_remove("patch") {
			Some(Value::Array(operations)) if !operations.is_empty() => {
				Value::Array(operations).to_string()
			}
			_ => {
				return Err(PatchError::MissingOperations { origin, kind, name });
			}
		},
		PatchType::Merge | PatchType::Strategic => {
			if body.is_empty() {
				return Err(PatchError::EmptyBody { origin, kind, name });
			}
			Value::Object(body).to_string()
		}
	};

	debug!(%kind, %name, %patch_type, "Loaded patch");
	Ok(SyncObjectPatch {
		api_version,
		kind,
		name,
		namespace,
		patch,
		patch_type,
	})
}

/// Read every patch manifest below `dir`.
#[instrument(skip_all)]
pub fn load_patches(
	dir: Option<&Path>,
	default_type: PatchType,
) -> Result<Vec<SyncObjectPatch>, PatchError> {
	manifest::load_optional_directory(dir)?
		.into_iter()
		.map(|m| patch_from_manifest(m, default_type))
		.collect()
}
