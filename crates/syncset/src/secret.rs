//! Extracting Secrets from the resource directory.
//!
//! Secrets are not embedded in a SyncSet. Each one is emitted as a separate
//! hub-side Secret and referenced from the SyncSet through a `secretMappings`
//! entry, which Hive uses to copy it into the managed cluster.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
	manifest::{self, Manifest, ManifestError},
	model::{Secret, SecretMapping, SecretReference},
};

#[derive(Debug, Error)]
pub enum SecretError {
	#[error(transparent)]
	Manifest(#[from] ManifestError),

	#[error("{origin}: secret has no metadata.name")]
	MissingName { origin: String },

	#[error("{origin}: invalid secret {name}")]
	Invalid {
		origin: String,
		name: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Name of the hub copy of `secret_name` for the artifact `name`.
pub fn hub_secret_name(name: &str, prefix: &str, secret_name: &str) -> String {
	format!("{prefix}-{name}-{secret_name}")
}

fn secret_name(manifest: &Manifest) -> Result<&str, SecretError> {
	manifest.name().ok_or_else(|| SecretError::MissingName {
		origin: manifest.origin.clone(),
	})
}

/// Convert a Secret manifest into its hub copy.
pub fn hub_secret(name: &str, prefix: &str, manifest: &Manifest) -> Result<Secret, SecretError> {
	let original = secret_name(manifest)?.to_string();
	let mut secret: Secret =
		serde_json::from_value(manifest.clone().into_value()).map_err(|source| {
			SecretError::Invalid {
				origin: manifest.origin.clone(),
				name: original.clone(),
				source,
			}
		})?;

	secret.metadata.name = hub_secret_name(name, prefix, &original);
	secret.metadata.namespace = None;
	Ok(secret)
}

/// Mapping from the hub copy back to the secret's original name and namespace.
pub fn secret_mapping(
	name: &str,
	prefix: &str,
	manifest: &Manifest,
) -> Result<SecretMapping, SecretError> {
	let original = secret_name(manifest)?;
	Ok(SecretMapping {
		source_ref: SecretReference {
			name: hub_secret_name(name, prefix, original),
			namespace: None,
		},
		target_ref: SecretReference {
			name: original.to_string(),
			namespace: manifest.namespace().map(str::to_string),
		},
	})
}

/// Hub copies of every Secret found below `resources`.
#[instrument(skip(resources))]
pub fn transform_secrets(
	name: &str,
	prefix: &str,
	resources: Option<&Path>,
) -> Result<Vec<Secret>, SecretError> {
	let secrets = manifest::load_optional_directory(resources)?
		.iter()
		.filter(|m| m.is_secret())
		.map(|m| hub_secret(name, prefix, m))
		.collect::<Result<Vec<_>, _>>()?;
	debug!(count = secrets.len(), "Transformed secrets");
	Ok(secrets)
}

#[cfg(test)]
mod tests {
	use std::{collections::BTreeMap, fs};

	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;
	use crate::manifest::parse_documents;

	const SECRET: &str = indoc! {"
		apiVersion: v1
		kind: Secret
		metadata:
		  name: pull-secret
		  namespace: openshift-config
		  labels:
		    app: registry
		type: kubernetes.io/dockerconfigjson
		data:
		  .dockerconfigjson: e30=
	"};

	#[test]
	fn test_hub_secret_is_renamed_and_unscoped() {
		let manifest = parse_documents(SECRET, "secret.yaml").unwrap().remove(0);
		let secret = hub_secret("demo", "sss", &manifest).unwrap();

		assert_eq!(secret.metadata.name, "sss-demo-pull-secret");
		assert_eq!(secret.metadata.namespace, None);
		assert_eq!(
			secret.metadata.labels,
			Some(BTreeMap::from([("app".to_string(), "registry".to_string())]))
		);
		assert_eq!(
			secret.secret_type.as_deref(),
			Some("kubernetes.io/dockerconfigjson")
		);
		assert_eq!(
			secret.data,
			Some(BTreeMap::from([(
				".dockerconfigjson".to_string(),
				"e30=".to_string()
			)]))
		);
	}

	#[test]
	fn test_secret_mapping_targets_original() {
		let manifest = parse_documents(SECRET, "secret.yaml").unwrap().remove(0);
		let mapping = secret_mapping("demo", "ss", &manifest).unwrap();

		assert_eq!(mapping.source_ref.name, "ss-demo-pull-secret");
		assert_eq!(mapping.source_ref.namespace, None);
		assert_eq!(mapping.target_ref.name, "pull-secret");
		assert_eq!(
			mapping.target_ref.namespace.as_deref(),
			Some("openshift-config")
		);
	}

	#[test]
	fn test_secret_without_name() {
		let manifest = parse_documents("apiVersion: v1\nkind: Secret\n", "s.yaml")
			.unwrap()
			.remove(0);
		let err = secret_mapping("demo", "ss", &manifest).unwrap_err();
		assert_eq!(err.to_string(), "s.yaml: secret has no metadata.name");
	}

	#[test]
	fn test_transform_secrets_only_picks_secrets() {
		let temp = TempDir::new().unwrap();
		fs::write(temp.path().join("secret.yaml"), SECRET).unwrap();
		fs::write(
			temp.path().join("cm.yaml"),
			"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\n",
		)
		.unwrap();

		let secrets = transform_secrets("demo", "ss", Some(temp.path())).unwrap();
		assert_eq!(secrets.len(), 1);
		assert_eq!(secrets[0].metadata.name, "ss-demo-pull-secret");
	}

	#[test]
	fn test_transform_secrets_without_directory() {
		assert!(transform_secrets("demo", "ss", None).unwrap().is_empty());
	}
}
