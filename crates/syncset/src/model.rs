//! Hive resource types produced by the assembler.
//!
//! Field order follows the upstream Go types, so JSON output lines up with
//! what `oc get -o json` shows for the same objects.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const HIVE_API_VERSION: &str = "hive.openshift.io/v1";
pub const SYNC_SET_KIND: &str = "SyncSet";
pub const SELECTOR_SYNC_SET_KIND: &str = "SelectorSyncSet";

/// Returned when a string does not name any variant of a closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} {value:?}, expected one of: {expected}")]
pub struct ParseEnumError {
	pub what: &'static str,
	pub value: String,
	pub expected: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub labels: Option<BTreeMap<String, String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub annotations: Option<BTreeMap<String, String>>,
}

impl ObjectMeta {
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalObjectReference {
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
}

/// Copies a hub secret (`source_ref`) into the managed cluster (`target_ref`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretMapping {
	pub source_ref: SecretReference,
	pub target_ref: SecretReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
	#[serde(default)]
	pub match_labels: BTreeMap<String, String>,
}

/// How Hive reconciles resources that disappear from a SyncSet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceApplyMode {
	/// Resources removed from the SyncSet are deleted from the cluster.
	#[default]
	Sync,
	/// Resources are only ever created or updated.
	Upsert,
}

impl FromStr for ResourceApplyMode {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"Sync" => Ok(Self::Sync),
			"Upsert" => Ok(Self::Upsert),
			_ => Err(ParseEnumError {
				what: "resource apply mode",
				value: s.to_string(),
				expected: "Sync, Upsert",
			}),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
	/// RFC 7386 JSON merge patch.
	#[default]
	Merge,
	/// Kubernetes strategic merge patch.
	Strategic,
	/// RFC 6902 list of operations.
	Json,
}

impl fmt::Display for PatchType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PatchType::Merge => write!(f, "merge"),
			PatchType::Strategic => write!(f, "strategic"),
			PatchType::Json => write!(f, "json"),
		}
	}
}

impl FromStr for PatchType {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"merge" => Ok(Self::Merge),
			"strategic" => Ok(Self::Strategic),
			"json" => Ok(Self::Json),
			_ => Err(ParseEnumError {
				what: "patch type",
				value: s.to_string(),
				expected: "merge, strategic, json",
			}),
		}
	}
}

/// A patch Hive applies to an object that already exists on the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncObjectPatch {
	pub api_version: String,
	pub kind: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	/// Patch body, serialized as compact JSON.
	pub patch: String,
	pub patch_type: PatchType,
}

/// Spec fields shared by SyncSet and SelectorSyncSet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSetCommonSpec {
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub resources: Vec<Value>,
	#[serde(default)]
	pub resource_apply_mode: ResourceApplyMode,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub patches: Vec<SyncObjectPatch>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub secret_mappings: Vec<SecretMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSetSpec {
	#[serde(flatten)]
	pub common: SyncSetCommonSpec,
	pub cluster_deployment_refs: Vec<LocalObjectReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSyncSetSpec {
	#[serde(flatten)]
	pub common: SyncSetCommonSpec,
	pub cluster_deployment_selector: LabelSelector,
}

/// Resources applied to a single, named cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSet {
	pub kind: String,
	pub api_version: String,
	pub metadata: ObjectMeta,
	pub spec: SyncSetSpec,
}

impl SyncSet {
	pub fn new(name: impl Into<String>, spec: SyncSetSpec) -> Self {
		Self {
			kind: SYNC_SET_KIND.to_string(),
			api_version: HIVE_API_VERSION.to_string(),
			metadata: ObjectMeta::named(name),
			spec,
		}
	}
}

/// Resources applied to every cluster whose labels match a selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSyncSet {
	pub kind: String,
	pub api_version: String,
	pub metadata: ObjectMeta,
	pub spec: SelectorSyncSetSpec,
}

impl SelectorSyncSet {
	pub fn new(name: impl Into<String>, spec: SelectorSyncSetSpec) -> Self {
		Self {
			kind: SELECTOR_SYNC_SET_KIND.to_string(),
			api_version: HIVE_API_VERSION.to_string(),
			metadata: ObjectMeta::named(name),
			spec,
		}
	}
}

/// The hub-side copy of a Secret referenced through `secretMappings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
	pub kind: String,
	pub api_version: String,
	pub metadata: ObjectMeta,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub immutable: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<BTreeMap<String, String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub string_data: Option<BTreeMap<String, String>>,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub secret_type: Option<String>,
}

/// Whatever `ss view` assembled: either flavour serializes as the bare resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Artifact {
	SyncSet(SyncSet),
	SelectorSyncSet(SelectorSyncSet),
}

impl Artifact {
	pub fn name(&self) -> &str {
		match self {
			Artifact::SyncSet(ss) => &ss.metadata.name,
			Artifact::SelectorSyncSet(sss) => &sss.metadata.name,
		}
	}

	pub fn kind(&self) -> &str {
		match self {
			Artifact::SyncSet(ss) => &ss.kind,
			Artifact::SelectorSyncSet(sss) => &sss.kind,
		}
	}

	pub fn common(&self) -> &SyncSetCommonSpec {
		match self {
			Artifact::SyncSet(ss) => &ss.spec.common,
			Artifact::SelectorSyncSet(sss) => &sss.spec.common,
		}
	}
}

impl From<SyncSet> for Artifact {
	fn from(value: SyncSet) -> Self {
		Self::SyncSet(value)
	}
}

impl From<SelectorSyncSet> for Artifact {
	fn from(value: SelectorSyncSet) -> Self {
		Self::SelectorSyncSet(value)
	}
}
