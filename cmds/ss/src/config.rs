//! Configuration file support for ss
//!
//! A `.ss-config.yaml` file sets defaults for generated resources. ss searches
//! from the resources directory (or the working directory) upward to the
//! filesystem root, unless a file is given with `--config`.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use syncset::{
	model::{PatchType, ResourceApplyMode},
	AssembleOpts,
};

/// The name of the config file ss looks for
pub const CONFIG_FILE_NAME: &str = ".ss-config.yaml";

/// Root configuration structure for .ss-config.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SsConfig {
	/// `Sync` deletes resources dropped from the SyncSet, `Upsert` leaves them
	#[serde(default)]
	pub resource_apply_mode: Option<ResourceApplyMode>,

	/// Patch type for patch manifests without a patch type annotation
	#[serde(default)]
	pub patch_type: Option<PatchType>,
}

impl SsConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		match find_config_file(start_dir) {
			Some(config_path) => Ok(Some(Self::load_from_file(&config_path)?)),
			None => Ok(None),
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: SsConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		Ok(config)
	}

	pub fn assemble_opts(&self) -> AssembleOpts {
		AssembleOpts {
			resource_apply_mode: self.resource_apply_mode.unwrap_or_default(),
			patch_type: self.patch_type.unwrap_or_default(),
		}
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	// Canonicalize if possible to handle relative paths
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());

	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|candidate| candidate.is_file())
}
