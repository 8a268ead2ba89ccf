//! Loading Kubernetes manifests from directories and raw byte streams.
//!
//! A manifest is any mapping that carries string `apiVersion` and `kind`
//! fields. `kind: List` documents are flattened into their `items`.

use std::{
	fs,
	path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument, trace};
use walkdir::{DirEntry, WalkDir};

/// YAML document separator line.
pub const YAML_SEPARATOR: &str = "---";

/// File extensions picked up from resource and patch directories.
const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Error)]
pub enum ManifestError {
	#[error("directory {} does not exist", .0.display())]
	MissingDirectory(PathBuf),

	#[error("walking {}", .path.display())]
	Walk {
		path: PathBuf,
		#[source]
		source: walkdir::Error,
	},

	#[error("reading {}", .path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{origin} is not valid UTF-8")]
	Encoding { origin: String },

	#[error("failed to parse {origin}: {message}")]
	Parse { origin: String, message: String },

	#[error("{origin}: document {index} is not an object")]
	NotAnObject { origin: String, index: usize },

	#[error("{origin}: document {index} has no string field `{field}`")]
	MissingField {
		origin: String,
		index: usize,
		field: &'static str,
	},
}

/// A single Kubernetes object together with where it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
	/// File path or stream name, used in error messages.
	pub origin: String,
	pub object: Map<String, Value>,
}

impl Manifest {
	pub fn api_version(&self) -> &str {
		self.object
			.get("apiVersion")
			.and_then(Value::as_str)
			.unwrap_or_default()
	}

	pub fn kind(&self) -> &str {
		self.object
			.get("kind")
			.and_then(Value::as_str)
			.unwrap_or_default()
	}

	pub fn name(&self) -> Option<&str> {
		self.metadata_str("name")
	}

	pub fn namespace(&self) -> Option<&str> {
		self.metadata_str("namespace")
	}

	fn metadata_str(&self, field: &str) -> Option<&str> {
		self.object.get("metadata")?.get(field)?.as_str()
	}

	/// Core `v1` Secrets are shipped through `secretMappings`, never inline.
	pub fn is_secret(&self) -> bool {
		self.kind() == "Secret" && self.api_version() == "v1"
	}

	pub fn into_value(self) -> Value {
		Value::Object(self.object)
	}
}

/// Check whether a line is a YAML document separator (`---`, optionally
/// followed by inline content such as a comment).
fn is_separator_line(line: &[u8]) -> bool {
	let line = line.trim_ascii_end();
	match line.strip_prefix(YAML_SEPARATOR.as_bytes()) {
		Some(rest) => rest.is_empty() || rest[0] == b' ' || rest[0] == b'\t',
		None => false,
	}
}

/// Split a stream at its last document separator.
///
/// The head is everything before the separator line, the tail starts with it.
/// Returns `None` when the stream has no separator.
pub fn split_last_document(input: &[u8]) -> Option<(&[u8], &[u8])> {
	let mut offset = 0;
	let mut last = None;
	for line in input.split(|b| *b == b'\n') {
		if is_separator_line(line) {
			last = Some(offset);
		}
		offset += line.len() + 1;
	}
	last.map(|at| input.split_at(at))
}

/// Parse a YAML stream (one or more documents) into manifests.
pub fn parse_documents(input: &str, origin: &str) -> Result<Vec<Manifest>, ManifestError> {
	// YAML 1.1 octals keep file modes such as 0644 intact
	let options = serde_saphyr::Options {
		legacy_octal_numbers: true,
		budget: None,
		..Default::default()
	};
	let documents: Vec<Value> =
		serde_saphyr::from_multiple_with_options(input, options).map_err(|e| {
			ManifestError::Parse {
				origin: origin.to_string(),
				message: e.to_string(),
			}
		})?;

	let mut manifests = Vec::new();
	for (index, document) in documents.into_iter().enumerate() {
		if document.is_null() {
			continue;
		}
		collect_manifest(document, origin, index, &mut manifests)?;
	}
	Ok(manifests)
}

/// Parse raw bytes (e.g. stdin) into manifests.
pub fn parse_stream(input: &[u8], origin: &str) -> Result<Vec<Manifest>, ManifestError> {
	let text = std::str::from_utf8(input).map_err(|_| ManifestError::Encoding {
		origin: origin.to_string(),
	})?;
	parse_documents(text, origin)
}

fn collect_manifest(
	document: Value,
	origin: &str,
	index: usize,
	out: &mut Vec<Manifest>,
) -> Result<(), ManifestError> {
	let Value::Object(mut object) = document else {
		return Err(ManifestError::NotAnObject {
			origin: origin.to_string(),
			index,
		});
	};

	for field in ["apiVersion", "kind"] {
		if !object.get(field).is_some_and(Value::is_string) {
			return Err(ManifestError::MissingField {
				origin: origin.to_string(),
				index,
				field,
			});
		}
	}

	if object.get("kind").and_then(Value::as_str) == Some("List") {
		let items = match object.remove("items") {
			Some(Value::Array(items)) => items,
			_ => Vec::new(),
		};
		trace!(origin, count = items.len(), "Flattening List");
		for item in items {
			collect_manifest(item, origin, index, out)?;
		}
		return Ok(());
	}

	out.push(Manifest {
		origin: origin.to_string(),
		object,
	});
	Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
	entry.depth() > 0
		&& entry
			.file_name()
			.to_str()
			.is_some_and(|name| name.starts_with('.'))
}

fn has_manifest_extension(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}

/// Read every manifest below `dir`, in file name order.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_directory(dir: &Path) -> Result<Vec<Manifest>, ManifestError> {
	if !dir.is_dir() {
		return Err(ManifestError::MissingDirectory(dir.to_path_buf()));
	}

	let walker = WalkDir::new(dir)
		.follow_links(true)
		.sort_by_file_name()
		.into_iter()
		.filter_entry(|e| !is_hidden(e));

	let mut manifests = Vec::new();
	for entry in walker {
		let entry = entry.map_err(|source| ManifestError::Walk {
			path: dir.to_path_buf(),
			source,
		})?;
		let path = entry.path();
		if !entry.file_type().is_file() || !has_manifest_extension(path) {
			continue;
		}

		let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let origin = path.display().to_string();
		let parsed = if path.extension().is_some_and(|ext| ext == "json") {
			let value: Value =
				serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
					origin: origin.clone(),
					message: e.to_string(),
				})?;
			let mut out = Vec::new();
			collect_manifest(value, &origin, 0, &mut out)?;
			out
		} else {
			parse_documents(&content, &origin)?
		};

		debug!(path = %path.display(), count = parsed.len(), "Loaded manifests");
		manifests.extend(parsed);
	}

	Ok(manifests)
}

/// Like [`load_directory`], but an absent path means "no manifests".
pub fn load_optional_directory(dir: Option<&Path>) -> Result<Vec<Manifest>, ManifestError> {
	match dir {
		Some(dir) => load_directory(dir),
		None => Ok(Vec::new()),
	}
}
