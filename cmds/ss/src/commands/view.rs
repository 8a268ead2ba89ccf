//! View command handler.
//!
//! Prints hub Secrets as JSON, then the SyncSet or SelectorSyncSet in the
//! requested format. With `--input stdin --wait`, the last document of the
//! input goes into a second `<name>-cr` resource, so the custom resource is
//! applied once its definition has been created by the first one.

use std::{
	fmt,
	io::{self, Read, Write},
	path::PathBuf,
	str::FromStr,
};

use anyhow::{Context, Result};
use clap::Args;
use syncset::{
	assemble::{SELECTOR_SYNC_SET_PREFIX, SYNC_SET_PREFIX},
	manifest::split_last_document,
	render::{self, OutputFormat},
	selector::SelectorError,
	Artifact, AssembleOpts, Selector, SourceSet,
};
use thiserror::Error;
use tracing::{debug, level_filters::LevelFilter};

use crate::{config::SsConfig, telemetry};

#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
	/// Name of the generated SyncSet/SelectorSyncSet
	pub name: Option<String>,

	/// The selector key/value pair used to match the SelectorSyncSet to Cluster(s)
	#[arg(short = 's', long, default_value = "")]
	pub selector: String,

	/// The cluster name used to match the SyncSet to a Cluster
	#[arg(short = 'c', long, default_value = "")]
	pub cluster_name: String,

	/// The directory of resource manifest files to use
	#[arg(short = 'r', long, default_value = "")]
	pub resources: String,

	/// The directory of patch manifest files to use
	#[arg(short = 'p', long, default_value = "")]
	pub patches: String,

	/// Output format. One of: [json yaml]
	#[arg(short = 'o', long, default_value = "json")]
	pub output: String,

	/// Input source. One of: [disk stdin]
	#[arg(short = 'i', long, default_value = "disk")]
	pub input: String,

	/// Last resource needs to wait for custom resource definition to be exposed
	#[arg(short = 'w', long)]
	pub wait: bool,

	/// Config file to use instead of searching for .ss-config.yaml
	#[arg(long)]
	pub config: Option<PathBuf>,

	/// Log level (possible values: disabled, fatal, error, warn, info, debug, trace)
	#[arg(long, value_parser = telemetry::parse_level)]
	pub log_level: Option<LevelFilter>,
}

impl Default for ViewArgs {
	fn default() -> Self {
		Self {
			name: None,
			selector: String::new(),
			cluster_name: String::new(),
			resources: String::new(),
			patches: String::new(),
			output: "json".to_string(),
			input: "disk".to_string(),
			wait: false,
			config: None,
			log_level: None,
		}
	}
}

/// Rejected flag combinations, reported before any file is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("one of --selector or --cluster-name must be specified")]
	NoTarget,

	#[error("only one of --selector or --cluster-name can be specified")]
	ConflictingTargets,

	#[error("name must be specified")]
	MissingName,

	#[error(
		"unable to match a printer suitable for the output format {0} allowed formats are: [{}]",
		OutputFormat::NAMES.join(" ")
	)]
	UnsupportedOutput(String),

	#[error(
		"unsupported input source {0} allowed input sources are: [{}]",
		InputSource::NAMES.join(" ")
	)]
	UnsupportedInput(String),

	#[error("invalid --selector: {0}")]
	InvalidSelector(#[from] SelectorError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputSource {
	#[default]
	Disk,
	Stdin,
}

impl InputSource {
	pub const NAMES: &'static [&'static str] = &["disk", "stdin"];
}

impl fmt::Display for InputSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			InputSource::Disk => write!(f, "disk"),
			InputSource::Stdin => write!(f, "stdin"),
		}
	}
}

impl FromStr for InputSource {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"disk" => Ok(Self::Disk),
			"stdin" => Ok(Self::Stdin),
			_ => Err(ValidationError::UnsupportedInput(s.to_string())),
		}
	}
}

/// Which clusters the generated resource applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	/// A SyncSet for one named cluster deployment.
	Cluster(String),
	/// A SelectorSyncSet for all cluster deployments matching the labels.
	Selector(Selector),
}

impl Target {
	/// Prefix for hub secret names.
	pub fn prefix(&self) -> &'static str {
		match self {
			Target::Cluster(_) => SYNC_SET_PREFIX,
			Target::Selector(_) => SELECTOR_SYNC_SET_PREFIX,
		}
	}
}

/// Validated, immutable settings for one `ss view` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
	pub name: String,
	pub target: Target,
	pub resources: Option<PathBuf>,
	pub patches: Option<PathBuf>,
	pub output: OutputFormat,
	pub input: InputSource,
	pub wait: bool,
	pub assemble: AssembleOpts,
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
	(!value.is_empty()).then(|| PathBuf::from(value))
}

impl ViewArgs {
	/// Check flag combinations, in the order users hit them.
	pub fn validate(&self) -> Result<ViewConfig, ValidationError> {
		match (self.selector.is_empty(), self.cluster_name.is_empty()) {
			(true, true) => return Err(ValidationError::NoTarget),
			(false, false) => return Err(ValidationError::ConflictingTargets),
			_ => {}
		}

		let name = match &self.name {
			Some(name) if !name.is_empty() => name.clone(),
			_ => return Err(ValidationError::MissingName),
		};

		let output = self
			.output
			.parse::<OutputFormat>()
			.map_err(|_| ValidationError::UnsupportedOutput(self.output.clone()))?;
		let input = self.input.parse::<InputSource>()?;

		let target = if self.selector.is_empty() {
			Target::Cluster(self.cluster_name.clone())
		} else {
			Target::Selector(self.selector.parse()?)
		};

		Ok(ViewConfig {
			name,
			target,
			resources: non_empty_path(&self.resources),
			patches: non_empty_path(&self.patches),
			output,
			input,
			wait: self.wait,
			assemble: AssembleOpts::default(),
		})
	}
}

impl ViewConfig {
	pub fn with_assemble_opts(self, assemble: AssembleOpts) -> Self {
		Self { assemble, ..self }
	}

	/// Settings from `--config`, or from a `.ss-config.yaml` found near the resources.
	pub fn load_settings(&self, explicit: Option<&PathBuf>) -> Result<SsConfig> {
		if let Some(path) = explicit {
			return SsConfig::load_from_file(path);
		}
		let start = match &self.resources {
			Some(dir) => dir.clone(),
			None => std::env::current_dir().context("failed to determine working directory")?,
		};
		Ok(SsConfig::load_from_directory(&start)?.unwrap_or_default())
	}

	fn assemble(&self, name: &str, sources: &SourceSet) -> Result<Artifact> {
		let artifact = match &self.target {
			Target::Cluster(cluster) => {
				syncset::create_sync_set(name, cluster, sources, self.assemble)?.into()
			}
			Target::Selector(selector) => {
				syncset::create_selector_sync_set(name, selector, sources, self.assemble)?.into()
			}
		};
		Ok(artifact)
	}
}

/// Primary stream bytes and, in wait mode, the trailing custom resource.
///
/// Only SelectorSyncSets take manifests from stdin.
fn read_stream<R: Read>(config: &ViewConfig, mut stdin: R) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>)> {
	if config.input == InputSource::Disk || !matches!(config.target, Target::Selector(_)) {
		return Ok((None, None));
	}

	let mut buf = Vec::new();
	stdin
		.read_to_end(&mut buf)
		.context("failed to read manifests from stdin")?;
	if !config.wait {
		return Ok((Some(buf), None));
	}

	let (head, tail) = split_last_document(&buf).context(
		"--wait needs the custom resource as the last `---` separated document on stdin",
	)?;
	debug!(head = head.len(), tail = tail.len(), "Split custom resource from stdin");
	Ok((Some(head.to_vec()), Some(tail.to_vec())))
}

/// Build the complete stdout text for `config`.
///
/// Nothing is returned unless every resource was built and serialized.
pub fn view<R: Read>(config: &ViewConfig, stdin: R) -> Result<String> {
	let (primary_stream, cr_stream) = read_stream(config, stdin)?;
	let mut out = String::new();

	let secrets =
		syncset::transform_secrets(&config.name, config.target.prefix(), config.resources.as_deref())?;
	for secret in &secrets {
		out.push_str(&render::to_json(secret)?);
		out.push('\n');
	}

	let primary = config.assemble(
		&config.name,
		&SourceSet {
			resources: config.resources.clone(),
			patches: config.patches.clone(),
			extra: primary_stream,
		},
	)?;
	debug!(kind = primary.kind(), name = primary.name(), "Generated");
	out.push_str(&render::render(&primary, config.output)?);

	if let Some(cr) = cr_stream {
		let cr_name = format!("{}-cr", config.name);
		let second = config.assemble(
			&cr_name,
			&SourceSet {
				extra: Some(cr),
				..Default::default()
			},
		)?;
		debug!(kind = second.kind(), name = second.name(), "Generated");
		if !out.ends_with('\n') {
			out.push('\n');
		}
		out.push_str("---\n");
		out.push_str(&render::render(&second, config.output)?);
	}

	out.push_str("\n\n");
	Ok(out)
}

/// Run the view command.
pub fn run<W: Write>(args: ViewArgs, mut writer: W) -> Result<()> {
	let config = args.validate()?;
	let settings = config.load_settings(args.config.as_ref())?;
	let config = config.with_assemble_opts(settings.assemble_opts());

	let output = view(&config, io::stdin().lock())?;
	writer.write_all(output.as_bytes())?;
	writer.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;

	use super::*;

	fn args(name: Option<&str>, selector: &str, cluster_name: &str) -> ViewArgs {
		ViewArgs {
			name: name.map(str::to_string),
			selector: selector.to_string(),
			cluster_name: cluster_name.to_string(),
			..Default::default()
		}
	}

	#[rstest]
	#[case::neither(args(Some("x"), "", ""), ValidationError::NoTarget)]
	#[case::both(args(Some("x"), "env=prod", "prod-1"), ValidationError::ConflictingTargets)]
	#[case::no_name(args(None, "", "prod-1"), ValidationError::MissingName)]
	#[case::empty_name(args(Some(""), "", "prod-1"), ValidationError::MissingName)]
	#[case::target_checked_before_name(args(None, "", ""), ValidationError::NoTarget)]
	fn test_validate_errors(#[case] args: ViewArgs, #[case] expected: ValidationError) {
		assert_eq!(args.validate().unwrap_err(), expected);
	}

	#[test]
	fn test_error_messages() {
		assert_eq!(
			ValidationError::NoTarget.to_string(),
			"one of --selector or --cluster-name must be specified"
		);
		assert_eq!(
			ValidationError::ConflictingTargets.to_string(),
			"only one of --selector or --cluster-name can be specified"
		);
		assert_eq!(
			ValidationError::MissingName.to_string(),
			"name must be specified"
		);
	}

	#[test]
	fn test_unsupported_output() {
		let args = ViewArgs {
			output: "xml".to_string(),
			..args(Some("x"), "", "prod-1")
		};
		let err = args.validate().unwrap_err();
		assert_eq!(
			err.to_string(),
			"unable to match a printer suitable for the output format xml allowed formats are: [json yaml]"
		);
	}

	#[test]
	fn test_unsupported_input() {
		let args = ViewArgs {
			input: "http".to_string(),
			..args(Some("x"), "env=prod", "")
		};
		let err = args.validate().unwrap_err();
		assert_eq!(
			err.to_string(),
			"unsupported input source http allowed input sources are: [disk stdin]"
		);
	}

	#[test]
	fn test_invalid_selector() {
		let err = args(Some("x"), "env", "").validate().unwrap_err();
		assert_matches!(
			err,
			ValidationError::InvalidSelector(SelectorError::MissingEquals(_))
		);
	}

	#[rstest]
	#[case::missing_name(args(None, "env", ""), ValidationError::MissingName)]
	#[case::bad_output(
		ViewArgs { output: "xml".to_string(), ..args(Some("x"), "env", "") },
		ValidationError::UnsupportedOutput("xml".to_string())
	)]
	#[case::bad_input(
		ViewArgs { input: "http".to_string(), ..args(Some("x"), "env", "") },
		ValidationError::UnsupportedInput("http".to_string())
	)]
	fn test_selector_parsed_last(#[case] args: ViewArgs, #[case] expected: ValidationError) {
		assert_eq!(args.validate().unwrap_err(), expected);
	}

	#[derive(clap::Parser)]
	struct Cli {
		#[command(flatten)]
		view: ViewArgs,
	}

	#[test]
	fn test_log_level_flag() {
		use clap::Parser;

		let cli = Cli::try_parse_from(["ss", "demo", "--log-level", "fatal"]).unwrap();
		assert_eq!(cli.view.log_level, Some(LevelFilter::ERROR));

		let err = Cli::try_parse_from(["ss", "demo", "--log-level", "loud"]).unwrap_err();
		assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
	}

	#[test]
	fn test_cluster_name_selects_sync_set() {
		let config = args(Some("demo"), "", "prod-1").validate().unwrap();
		assert_eq!(config.target, Target::Cluster("prod-1".to_string()));
		assert_eq!(config.target.prefix(), "ss");
		assert_eq!(config.output, OutputFormat::Json);
		assert_eq!(config.input, InputSource::Disk);
		assert_eq!(config.resources, None);
	}

	#[test]
	fn test_selector_selects_selector_sync_set() {
		let args = ViewArgs {
			resources: "manifests".to_string(),
			output: "yaml".to_string(),
			input: "stdin".to_string(),
			wait: true,
			..args(Some("demo"), "env=prod", "")
		};
		let config = args.validate().unwrap();
		assert_eq!(
			config.target,
			Target::Selector("env=prod".parse().unwrap())
		);
		assert_eq!(config.target.prefix(), "sss");
		assert_eq!(config.output, OutputFormat::Yaml);
		assert_eq!(config.input, InputSource::Stdin);
		assert_eq!(config.resources, Some(PathBuf::from("manifests")));
		assert!(config.wait);
	}

	#[test]
	fn test_wait_without_separator_fails() {
		let args = ViewArgs {
			input: "stdin".to_string(),
			wait: true,
			..args(Some("demo"), "env=prod", "")
		};
		let config = args.validate().unwrap();
		let err = view(&config, "apiVersion: v1\nkind: Namespace\n".as_bytes()).unwrap_err();
		assert!(err.to_string().contains("--wait"));
	}

	#[test]
	fn test_disk_mode_ignores_stdin() {
		let config = args(Some("demo"), "", "prod-1").validate().unwrap();
		let out = view(&config, "not yaml: [".as_bytes()).unwrap();
		assert!(out.contains("\"kind\": \"SyncSet\""));
		assert!(out.ends_with("}\n\n"));
	}
}
