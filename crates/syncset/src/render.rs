//! JSON and YAML rendering of assembled resources.
//!
//! JSON is indented with four spaces. YAML goes through a JSON value first,
//! with mapping keys ordered the way Go's YAML marshallers order them, so the
//! output matches what `oc` users are used to seeing.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Value as JsonValue};
use thiserror::Error;
use tracing::instrument;

use crate::model::ParseEnumError;

#[derive(Debug, Error)]
pub enum RenderError {
	#[error("encoding JSON")]
	Json(#[from] serde_json::Error),

	#[error("encoding YAML")]
	Yaml(#[from] serde_saphyr::ser_error::Error),

	#[error("encoded JSON is not UTF-8")]
	Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
	#[default]
	Json,
	Yaml,
}

impl OutputFormat {
	pub const NAMES: &'static [&'static str] = &["json", "yaml"];
}

impl fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Yaml => write!(f, "yaml"),
		}
	}
}

impl FromStr for OutputFormat {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"json" => Ok(Self::Json),
			"yaml" => Ok(Self::Yaml),
			_ => Err(ParseEnumError {
				what: "output format",
				value: s.to_string(),
				expected: "json, yaml",
			}),
		}
	}
}

/// Sort all JSON object keys recursively to match Go's YAML output order.
pub fn sort_json_keys(value: JsonValue) -> JsonValue {
	match value {
		JsonValue::Object(map) => {
			let mut entries: Vec<(String, JsonValue)> = map.into_iter().collect();
			entries.sort_by(|(a, _), (b, _)| go_yaml_key_compare(a, b));

			JsonValue::Object(
				entries
					.into_iter()
					.map(|(k, v)| (k, sort_json_keys(v)))
					.collect(),
			)
		}
		JsonValue::Array(arr) => JsonValue::Array(arr.into_iter().map(sort_json_keys).collect()),
		other => other,
	}
}

/// Go YAML's "natural" key ordering:
/// - digit runs compare numerically
/// - right after digits, letters sort before non-letters
/// - elsewhere, non-letters sort before letters
fn go_yaml_key_compare(a: &str, b: &str) -> Ordering {
	let ar: Vec<char> = a.chars().collect();
	let br: Vec<char> = b.chars().collect();
	let mut digits = false;

	for i in 0..ar.len().min(br.len()) {
		if ar[i] == br[i] {
			digits = ar[i].is_ascii_digit();
			continue;
		}

		let al = ar[i].is_alphabetic();
		let bl = br[i].is_alphabetic();

		if al && bl {
			return ar[i].cmp(&br[i]);
		}

		if al || bl {
			let a_first = if digits { al } else { bl };
			return if a_first {
				Ordering::Less
			} else {
				Ordering::Greater
			};
		}

		// Leading zeros: a run like "10" vs "010" keeps comparing as numbers
		let mut keep_zeros = false;
		if ar[i] == '0' || br[i] == '0' {
			keep_zeros = ar[..i]
				.iter()
				.rev()
				.take_while(|c| c.is_ascii_digit())
				.any(|c| *c != '0');
		}

		let ai = i + ar[i..].iter().take_while(|c| c.is_ascii_digit()).count();
		let bi = i + br[i..].iter().take_while(|c| c.is_ascii_digit()).count();

		let by_value = compare_digit_runs(&ar[i..ai], &br[i..bi], keep_zeros);
		if by_value != Ordering::Equal {
			return by_value;
		}
		if ai != bi {
			return ai.cmp(&bi);
		}
		return ar[i].cmp(&br[i]);
	}

	ar.len().cmp(&br.len())
}

/// Numeric order of two digit runs, without parsing them into integers.
fn compare_digit_runs(a: &[char], b: &[char], keep_zeros: bool) -> Ordering {
	let significant = |run: &[char]| -> usize {
		if keep_zeros {
			0
		} else {
			run.iter().take_while(|c| **c == '0').count()
		}
	};
	let a = &a[significant(a)..];
	let b = &b[significant(b)..];
	a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Four-space indented JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RenderError> {
	let mut buf = Vec::new();
	let mut serializer =
		serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
	value.serialize(&mut serializer)?;
	Ok(String::from_utf8(buf)?)
}

/// Block-style YAML with Go-ordered keys.
#[instrument(skip_all)]
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String, RenderError> {
	let sorted = sort_json_keys(serde_json::to_value(value)?);

	let options = serde_saphyr::SerializerOptions {
		indent_step: 2,
		indent_array: Some(0),
		prefer_block_scalars: true,
		empty_map_as_braces: true,
		empty_array_as_brackets: true,
		line_width: Some(80),
		scientific_notation_threshold: Some(1000000),
		scientific_notation_small_threshold: Some(0.0001),
		quote_ambiguous_keys: true,
		quote_numeric_strings: true,
		..Default::default()
	};

	let mut output = String::new();
	serde_saphyr::to_fmt_writer_with_options(&mut output, &sorted, options)?;
	Ok(output)
}

pub fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<String, RenderError> {
	match format {
		OutputFormat::Json => to_json(value),
		OutputFormat::Yaml => to_yaml(value),
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[rstest]
	#[case::alpha("apiVersion", "kind", Ordering::Less)]
	#[case::numeric("item2", "item10", Ordering::Less)]
	#[case::prefix("spec", "specs", Ordering::Less)]
	#[case::equal("name", "name", Ordering::Equal)]
	#[case::underscore_before_letter("_x", "ax", Ordering::Less)]
	#[case::letter_after_digit("1a", "1_", Ordering::Less)]
	#[case::long_digit_runs("x12345678901234567890", "x22345678901234567890", Ordering::Less)]
	#[case::long_run_beats_short("x99", "x10000000000000000000000", Ordering::Less)]
	#[case::leading_zeros("a007", "a08", Ordering::Less)]
	fn test_go_yaml_key_compare(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
		assert_eq!(go_yaml_key_compare(a, b), expected);
	}

	#[test]
	fn test_sort_json_keys_recurses_into_arrays() {
		let value = json!({
			"spec": {"resources": [{"kind": "A", "apiVersion": "v1"}]},
			"kind": "SyncSet",
		});
		let sorted = sort_json_keys(value);
		let top: Vec<_> = sorted.as_object().unwrap().keys().cloned().collect();
		assert_eq!(top, vec!["kind", "spec"]);
		let nested: Vec<_> = sorted["spec"]["resources"][0]
			.as_object()
			.unwrap()
			.keys()
			.cloned()
			.collect();
		assert_eq!(nested, vec!["apiVersion", "kind"]);
	}

	#[test]
	fn test_to_json_uses_four_spaces() {
		let rendered = to_json(&json!({"a": [1], "b": {}})).unwrap();
		assert_eq!(rendered, "{\n    \"a\": [\n        1\n    ],\n    \"b\": {}\n}");
	}

	#[test]
	fn test_to_yaml_is_block_style_and_sorted() {
		let rendered = to_yaml(&json!({"kind": "SyncSet", "apiVersion": "hive.openshift.io/v1"}))
			.unwrap();
		assert_eq!(rendered, "apiVersion: hive.openshift.io/v1\nkind: SyncSet\n");
	}

	#[test]
	fn test_render_dispatches_on_format() {
		let value = json!({"name": "x"});
		assert!(render(&value, OutputFormat::Json).unwrap().starts_with('{'));
		assert_eq!(render(&value, OutputFormat::Yaml).unwrap(), "name: x\n");
	}

	#[rstest]
	#[case("json", OutputFormat::Json)]
	#[case("yaml", OutputFormat::Yaml)]
	fn test_output_format_from_str(#[case] input: &str, #[case] expected: OutputFormat) {
		assert_eq!(input.parse::<OutputFormat>().unwrap(), expected);
		assert_eq!(expected.to_string(), input);
	}

	#[test]
	fn test_output_format_rejects_unknown() {
		assert!("xml".parse::<OutputFormat>().is_err());
		assert_eq!(OutputFormat::NAMES, &["json", "yaml"]);
	}
}
