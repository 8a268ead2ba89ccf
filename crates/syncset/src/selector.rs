//! Cluster label selectors given on the command line as `key=value[,key=value]`.

use std::{collections::BTreeMap, fmt, str::FromStr};

use thiserror::Error;

use crate::model::LabelSelector;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
	#[error("selector is empty")]
	Empty,
	#[error("selector term {0:?} is not of the form key=value")]
	MissingEquals(String),
	#[error("selector term {0:?} has an empty key")]
	EmptyKey(String),
	#[error("selector key {0:?} is given more than once")]
	DuplicateKey(String),
}

/// Exact-match label requirements, all of which a cluster must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	labels: BTreeMap<String, String>,
}

impl Selector {
	pub fn labels(&self) -> &BTreeMap<String, String> {
		&self.labels
	}

	pub fn to_label_selector(&self) -> LabelSelector {
		LabelSelector {
			match_labels: self.labels.clone(),
		}
	}
}

impl FromStr for Selector {
	type Err = SelectorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.trim().is_empty() {
			return Err(SelectorError::Empty);
		}

		let mut labels = BTreeMap::new();
		for term in s.split(',') {
			let (key, value) = term
				.split_once('=')
				.ok_or_else(|| SelectorError::MissingEquals(term.to_string()))?;
			let key = key.trim();
			if key.is_empty() {
				return Err(SelectorError::EmptyKey(term.to_string()));
			}
			if labels
				.insert(key.to_string(), value.trim().to_string())
				.is_some()
			{
				return Err(SelectorError::DuplicateKey(key.to_string()));
			}
		}

		Ok(Self { labels })
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, (key, value)) in self.labels.iter().enumerate() {
			if i > 0 {
				write!(f, ",")?;
			}
			write!(f, "{key}={value}")?;
		}
		Ok(())
	}
}
