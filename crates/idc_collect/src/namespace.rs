//! Metric namespaces
//!
//! A namespace is an ordered path of elements. Static elements carry a fixed
//! value; dynamic elements carry a name and get their value per record.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use idc_config::NAMESPACE_LEN;

/// Position of the series element
pub const SERIES_POSITION: usize = 2;

/// Position of the data type (value column) element
pub const DATA_TYPE_POSITION: usize = 3;

/// Series filter matching every series
pub const SERIES_WILDCARD: &str = "*";

/// One element of a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceElement {
    pub value: String,
    /// Set for dynamic elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl NamespaceElement {
    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            name: None,
            description: String::new(),
        }
    }

    pub fn dynamic(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: SERIES_WILDCARD.to_string(),
            name: Some(name.into()),
            description: description.into(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.name.is_some()
    }
}

/// Ordered metric namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Vec<NamespaceElement>);

impl Namespace {
    /// Start a namespace from static elements
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(NamespaceElement::fixed).collect())
    }

    /// Build a namespace from plain segment values, every element static
    pub fn from_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(values)
    }

    pub fn add_static_element(mut self, value: impl Into<String>) -> Self {
        self.0.push(NamespaceElement::fixed(value));
        self
    }

    pub fn add_dynamic_element(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.0.push(NamespaceElement::dynamic(name, description));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn element(&self, idx: usize) -> Option<&NamespaceElement> {
        self.0.get(idx)
    }

    /// Replace the value at `idx`; out-of-range positions are ignored
    pub fn set_value(&mut self, idx: usize, value: impl Into<String>) {
        if let Some(element) = self.0.get_mut(idx) {
            element.value = value.into();
        }
    }

    pub fn strings(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.value.as_str()).collect()
    }

    pub fn elements(&self) -> &[NamespaceElement] {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.strings().join("/"))
    }
}

/// Make a series name safe to use as a namespace element
pub fn sanitize_series_name(name: &str) -> String {
    name.replace('/', "_")
}
