//! Compiled CSS selectors.
//!
//! Selectors are compiled once by `kuchikikiki` and keep their source text so
//! page layouts can be stored and compared as strings.

use kuchikikiki::{NodeRef, Selectors};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// A parsed CSS selector list.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    compiled: Arc<Selectors>,
    source: String,
}

impl Selector {
    /// Parse a selector string.
    pub fn parse(s: &str) -> Result<Self> {
        let source = s.trim();
        if source.is_empty() {
            return Err(Error::InvalidSelector(s.to_string()));
        }
        let compiled =
            Selectors::compile(source).map_err(|()| Error::InvalidSelector(s.to_string()))?;

        Ok(Self {
            compiled: Arc::new(compiled),
            source: source.to_string(),
        })
    }

    /// Whether `node` is an element satisfying this selector.
    pub(crate) fn matches(&self, node: &NodeRef) -> bool {
        node.clone()
            .into_element_ref()
            .is_some_and(|element| self.compiled.matches(&element))
    }

    /// The selector text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.source
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
