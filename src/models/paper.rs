//! Paper model representing a research paper from any provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A paper author with an optional provider-scoped identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name
    pub name: String,

    /// Provider-specific author ID (OpenAlex author URI, S2 author ID, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

impl Author {
    /// Create an author with a name only
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author_id: None,
        }
    }

    /// Create an author with a provider author ID
    pub fn with_id(name: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author_id: Some(author_id.into()),
        }
    }
}

/// A research paper normalized from any provider
///
/// This struct provides a standardized format for papers across all
/// providers, making results from different repositories comparable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// Provider-scoped identifier (arXiv ID, OpenAlex work URI, S2 ID, ...)
    pub external_id: String,

    /// Paper title
    pub title: String,

    /// Authors in the order the provider reported them
    pub authors: Vec<Author>,

    /// Abstract text (may be empty when the provider withholds it)
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Paper landing page URL
    pub url: String,

    /// Digital Object Identifier, compared case-insensitively
    pub doi: Option<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Venue / journal name
    pub venue: Option<String>,

    /// Citation count
    pub citation_count: Option<u32>,

    /// Provider tag ("openalex", "crossref", ...)
    pub source: String,

    /// Provider-specific metadata (flexible JSON)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Store-assigned ID once persisted externally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(external_id: String, title: String, url: String, source: String) -> Self {
        Self {
            external_id,
            title,
            authors: Vec::new(),
            abstract_text: String::new(),
            url,
            doi: None,
            year: None,
            venue: None,
            citation_count: None,
            source,
            metadata: HashMap::new(),
            id: None,
        }
    }

    /// Lowercased DOI, if the paper has one
    pub fn doi_lowercase(&self) -> Option<String> {
        self.doi
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(str::to_lowercase)
    }

    /// Returns the primary identifier for this paper (DOI if available)
    pub fn primary_id(&self) -> &str {
        self.doi
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.external_id)
    }

    /// Author display names in order
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.name.as_str()).collect()
    }
}

/// Builder for constructing Paper objects from provider responses
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            paper: Paper::new(
                external_id.into(),
                title.into(),
                url.into(),
                source.into(),
            ),
        }
    }

    /// Set authors
    pub fn authors(mut self, authors: Vec<Author>) -> Self {
        self.paper.authors = authors;
        self
    }

    /// Add a single author
    pub fn author(mut self, author: Author) -> Self {
        self.paper.authors.push(author);
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.abstract_text = abstract_text.into();
        self
    }

    /// Set DOI (empty strings are treated as absent)
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        if !doi.is_empty() {
            self.paper.doi = Some(doi);
        }
        self
    }

    /// Set publication year
    pub fn year(mut self, year: i32) -> Self {
        self.paper.year = Some(year);
        self
    }

    /// Set publication year from an optional value
    pub fn maybe_year(mut self, year: Option<i32>) -> Self {
        self.paper.year = year;
        self
    }

    /// Set venue
    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        let venue = venue.into();
        if !venue.is_empty() {
            self.paper.venue = Some(venue);
        }
        self
    }

    /// Set citation count
    pub fn citation_count(mut self, count: u32) -> Self {
        self.paper.citation_count = Some(count);
        self
    }

    /// Add provider-specific metadata
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.paper.metadata.insert(key.into(), value);
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}
