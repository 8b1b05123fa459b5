//! In-memory discussion units, as derived from the rendered page.
//!
//! These are the targets the matcher reconciles against raw wikitext. Their
//! identity (author, original timestamp) never changes after construction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// `YYYYMMDDHHMM_Author`, with the timestamp in UTC and spaces in the user
/// name replaced by underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CommentId(String);

impl CommentId {
    pub fn new(date: DateTime<Utc>, author: &str) -> Self {
        Self(format!(
            "{}_{}",
            date.format("%Y%m%d%H%M"),
            author.trim().replace(' ', "_")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Normalized display text of the heading.
    pub headline: String,
    /// Heading level, 2 to 6 for discussion sections.
    pub level: u8,
    /// Position among the page's headings in document order.
    pub index: usize,
    pub id: Option<String>,
    /// Headlines of the enclosing sections, closest first.
    pub ancestors: Vec<String>,
    pub oldest_comment_id: Option<CommentId>,
    pub comments: Vec<CommentId>,
}

impl Section {
    pub fn new(headline: impl Into<String>, level: u8, index: usize) -> Self {
        Self {
            headline: headline.into(),
            level,
            index,
            id: None,
            ancestors: Vec::new(),
            oldest_comment_id: None,
            comments: Vec::new(),
        }
    }

    pub fn with_ancestors(mut self, ancestors: Vec<String>) -> Self {
        self.ancestors = ancestors;
        self
    }

    pub fn with_oldest_comment(mut self, id: CommentId) -> Self {
        self.oldest_comment_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub author: String,
    pub date: DateTime<Utc>,
    /// The literal list prefix, such as `"::"`.
    pub indentation_chars: String,
    pub is_opening_section: bool,
    pub signature: String,
    pub parent_id: Option<CommentId>,
    /// Position among the page's signatures in document order.
    pub index: usize,
    /// Headline of the section the comment belongs to.
    pub section_headline: Option<String>,
}

impl Comment {
    pub fn new(author: impl Into<String>, date: DateTime<Utc>, indentation_chars: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            date,
            indentation_chars: indentation_chars.into(),
            is_opening_section: false,
            signature: String::new(),
            parent_id: None,
            index: 0,
            section_headline: None,
        }
    }

    pub fn id(&self) -> CommentId {
        CommentId::new(self.date, &self.author)
    }

    /// Nesting depth, from the length of the indentation prefix.
    pub fn level(&self) -> usize {
        self.indentation_chars.chars().count()
    }
}
