//! The boundary to the wiki: fetching page code and submitting edits.
//!
//! The engine never talks to a network itself. A [`WikiApi`] implementation
//! is handed in, and [`submit_with_retry`] drives the fetch, locate,
//! assemble, submit cycle, starting from freshly fetched code on every
//! attempt.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assemble::{Action, assemble};
use crate::context::SiteContext;
use crate::error::EngineError;
use crate::locate::{SourceMatch, locate_comment, locate_section};
use crate::models::{Comment, Section};

/// How many times an edit conflict restarts the cycle before giving up.
pub const MAX_EDIT_ATTEMPTS: usize = 3;

/// Raw page code as fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub content: String,
    pub revision_id: u64,
    pub revision_timestamp: DateTime<Utc>,
    pub query_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditRequest {
    pub title: String,
    pub text: String,
    pub summary: String,
    pub baserevid: u64,
    pub basetimestamp: DateTime<Utc>,
    pub starttimestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum EditOutcome {
    Success { revision_id: u64 },
    EditConflict,
    SpamBlacklist { matches: Vec<String> },
    Unknown { code: String, info: String },
}

pub trait WikiApi {
    /// Fetches the code of a page, or of one numbered section of it.
    fn fetch(&self, title: &str, section: Option<u32>) -> Result<PageContent, EngineError>;

    fn submit(&mut self, request: &EditRequest) -> Result<EditOutcome, EngineError>;
}

/// A page whose code may or may not have been loaded yet.
#[derive(Debug, Clone)]
pub struct Page {
    pub title: String,
    content: Option<PageContent>,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: None,
        }
    }

    /// Replaces any loaded code with a fresh fetch.
    pub fn load(&mut self, api: &impl WikiApi) -> Result<&PageContent, EngineError> {
        let content = api.fetch(&self.title, None)?;
        log::info!(
            "loaded {} at revision {} ({} bytes)",
            self.title,
            content.revision_id,
            content.content.len()
        );
        Ok(self.content.insert(content))
    }

    pub fn content(&self) -> Result<&PageContent, EngineError> {
        self.content.as_ref().ok_or(EngineError::NoCode)
    }

    pub fn code(&self) -> Result<&str, EngineError> {
        Ok(&self.content()?.content)
    }

    pub fn locate_section(&self, target: &Section, ctx: &SiteContext) -> Result<SourceMatch, EngineError> {
        locate_section(self.code()?, target, ctx)
    }

    pub fn locate_comment(&self, target: &Comment, ctx: &SiteContext) -> Result<SourceMatch, EngineError> {
        locate_comment(self.code()?, target, ctx)
    }

    pub fn assemble(&self, action: &Action, ctx: &SiteContext) -> Result<String, EngineError> {
        assemble(self.code()?, action, ctx)
    }
}

/// Applies `action` to a page and submits it.
///
/// Each attempt fetches the page again and recomputes the new code from
/// scratch; an edit conflict starts the next attempt. Outcomes other than a
/// conflict are returned to the caller as they are.
pub fn submit_with_retry(
    api: &mut impl WikiApi,
    title: &str,
    action: &Action,
    summary: &str,
    ctx: &SiteContext,
) -> Result<EditOutcome, EngineError> {
    let mut page = Page::new(title);
    let mut outcome = EditOutcome::EditConflict;

    for attempt in 1..=MAX_EDIT_ATTEMPTS {
        page.load(&*api)?;
        let content = page.content()?;
        let text = page.assemble(action, ctx)?;

        let request = EditRequest {
            title: title.to_string(),
            text,
            summary: summary.to_string(),
            baserevid: content.revision_id,
            basetimestamp: content.revision_timestamp,
            starttimestamp: content.query_timestamp,
        };
        outcome = api.submit(&request)?;
        match &outcome {
            EditOutcome::EditConflict => {
                log::info!("edit conflict on {title}, attempt {attempt} of {MAX_EDIT_ATTEMPTS}");
            }
            EditOutcome::Success { revision_id } => {
                log::info!("saved {title} as revision {revision_id}");
                break;
            }
            EditOutcome::SpamBlacklist { .. } | EditOutcome::Unknown { .. } => {
                log::warn!("edit to {title} was rejected: {outcome:?}");
                break;
            }
        }
    }
    Ok(outcome)
}
