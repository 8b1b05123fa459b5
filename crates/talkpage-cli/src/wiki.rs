//! A wiki backed by a directory of `.wiki` files.
//!
//! Each page title maps to one file. The revision id is a hash of the file
//! contents, so any write made behind our back since the fetch shows up as
//! an edit conflict on submit.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use talkpage_engine::{EditOutcome, EditRequest, EngineError, PageContent, WikiApi};

pub struct FileWiki {
    root: PathBuf,
}

impl FileWiki {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `Talk:Foo bar` is stored as `Talk_Foo_bar.wiki`.
    pub fn page_path(&self, title: &str) -> PathBuf {
        let name: String = title
            .chars()
            .map(|c| match c {
                ':' | '/' | '\\' | ' ' => '_',
                c => c,
            })
            .collect();
        self.root.join(format!("{name}.wiki"))
    }

    fn read(&self, title: &str) -> Result<(String, PathBuf), EngineError> {
        let path = self.page_path(title);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok((content, path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::ApiMissing {
                title: title.to_string(),
            }),
            Err(e) => {
                log::warn!("failed to read {}: {e}", path.display());
                Err(EngineError::ApiInvalid {
                    title: title.to_string(),
                })
            }
        }
    }
}

fn revision_of(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

impl WikiApi for FileWiki {
    fn fetch(&self, title: &str, section: Option<u32>) -> Result<PageContent, EngineError> {
        if let Some(section) = section {
            // Only whole pages are stored.
            return Err(EngineError::ApiNoSuchSection {
                title: title.to_string(),
                section,
            });
        }
        let (content, path) = self.read(title)?;
        Ok(PageContent {
            revision_id: revision_of(&content),
            revision_timestamp: modified_at(&path),
            query_timestamp: Utc::now(),
            content,
        })
    }

    fn submit(&mut self, request: &EditRequest) -> Result<EditOutcome, EngineError> {
        let (current, path) = self.read(&request.title)?;
        if revision_of(&current) != request.baserevid {
            return Ok(EditOutcome::EditConflict);
        }
        if let Err(e) = std::fs::write(&path, &request.text) {
            return Ok(EditOutcome::Unknown {
                code: "writefailed".to_string(),
                info: e.to_string(),
            });
        }
        log::info!("{}: {}", request.title, request.summary);
        Ok(EditOutcome::Success {
            revision_id: revision_of(&request.text),
        })
    }
}
