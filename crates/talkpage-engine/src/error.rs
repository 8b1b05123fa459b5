//! The closed error taxonomy surfaced to callers.
//!
//! Every failure carries a `type` and a `code` so UI layers can show a
//! consistent, localized message without inspecting raw errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Page code was not loaded before a locate or assemble call.
    #[error("page code has not been loaded")]
    NoCode,

    #[error("could not locate section \"{headline}\" in the page code")]
    LocateSection { headline: String },

    #[error("could not locate comment {comment_id} in the page code")]
    LocateComment { comment_id: String },

    /// The message has lists that cannot be re-indented under a `#` prefix.
    #[error("the message contains lists that cannot be placed under a numbered list")]
    CantParse,

    #[error("page \"{title}\" does not exist")]
    ApiMissing { title: String },

    #[error("page title \"{title}\" is invalid")]
    ApiInvalid { title: String },

    #[error("section {section} does not exist on \"{title}\"")]
    ApiNoSuchSection { title: String, section: u32 },

    #[error("cannot delete: the {target} has replies")]
    HasReplies { target: &'static str },
}

impl EngineError {
    /// The error family: `parse`, `api` or `edit`.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NoCode | Self::LocateSection { .. } | Self::LocateComment { .. } | Self::CantParse => {
                "parse"
            }
            Self::ApiMissing { .. } | Self::ApiInvalid { .. } | Self::ApiNoSuchSection { .. } => {
                "api"
            }
            Self::HasReplies { .. } => "edit",
        }
    }

    /// The stable error code within its family.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoCode => "noCode",
            Self::LocateSection { .. } => "locateSection",
            Self::LocateComment { .. } => "locateComment",
            Self::CantParse => "cantParse",
            Self::ApiMissing { .. } => "missing",
            Self::ApiInvalid { .. } => "invalid",
            Self::ApiNoSuchSection { .. } => "noSuchSection",
            Self::HasReplies { .. } => "hasReplies",
        }
    }

    /// Whether refetching the page and starting over can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LocateSection { .. }
                | Self::LocateComment { .. }
                | Self::ApiMissing { .. }
                | Self::ApiInvalid { .. }
                | Self::ApiNoSuchSection { .. }
        )
    }
}
