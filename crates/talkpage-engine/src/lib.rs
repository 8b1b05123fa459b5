pub mod api;
pub mod assemble;
pub mod context;
pub mod error;
pub mod indentation;
pub mod locate;
pub mod masking;
pub mod models;
pub mod text;
pub mod timestamp;

// Re-export key types for easier usage
pub use api::{EditOutcome, EditRequest, Page, PageContent, WikiApi, submit_with_retry};
pub use assemble::{Action, CommentAction, Message, SectionAction, Signing, assemble};
pub use context::{ContextError, SiteContext};
pub use error::EngineError;
pub use indentation::{normalize, reply_indentation};
pub use locate::{MatchDetail, SourceMatch, locate_comment, locate_section};
pub use masking::{MaskOptions, MaskedCode, Masker};
pub use models::{Comment, CommentId, Section};
pub use timestamp::{FormatStyle, ParsedTimestamp, TimestampCodec, Timezone};
