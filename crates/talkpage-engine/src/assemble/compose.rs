use chrono::{DateTime, Utc};

use crate::context::SiteContext;
use crate::error::EngineError;
use crate::indentation::normalize;
use crate::timestamp::FormatStyle;

/// The four-tilde signature the wiki expands on save.
pub const SIGNATURE_MARKER: &str = "~~~~";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signing {
    /// Append the signature marker unless the body already has one.
    Sign,
    /// Leave the message unsigned, optionally noting when it was posted.
    Unsigned { posted_at: Option<DateTime<Utc>> },
}

/// A new comment as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: String,
    pub signing: Signing,
}

impl Message {
    pub fn signed(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            signing: Signing::Sign,
        }
    }

    pub fn unsigned(body: impl Into<String>, posted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            body: body.into(),
            signing: Signing::Unsigned { posted_at },
        }
    }
}

/// Whether `body` is signed already or asks not to be.
pub fn has_signature(body: &str, ctx: &SiteContext) -> bool {
    body.contains(SIGNATURE_MARKER)
        || ctx
            .config
            .no_signature_markers
            .iter()
            .any(|marker| body.contains(marker.as_str()))
}

/// Produces the wikitext for `message` placed at `prefix`.
pub fn compose(message: &Message, prefix: &str, ctx: &SiteContext) -> Result<String, EngineError> {
    let mut body = message.body.trim_end().to_string();

    match message.signing {
        Signing::Sign if !has_signature(&body, ctx) => {
            body.push_str(&ctx.config.signature_prefix);
            body.push_str(SIGNATURE_MARKER);
        }
        Signing::Unsigned {
            posted_at: Some(date),
        } => {
            let timestamp = ctx.timestamps.format(date, FormatStyle::Default, true, date);
            body.push(' ');
            body.push_str(&ctx.config.messages.posted_at.replace("{timestamp}", &timestamp));
        }
        _ => {}
    }

    normalize(&body, prefix, ctx.config.indentation_mode, ctx)
}

/// A heading line at `level` for `headline`.
pub fn heading_line(headline: &str, level: u8) -> String {
    let marks = "=".repeat(usize::from(level.clamp(1, 6)));
    let headline = headline.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{marks} {headline} {marks}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> SiteContext {
        SiteContext::english()
    }

    #[test]
    fn signs_unsigned_body() {
        let text = compose(&Message::signed("Thanks"), ":", &ctx()).unwrap();
        assert_eq!(text, ": Thanks ~~~~");
    }

    #[test]
    fn keeps_existing_signature() {
        let text = compose(&Message::signed("Thanks ~~~~"), ":", &ctx()).unwrap();
        assert_eq!(text, ": Thanks ~~~~");
    }

    #[test]
    fn no_signature_marker_suppresses_signing() {
        let text = compose(&Message::signed("{{nosig}} bot note"), "", &ctx()).unwrap();
        assert_eq!(text, "{{nosig}} bot note");
    }

    #[test]
    fn unsigned_with_time_gets_posted_at_note() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 8, 5, 0).unwrap();
        let text = compose(&Message::unsigned("Note", Some(date)), "", &ctx()).unwrap();
        insta::assert_snapshot!(text, @"Note Posted at 08:05, 1 March 2024 (UTC)");
    }

    #[test]
    fn heading_lines() {
        assert_eq!(heading_line("New  topic\n", 2), "== New topic ==");
        assert_eq!(heading_line("Deep", 9), "====== Deep ======");
    }
}
