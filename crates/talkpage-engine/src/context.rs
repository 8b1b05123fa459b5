//! Compiled, immutable per-wiki context.
//!
//! Built once from a [`SiteConfig`] and passed by reference into every engine
//! entry point. Nothing in the engine reads configuration from anywhere else.

use regex::Regex;
use talkpage_config::SiteConfig;
use thiserror::Error;

use crate::masking::Masker;
use crate::timestamp::TimestampCodec;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid {name} pattern: {source}")]
    InvalidPattern {
        name: &'static str,
        source: regex::Error,
    },

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("digit table must have exactly ten characters: {0}")]
    InvalidDigits(String),

    #[error("date format has no date tokens: {0}")]
    InvalidDateFormat(String),

    #[error("message table {name} must have {expected} entries, found {found}")]
    InvalidMessages {
        name: &'static str,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone)]
pub struct SiteContext {
    pub config: SiteConfig,
    pub timestamps: TimestampCodec,
    pub masker: Masker,
    /// Captures the user name of a user page, user talk page or contributions link.
    pub author_link: Regex,
    /// Applied to the text before an author link; the match start is where the signature begins.
    pub signature_prefix: Regex,
    /// Applied to the text after the timestamp label; the match extends the signature.
    pub signature_ending: Regex,
}

impl SiteContext {
    pub fn new(config: &SiteConfig) -> Result<Self, ContextError> {
        let timestamps = TimestampCodec::new(config)?;
        let masker = Masker::new(&config.verbatim_tags)?;

        let mut namespaces: Vec<String> = config
            .user_namespaces
            .iter()
            .map(|ns| namespace_pattern(ns))
            .collect();
        if namespaces.is_empty() {
            namespaces.push("User".to_string());
        }
        let author_link = compile(
            "author link",
            &format!(
                r"\[\[\s*(?i:(?:{}))\s*:\s*([^|\]#/\n]+?)\s*(?:[|\]#/])|\[\[\s*(?i:{})\s*/\s*([^|\]#/\n]+?)\s*[|\]]",
                namespaces.join("|"),
                namespace_pattern(&config.contributions_page),
            ),
        )?;

        Ok(Self {
            config: config.clone(),
            timestamps,
            masker,
            author_link,
            signature_prefix: compile("signature prefix", &config.signature_prefix_pattern)?,
            signature_ending: compile("signature ending", &config.signature_ending_pattern)?,
        })
    }

    /// The context for an English wiki in UTC.
    pub fn english() -> Self {
        Self::new(&SiteConfig::default()).expect("default site config compiles")
    }
}

/// Namespace names match with spaces and underscores interchangeable.
fn namespace_pattern(name: &str) -> String {
    regex::escape(name.trim()).replace(' ', "[ _]")
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, ContextError> {
    Regex::new(pattern).map_err(|source| ContextError::InvalidPattern { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(ctx: &SiteContext, code: &str) -> Option<String> {
        ctx.author_link.captures(code).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
        })
    }

    #[test]
    fn default_context_compiles() {
        let ctx = SiteContext::english();
        assert_eq!(ctx.config.indentation_char, ':');
    }

    #[test]
    fn author_links() {
        let ctx = SiteContext::english();
        assert_eq!(author(&ctx, "[[User:Alice|Alice]]").as_deref(), Some("Alice"));
        assert_eq!(author(&ctx, "[[user talk:Bob Smith|talk]]").as_deref(), Some("Bob Smith"));
        assert_eq!(author(&ctx, "[[User_talk:Carol]]").as_deref(), Some("Carol"));
        assert_eq!(
            author(&ctx, "[[Special:Contributions/192.0.2.1|192.0.2.1]]").as_deref(),
            Some("192.0.2.1")
        );
        assert_eq!(author(&ctx, "[[Userspace essay]]"), None);
    }

    #[test]
    fn invalid_signature_pattern_is_reported() {
        let mut config = SiteConfig::default();
        config.signature_ending_pattern = "(".into();
        let err = SiteContext::new(&config).unwrap_err();
        assert!(matches!(
            err,
            ContextError::InvalidPattern {
                name: "signature ending",
                ..
            }
        ));
    }
}
