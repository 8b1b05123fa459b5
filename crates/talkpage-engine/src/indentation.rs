//! Rewrites the list markers of a message for its place in a thread.
//!
//! A reply lives inside a `:`/`*`/`#` list. Every line of the message must
//! carry the reply's prefix, or it falls out of the list and renders as a
//! separate top-level paragraph. Messages without lists of their own are
//! folded onto a single line with explicit breaks instead.

use regex::Regex;
use std::sync::OnceLock;
use talkpage_config::IndentationMode;

use crate::context::SiteContext;
use crate::error::EngineError;
use crate::masking::MaskOptions;
use crate::text::list_markers;

const BLOCK_PLACEHOLDER: char = '\x03';
const BLOCK_TAGS: &str =
    "div|p|table|tbody|tr|td|th|ul|ol|li|dl|dd|dt|blockquote|pre|center|h[1-6]|hr|gallery|source|syntaxhighlight";

struct Patterns {
    trailing_tag: Regex,
    leading_tag: Regex,
    break_before_block: Regex,
    break_after_block: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        trailing_tag: Regex::new(r"(?:<[a-zA-Z/][^<>]*>|\x04)[ \t]*$").expect("Invalid tag regex"),
        leading_tag: Regex::new(r"^[ \t]*(?:</?[a-zA-Z][^<>]*>|\x03)").expect("Invalid tag regex"),
        break_before_block: Regex::new(&format!(
            r"(?i)(?:<br\s*/?>)+(\s*</?(?:{BLOCK_TAGS})\b[^>]*>)"
        ))
        .expect("Invalid block break regex"),
        break_after_block: Regex::new(&format!(
            r"(?i)(</?(?:{BLOCK_TAGS})\b[^>]*>[ \t]*)(?:<br\s*/?>)+"
        ))
        .expect("Invalid block break regex"),
    })
}

/// The prefix for a reply to a comment indented with `parent`.
///
/// In mimic mode the parent's last list character is repeated, unless it is
/// `#` (a reply is not a new numbered item). Unify mode always appends the
/// default character and turns every `*` into it.
pub fn reply_indentation(parent: &str, mode: IndentationMode, default_char: char) -> String {
    match mode {
        IndentationMode::Mimic => {
            let next = match parent.chars().last() {
                Some(c) if c != '#' => c,
                _ => default_char,
            };
            format!("{parent}{next}")
        }
        IndentationMode::Unify => {
            let mut prefix = parent.replace('*', &default_char.to_string());
            prefix.push(default_char);
            prefix
        }
    }
}

/// Rewrites `raw` so that every line sits at `prefix`.
///
/// An empty prefix places the message at zero level: markers are left alone
/// and consecutive plain lines get explicit `<br>` breaks. Otherwise, if the
/// message has lists of its own, every line gets the prefix with `*`
/// collapsed to `:`. Without lists the message is folded onto one line.
///
/// Fails with [`EngineError::CantParse`] when a listed message would have to
/// be placed under a bare `#`.
pub fn normalize(
    raw: &str,
    prefix: &str,
    mode: IndentationMode,
    ctx: &SiteContext,
) -> Result<String, EngineError> {
    let body = raw.replace("\r\n", "\n");
    let body = body.trim_end().trim_start_matches('\n');
    if body.is_empty() {
        return Ok(String::new());
    }

    let masked = ctx.masker.mask(body, MaskOptions::message(prefix.is_empty()));
    let lines: Vec<&str> = masked.text().split('\n').collect();

    let out = if prefix.is_empty() {
        soft_breaks(&lines)
    } else {
        let collapsed = prefix.replace('*', ":");
        let list_present = masked.make_all_into_colons()
            || lines.iter().any(|line| {
                let markers = list_markers(line);
                !markers.is_empty() && !is_prefixed(markers, prefix, &collapsed)
            });

        let paragraph = match &ctx.config.paragraph_template {
            Some(name) => format!("{{{{{name}}}}}"),
            None => "<br><br>".to_string(),
        };
        if list_present {
            if collapsed == "#" {
                log::warn!("refusing to place a listed message under a bare '#'");
                return Err(EngineError::CantParse);
            }
            prefix_lines(&lines, prefix, &collapsed, mode, &paragraph)
        } else {
            fold_lines(&lines, prefix, &collapsed, &paragraph)
        }
    };

    Ok(strip_redundant_breaks(&masked.unmask_str(&out)))
}

/// Drops `<br>` markers directly before or after a block-level tag.
pub fn strip_redundant_breaks(text: &str) -> String {
    let p = patterns();
    let text = p.break_before_block.replace_all(text, "$1");
    p.break_after_block.replace_all(&text, "$1").into_owned()
}

fn is_prefixed(markers: &str, prefix: &str, collapsed: &str) -> bool {
    markers.starts_with(prefix) || markers.starts_with(collapsed)
}

fn is_bare(line: &str) -> bool {
    !line.trim().is_empty()
        && list_markers(line).is_empty()
        && !line.starts_with('=')
        && !line.starts_with(' ')
        && !line.starts_with(BLOCK_PLACEHOLDER)
}

fn soft_breaks(lines: &[&str]) -> String {
    let p = patterns();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let followed_by_bare = lines.get(i + 1).is_some_and(|next| is_bare(next));
            if is_bare(line) && followed_by_bare && !p.trailing_tag.is_match(line) {
                format!("{line}<br>")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix_lines(
    lines: &[&str],
    prefix: &str,
    collapsed: &str,
    mode: IndentationMode,
    paragraph: &str,
) -> String {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut pending_blank = false;
    let mut last_bare = false;
    for line in lines {
        if line.trim().is_empty() {
            pending_blank = true;
            continue;
        }
        let bare = is_bare(line);
        if std::mem::take(&mut pending_blank) {
            match out.last_mut() {
                // Paragraphs of plain text share one item.
                Some(last) if last_bare && bare => {
                    last.push_str(paragraph);
                    last.push_str(line.trim_start());
                    continue;
                }
                // A blank line would end the list; keep the gap as an empty item.
                Some(_) => out.push(collapsed.to_string()),
                None => {}
            }
        }
        last_bare = bare;

        let markers = list_markers(line);
        let rewritten = if !markers.is_empty() && is_prefixed(markers, prefix, collapsed) {
            line.to_string()
        } else if !markers.is_empty() {
            match mode {
                IndentationMode::Mimic => format!("{collapsed}{line}"),
                IndentationMode::Unify => format!("{collapsed}{}", &line[markers.len()..]),
            }
        } else if line.starts_with(BLOCK_PLACEHOLDER) {
            format!("{collapsed}{line}")
        } else {
            format!("{collapsed} {}", line.trim_start())
        };
        out.push(rewritten);
    }
    out.join("\n")
}

fn fold_lines(lines: &[&str], prefix: &str, collapsed: &str, paragraph: &str) -> String {
    let p = patterns();
    let mut out: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut pending_paragraph = false;

    for line in lines {
        if line.trim().is_empty() {
            pending_paragraph = current.is_some();
            continue;
        }
        let markers = list_markers(line);
        if !markers.is_empty() && is_prefixed(markers, prefix, collapsed) {
            out.extend(current.take());
            out.push(line.to_string());
        } else {
            match current.as_mut() {
                None => current = Some(format!("{prefix} {}", line.trim_start())),
                Some(folded) => {
                    if pending_paragraph {
                        folded.push_str(paragraph);
                    } else if !p.trailing_tag.is_match(folded) && !p.leading_tag.is_match(line) {
                        folded.push_str("<br>");
                    }
                    folded.push_str(line);
                }
            }
        }
        pending_paragraph = false;
    }
    out.extend(current);
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use talkpage_config::SiteConfig;

    fn ctx() -> SiteContext {
        SiteContext::english()
    }

    // ============ Reply prefixes ============

    #[rstest]
    #[case("", IndentationMode::Mimic, ":")]
    #[case(":", IndentationMode::Mimic, "::")]
    #[case("*", IndentationMode::Mimic, "**")]
    #[case(":*", IndentationMode::Mimic, ":**")]
    #[case("#", IndentationMode::Mimic, "#:")]
    #[case(":", IndentationMode::Unify, "::")]
    #[case("*", IndentationMode::Unify, "::")]
    #[case(":*:", IndentationMode::Unify, "::::")]
    fn reply_prefixes(#[case] parent: &str, #[case] mode: IndentationMode, #[case] expected: &str) {
        assert_eq!(reply_indentation(parent, mode, ':'), expected);
    }

    // ============ Zero level ============

    #[test]
    fn zero_level_keeps_markers_and_adds_soft_breaks() {
        let out = normalize("Line one\nLine two\n* item", "", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, "Line one<br>\nLine two\n* item");
    }

    #[test]
    fn zero_level_skips_breaks_after_tags() {
        let out = normalize("<div>\ntext\n</div>", "", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, "<div>\ntext\n</div>");
    }

    #[test]
    fn zero_level_keeps_paragraphs() {
        let out = normalize("First\n\nSecond", "", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, "First\n\nSecond");
    }

    // ============ Messages without lists ============

    #[test]
    fn plain_message_is_folded_onto_one_line() {
        let out = normalize("Hello\nthere\n\nNew paragraph", "::", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, ":: Hello<br>there{{pb}}New paragraph");
    }

    #[test]
    fn paragraphs_without_template_use_double_breaks() {
        let mut config = SiteConfig::default();
        config.paragraph_template = None;
        let ctx = SiteContext::new(&config).unwrap();

        let out = normalize("One\n\nTwo", ":", IndentationMode::Mimic, &ctx).unwrap();
        assert_eq!(out, ": One<br><br>Two");
    }

    #[test]
    fn templates_spanning_lines_stay_intact() {
        let out = normalize("See {{quote|a\nb}}\nthanks", ":", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, ": See {{quote|a\nb}}<br>thanks");
    }

    // ============ Messages with lists ============

    #[test]
    fn unify_flattens_list_to_prefix() {
        let out = normalize("* item1\n* item2", "::", IndentationMode::Unify, &ctx()).unwrap();
        assert_eq!(out, ":: item1\n:: item2");
    }

    #[test]
    fn unmarked_lines_get_prefix_when_list_present() {
        let out = normalize("Intro\n* item1\n* item2", "::", IndentationMode::Unify, &ctx()).unwrap();
        assert_eq!(out, ":: Intro\n:: item1\n:: item2");
    }

    #[test]
    fn mimic_keeps_own_markers_under_collapsed_prefix() {
        let out = normalize("Intro\n* a\n** b", "::", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, ":: Intro\n::* a\n::** b");
    }

    #[test]
    fn list_under_numbered_prefix_cannot_be_parsed() {
        let err = normalize("* a\n* b", "#", IndentationMode::Mimic, &ctx()).unwrap_err();
        assert_eq!(err, EngineError::CantParse);
    }

    #[test]
    fn plain_message_under_numbered_prefix_is_fine() {
        let out = normalize("Support", "#", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, "# Support");
    }

    #[test]
    fn table_in_reply_forces_colon_prefix() {
        let out = normalize("Data:\n{|\n| a\n|}", "*", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, ": Data:\n:{|\n| a\n|}");
    }

    #[test]
    fn blank_lines_in_list_become_one_empty_item() {
        let out = normalize("* a\n\n\n* b", ":", IndentationMode::Unify, &ctx()).unwrap();
        assert_eq!(out, ": a\n:\n: b");
    }

    #[test]
    fn paragraph_between_plain_lines_stays_in_one_item() {
        let out = normalize("Intro\n\nMore\n* a", "::", IndentationMode::Mimic, &ctx()).unwrap();
        assert_eq!(out, ":: Intro{{pb}}More\n::* a");
    }

    #[rstest]
    #[case("* a\nText\n\n* b", ": a\n: Text\n:\n: b")]
    #[case("Text\n\n\n* b", ": Text\n:\n: b")]
    fn blank_line_next_to_list_item_stays_empty_item(#[case] raw: &str, #[case] expected: &str) {
        let out = normalize(raw, ":", IndentationMode::Unify, &ctx()).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn list_paragraph_without_template_uses_double_breaks() {
        let mut config = SiteConfig::default();
        config.paragraph_template = None;
        let ctx = SiteContext::new(&config).unwrap();

        let out = normalize("One\n\nTwo\n* three", ":", IndentationMode::Unify, &ctx).unwrap();
        assert_eq!(out, ": One<br><br>Two\n: three");
    }

    // ============ Idempotence ============

    #[rstest]
    #[case("Line one\nLine two", "")]
    #[case("Hello\nthere\n\nmore", "::")]
    #[case("* item1\n* item2", "::")]
    #[case("Intro\n* a\n** b", "::")]
    #[case("* a\n\n* b", ":")]
    #[case("Intro\n\nMore\n* a", "::")]
    #[case("Data:\n{|\n| a\n|}", ":")]
    fn normalizing_twice_changes_nothing(#[case] raw: &str, #[case] prefix: &str) {
        for mode in [IndentationMode::Mimic, IndentationMode::Unify] {
            let once = normalize(raw, prefix, mode, &ctx()).unwrap();
            let twice = normalize(&once, prefix, mode, &ctx()).unwrap();
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn breaks_next_to_block_tags_are_removed() {
        assert_eq!(strip_redundant_breaks("a<br><div>b</div><br>c"), "a<div>b</div>c");
        assert_eq!(strip_redundant_breaks("a<br>b"), "a<br>b");
    }
}
