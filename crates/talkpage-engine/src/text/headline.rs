use regex::Regex;
use std::sync::OnceLock;

struct HeadlinePatterns {
    comment: Regex,
    template: Regex,
    wikilink: Regex,
    external_labelled: Regex,
    external_bare: Regex,
    quotes: Regex,
    tag: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static HeadlinePatterns {
    static PATTERNS: OnceLock<HeadlinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| HeadlinePatterns {
        comment: Regex::new(r"(?s)<!--.*?-->").expect("Invalid comment regex"),
        template: Regex::new(r"\{\{[^{}]*\}\}").expect("Invalid template regex"),
        wikilink: Regex::new(r"\[\[:?(?:[^\]|]*\|)?([^\]|]*)\]\]").expect("Invalid link regex"),
        external_labelled: Regex::new(r"\[(?:https?:)?//[^\s\]]+\s+([^\]]*)\]")
            .expect("Invalid external link regex"),
        external_bare: Regex::new(r"\[(?:https?:)?//[^\s\]]+\]")
            .expect("Invalid external link regex"),
        quotes: Regex::new(r"'{2,5}").expect("Invalid quote regex"),
        tag: Regex::new(r"</?[a-zA-Z][^>]*>").expect("Invalid tag regex"),
        whitespace: Regex::new(r"\s+").expect("Invalid whitespace regex"),
    })
}

/// Reduces headline wikitext to the text a reader sees.
///
/// Comments, templates, link targets, bold/italic quotes and HTML tags are
/// dropped, entities are decoded and whitespace collapses to single spaces.
/// Nested templates are removed innermost first.
pub fn normalize_headline(code: &str) -> String {
    let p = patterns();

    let mut text = p.comment.replace_all(code, "").into_owned();
    loop {
        let next = p.template.replace_all(&text, "");
        if next == text {
            break;
        }
        text = next.into_owned();
    }
    let text = p.wikilink.replace_all(&text, "$1");
    let text = p.external_labelled.replace_all(&text, "$1");
    let text = p.external_bare.replace_all(&text, "");
    let text = p.quotes.replace_all(&text, "");
    let text = p.tag.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);
    p.whitespace.replace_all(&text, " ").trim().to_string()
}
