use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use talkpage_config::IndentationMode;
use talkpage_engine::assemble::{self, Action, CommentAction, Message, SectionAction};
use talkpage_engine::{
    Comment, EngineError, MaskOptions, MatchDetail, Section, SiteContext, Timezone, locate_comment,
    locate_section, normalize, reply_indentation,
};

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!(
        "{}/tests/fixtures/{name}.wiki",
        env!("CARGO_MANIFEST_DIR")
    ))
    .unwrap()
}

fn at(day: u32, hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

fn reply_point(detail: &MatchDetail) -> usize {
    match detail {
        MatchDetail::Comment { reply_point, .. } => *reply_point,
        MatchDetail::Section { .. } => panic!("expected a comment match"),
    }
}

// ============ Worked scenarios ============

#[test]
fn section_in_minimal_page() {
    // Given a page with one section and an unexpanded signature
    let code = "== Topic ==\n:Hello ~~~~\n";

    // When locating it
    let m = locate_section(code, &Section::new("Topic", 2, 0), &SiteContext::english()).unwrap();

    // Then it starts at the top and its first chunk runs to the end
    assert_eq!(m.heading_start, Some(0));
    match m.detail {
        MatchDetail::Section { first_chunk_end, .. } => assert_eq!(first_chunk_end, code.len()),
        MatchDetail::Comment { .. } => panic!("expected a section match"),
    }
}

#[test]
fn reply_adopts_existing_deeper_thread() {
    // Given a comment at ':' already answered at '::*', which no indentation
    // mode would derive from ':'
    let code = "== T ==\n:Point -- Alice 10:00, 1 January 2024 (UTC)\n::*Reply [[User:Bob|Bob]] 11:00, 1 January 2024 (UTC)\n";
    let mut target = Comment::new("Alice", at(1, 10), ":");
    target.signature = "-- Alice 10:00, 1 January 2024 (UTC)".into();

    // When locating the comment
    let m = locate_comment(code, &target, &SiteContext::english()).unwrap();

    // Then new replies join the existing thread
    assert_eq!(m.reply_indentation_chars, "::*");
    assert_eq!(m.indentation_chars, ":");
    for mode in [IndentationMode::Mimic, IndentationMode::Unify] {
        assert_ne!(reply_indentation(":", mode, ':'), m.reply_indentation_chars);
    }

    // And the reply lands below the thread with that prefix
    let action = Action::Comment {
        target,
        action: CommentAction::Reply(Message::signed("Noted")),
    };
    let out = assemble::assemble(code, &action, &SiteContext::english()).unwrap();
    assert!(out.ends_with("(UTC)\n::* Noted ~~~~\n"));
}

#[test]
fn unify_flattens_lists_in_reply() {
    let ctx = SiteContext::english();
    let prefix = reply_indentation(":", IndentationMode::Unify, ':');

    let body = normalize("* item1\n* item2", &prefix, IndentationMode::Unify, &ctx).unwrap();
    assert_eq!(body, ":: item1\n:: item2");

    let err = normalize("* item1\n* item2", "#", IndentationMode::Unify, &ctx).unwrap_err();
    assert_eq!(err.error_type(), "parse");
    assert_eq!(err.code(), "cantParse");
}

#[test]
fn utc_timestamp_parses_exactly() {
    let ctx = SiteContext::english();
    let parsed = ctx
        .timestamps
        .parse("23:29, 10 May 2019 (UTC)", Timezone::parse("UTC"))
        .unwrap();
    assert_eq!(parsed.date, Utc.with_ymd_and_hms(2019, 5, 10, 23, 29, 0).unwrap());
}

// ============ Realistic page ============

#[test]
fn masking_round_trips_fixture() {
    let code = fixture("infobox_thread");
    let ctx = SiteContext::english();
    let masked = ctx.masker.mask(&code, MaskOptions::page());

    assert!(!masked.text().contains("{{"));
    assert!(!masked.text().contains("not a heading"));
    assert_eq!(masked.unmask(), code);
}

#[test]
fn duplicate_headline_resolved_by_index() {
    let code = fixture("infobox_thread");
    let ctx = SiteContext::english();

    let first = locate_section(&code, &Section::new("Infobox image", 2, 0), &ctx).unwrap();
    let second = locate_section(&code, &Section::new("Infobox image", 2, 2), &ctx).unwrap();

    assert_eq!(first.start, code.find("== Infobox image ==").unwrap());
    assert_eq!(second.start, code.rfind("== Infobox image ==").unwrap());
    assert_eq!(first.end, second.start);
}

#[test]
fn oldest_comment_reaches_maximum_score() {
    let code = fixture("infobox_thread");
    let target = Section::new("Infobox image", 2, 0).with_oldest_comment("202401010900_Ann".into());

    let m = locate_section(&code, &target, &SiteContext::english()).unwrap();
    assert_eq!(m.score, talkpage_engine::locate::MAX_SCORE);
}

#[test]
fn comment_with_verbatim_block_is_located() {
    let code = fixture("infobox_thread");
    let m = locate_comment(&code, &Comment::new("Alice", at(1, 10), ":"), &SiteContext::english())
        .unwrap();

    assert!(m.code.starts_with("I prefer the current one. <pre>"));
    assert!(m.code.ends_with("-- [[User:Alice|Alice]] 10:00, 1 January 2024 (UTC)"));
    assert_eq!(m.reply_indentation_chars, "::");
    assert!(code[reply_point(&m.detail)..].starts_with(":Support change."));
}

#[test]
fn reply_to_answered_comment() {
    let code = fixture("infobox_thread");
    let action = Action::Comment {
        target: Comment::new("Alice", at(1, 10), ":"),
        action: CommentAction::Reply(Message::signed("Thanks")),
    };

    let out = assemble::assemble(&code, &action, &SiteContext::english()).unwrap();
    assert_eq!(
        out,
        code.replace(":Support change.", ":: Thanks ~~~~\n:Support change.")
    );
}

#[test]
fn reply_to_unsigned_template_comment() {
    let code = fixture("infobox_thread");
    let action = Action::Comment {
        target: Comment::new("Carol", at(1, 12), ":"),
        action: CommentAction::Reply(Message::signed("Which one?")),
    };

    let out = assemble::assemble(&code, &action, &SiteContext::english()).unwrap();
    assert_eq!(
        out,
        code.replace("(UTC)}}\n", "(UTC)}}\n:: Which one? ~~~~\n")
    );
}

#[test]
fn subsection_lands_after_existing_subsections() {
    let code = fixture("infobox_thread");
    let action = Action::Section {
        target: Section::new("Infobox image", 2, 0),
        action: SectionAction::AddSubsection {
            headline: "Poll".into(),
            message: Message::signed("Vote below."),
        },
    };

    let out = assemble::assemble(&code, &action, &SiteContext::english()).unwrap();
    assert_eq!(
        out,
        code.replace(
            "13:00, 1 January 2024 (UTC)\n\n",
            "13:00, 1 January 2024 (UTC)\n\n=== Poll ===\nVote below. ~~~~\n\n"
        )
    );
}

#[test]
fn delete_with_replies_changes_nothing() {
    let code = fixture("infobox_thread");
    let action = Action::Comment {
        target: Comment::new("Alice", at(1, 10), ":"),
        action: CommentAction::Delete,
    };

    let result = assemble::assemble(&code, &action, &SiteContext::english());
    assert_eq!(result, Err(EngineError::HasReplies { target: "comment" }));
}

#[test]
fn locate_is_deterministic() {
    let code = fixture("infobox_thread");
    let ctx = SiteContext::english();
    let target = Comment::new("Bob", at(1, 11), "::");

    let runs: Vec<_> = (0..3)
        .map(|_| locate_comment(&code, &target, &ctx).unwrap())
        .collect();
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}
