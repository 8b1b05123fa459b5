use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use talkpage_config::{Config, SiteConfig};
use talkpage_engine::{
    Action, Comment, CommentAction, EditOutcome, Message, Section, SectionAction, SiteContext,
    SourceMatch, locate_comment, locate_section, submit_with_retry,
};
use wiki::FileWiki;

use cli::{Cli, CommentOpts, Commands, SectionOpts, SignOpts};

mod cli;
mod wiki;

/// Everything a command needs besides its arguments.
struct Session {
    ctx: SiteContext,
    pages: PathBuf,
}

impl Session {
    fn open(pages: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load_from_path(path)?
                .ok_or_else(|| anyhow!("config file {} does not exist", path.display()))?,
            None => Config::load()?.unwrap_or_default(),
        };
        let pages = pages
            .or_else(|| config.pages_path.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        log::info!("pages directory: {}", pages.display());

        Ok(Self {
            ctx: site_context(&config.site)?,
            pages,
        })
    }

    fn time(&self, text: &str) -> Result<DateTime<Utc>> {
        if let Some(parsed) = self.ctx.timestamps.parse(text, None) {
            return Ok(parsed.date);
        }
        DateTime::parse_from_rfc3339(text)
            .map(|date| date.with_timezone(&Utc))
            .with_context(|| format!("'{text}' is not a timestamp"))
    }

    fn comment(&self, author: &str, time: &str, at: &CommentOpts) -> Result<Comment> {
        Ok(Comment::new(author, self.time(time)?, at.indent.as_str()))
    }

    fn section(&self, headline: &str, at: SectionOpts) -> Section {
        Section::new(headline, at.level, at.index)
    }

    fn message(&self, body: &str, sign: SignOpts) -> Message {
        if sign.unsigned {
            Message::unsigned(body, Some(Utc::now()))
        } else {
            Message::signed(body)
        }
    }

    fn page_code(&self, title: &str) -> Result<String> {
        let path = FileWiki::new(&self.pages).page_path(title);
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    fn submit(&self, title: &str, action: Action, summary: &str) -> Result<EditOutcome> {
        let mut wiki = FileWiki::new(&self.pages);
        Ok(submit_with_retry(&mut wiki, title, &action, summary, &self.ctx)?)
    }
}

/// Writes the built-in English site settings so they can be edited.
fn init_config(path: &Path, out: &mut impl Write) -> Result<bool> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    Config::default().save_to_path(path)?;
    writeln!(out, "wrote {}", path.display())?;
    Ok(true)
}

fn site_context(site: &SiteConfig) -> Result<SiteContext> {
    SiteContext::new(site).context("invalid site configuration")
}

fn print_match(out: &mut impl Write, m: &SourceMatch) -> Result<()> {
    writeln!(out, "range: {}..{}", m.start, m.end)?;
    writeln!(out, "score: {} {:?}", m.score, m.matched)?;
    writeln!(out, "indentation: {:?}", m.indentation_chars)?;
    writeln!(out, "reply indentation: {:?}", m.reply_indentation_chars)?;
    writeln!(out, "---")?;
    writeln!(out, "{}", m.code)?;
    Ok(())
}

/// Runs one command. Returns whether an edit was saved or a lookup succeeded.
fn run(session: &Session, command: Commands, out: &mut impl Write) -> Result<bool> {
    let (title, action, summary) = match command {
        Commands::LocateSection {
            title,
            headline,
            at,
        } => {
            let code = session.page_code(&title)?;
            let target = session.section(&headline, at);
            print_match(out, &locate_section(&code, &target, &session.ctx)?)?;
            return Ok(true);
        }
        Commands::LocateComment {
            title,
            author,
            time,
            at,
        } => {
            let code = session.page_code(&title)?;
            let target = session.comment(&author, &time, &at)?;
            print_match(out, &locate_comment(&code, &target, &session.ctx)?)?;
            return Ok(true);
        }
        Commands::ParseTime { text } => {
            let date = session
                .ctx
                .timestamps
                .parse(&text, None)
                .ok_or_else(|| anyhow!("'{text}' is not a timestamp"))?
                .date;
            writeln!(out, "{}", date.to_rfc3339())?;
            return Ok(true);
        }
        Commands::FormatTime { time, style } => {
            let date = session.time(&time)?;
            let text = session
                .ctx
                .timestamps
                .format(date, style.into(), true, Utc::now());
            writeln!(out, "{text}")?;
            return Ok(true);
        }
        Commands::InitConfig => bail!("init-config does not use the pages directory"),
        Commands::Reply {
            title,
            author,
            time,
            message,
            at,
            sign,
        } => (
            title,
            Action::Comment {
                target: session.comment(&author, &time, &at)?,
                action: CommentAction::Reply(session.message(&message, sign)),
            },
            format!("Reply to {author}"),
        ),
        Commands::ReplySection {
            title,
            headline,
            message,
            at,
            sign,
        } => (
            title,
            Action::Section {
                target: session.section(&headline, at),
                action: SectionAction::Reply(session.message(&message, sign)),
            },
            format!("/* {headline} */ Reply"),
        ),
        Commands::AddSection {
            title,
            headline,
            message,
            sign,
        } => (
            title,
            Action::AddSection {
                headline: headline.clone(),
                message: session.message(&message, sign),
            },
            format!("/* {headline} */ new section"),
        ),
        Commands::AddSubsection {
            title,
            parent,
            headline,
            message,
            at,
            sign,
        } => (
            title,
            Action::Section {
                target: session.section(&parent, at),
                action: SectionAction::AddSubsection {
                    headline: headline.clone(),
                    message: session.message(&message, sign),
                },
            },
            format!("/* {headline} */ new subsection"),
        ),
        Commands::EditComment {
            title,
            author,
            time,
            body,
            at,
        } => (
            title,
            Action::Comment {
                target: session.comment(&author, &time, &at)?,
                action: CommentAction::Edit { body },
            },
            "Edit comment".to_string(),
        ),
        Commands::EditHeading {
            title,
            headline,
            new_headline,
            at,
        } => (
            title,
            Action::Section {
                target: session.section(&headline, at),
                action: SectionAction::EditHeading {
                    headline: new_headline.clone(),
                },
            },
            format!("Rename section to {new_headline}"),
        ),
        Commands::DeleteComment {
            title,
            author,
            time,
            at,
        } => (
            title,
            Action::Comment {
                target: session.comment(&author, &time, &at)?,
                action: CommentAction::Delete,
            },
            format!("Remove comment by {author}"),
        ),
        Commands::DeleteSection {
            title,
            headline,
            at,
        } => (
            title,
            Action::Section {
                target: session.section(&headline, at),
                action: SectionAction::Delete,
            },
            format!("Remove section {headline}"),
        ),
    };

    match session.submit(&title, action, &summary)? {
        EditOutcome::Success { revision_id } => {
            writeln!(out, "saved {title} ({revision_id:016x})")?;
            Ok(true)
        }
        EditOutcome::EditConflict => {
            writeln!(out, "edit conflict on {title}, giving up")?;
            Ok(false)
        }
        EditOutcome::SpamBlacklist { matches } => {
            writeln!(out, "rejected by spam blacklist: {}", matches.join(", "))?;
            Ok(false)
        }
        EditOutcome::Unknown { code, info } => {
            writeln!(out, "edit failed: {code}: {info}")?;
            Ok(false)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout();

    let result = match cli.command {
        Commands::InitConfig => {
            let path = cli.config.unwrap_or_else(Config::config_path);
            init_config(&path, &mut stdout)
        }
        command => {
            let session = match Session::open(cli.pages, cli.config.as_deref()) {
                Ok(session) => session,
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    eprintln!("Config file location: {}", Config::config_path().display());
                    process::exit(1);
                }
            };
            run(&session, command, &mut stdout)
        }
    };

    match result {
        Ok(true) => Ok(()),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}
