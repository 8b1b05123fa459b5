use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use talkpage_engine::FormatStyle;

#[derive(Parser, Debug)]
#[command(name = "talkpage")]
#[command(about = "Locate discussions in wiki talk page source and edit them in place")]
#[command(version, long_about = None)]
#[command(after_help = "<TIME> is a signature timestamp as written on the page, or an RFC 3339 time.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding one `.wiki` file per page
    #[arg(long, global = true)]
    pub pages: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Which of several same-named sections is meant.
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionOpts {
    /// Heading level of the section
    #[arg(long, default_value_t = 2)]
    pub level: u8,

    /// Ordinal of the heading among all headings on the page
    #[arg(long, default_value_t = 0)]
    pub index: usize,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentOpts {
    /// List markers the comment was posted with
    #[arg(long, default_value = "")]
    pub indent: String,
}

#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOpts {
    /// Add a "posted at" note instead of a signature
    #[arg(long)]
    pub unsigned: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print where a section sits in a page
    LocateSection {
        title: String,
        headline: String,
        #[command(flatten)]
        at: SectionOpts,
    },

    /// Print where a comment sits in a page
    LocateComment {
        title: String,
        author: String,
        time: String,
        #[command(flatten)]
        at: CommentOpts,
    },

    /// Reply below a comment and its existing replies
    Reply {
        title: String,
        author: String,
        time: String,
        message: String,
        #[command(flatten)]
        at: CommentOpts,
        #[command(flatten)]
        sign: SignOpts,
    },

    /// Add an unindented comment to a section
    ReplySection {
        title: String,
        headline: String,
        message: String,
        #[command(flatten)]
        at: SectionOpts,
        #[command(flatten)]
        sign: SignOpts,
    },

    /// Start a new topic
    AddSection {
        title: String,
        headline: String,
        message: String,
        #[command(flatten)]
        sign: SignOpts,
    },

    /// Add a subsection after everything in a section
    AddSubsection {
        title: String,
        parent: String,
        headline: String,
        message: String,
        #[command(flatten)]
        at: SectionOpts,
        #[command(flatten)]
        sign: SignOpts,
    },

    /// Replace a comment's text, keeping its signature
    EditComment {
        title: String,
        author: String,
        time: String,
        body: String,
        #[command(flatten)]
        at: CommentOpts,
    },

    /// Rename a section
    EditHeading {
        title: String,
        headline: String,
        new_headline: String,
        #[command(flatten)]
        at: SectionOpts,
    },

    /// Remove a comment that has no replies
    DeleteComment {
        title: String,
        author: String,
        time: String,
        #[command(flatten)]
        at: CommentOpts,
    },

    /// Remove a section holding at most one comment
    DeleteSection {
        title: String,
        headline: String,
        #[command(flatten)]
        at: SectionOpts,
    },

    /// Convert a signature timestamp to RFC 3339
    ParseTime { text: String },

    /// Render a time the way signatures on the wiki show it
    FormatTime {
        time: String,
        #[arg(long, value_enum, default_value_t = Style::Default)]
        style: Style,
    },

    /// Write a config file with the default English site settings
    InitConfig,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Style {
    Default,
    Improved,
    Relative,
}

impl From<Style> for FormatStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Default => FormatStyle::Default,
            Style::Improved => FormatStyle::Improved,
            Style::Relative => FormatStyle::Relative,
        }
    }
}
