use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dfmea_core::{CSV_FILE_NAME, CascadeLevel, Feedback, Page, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid output format '{other}', expected one of: table, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeChoice {
    Set(Theme),
    Toggle,
}

impl std::str::FromStr for ThemeChoice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "toggle" => Ok(Self::Toggle),
            other => other
                .parse::<Theme>()
                .map(Self::Set)
                .map_err(|_| {
                    format!("invalid theme '{other}', expected one of: light, dark, toggle")
                }),
        }
    }
}

/// `--feedback 3=down`: row index and thumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackArg {
    pub index: usize,
    pub kind: Feedback,
}

impl std::str::FromStr for FeedbackArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (index, kind) = value
            .split_once('=')
            .ok_or_else(|| format!("invalid feedback '{value}', expected <row>=up|down"))?;
        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|err| format!("invalid feedback row '{index}': {err}"))?;
        Ok(Self {
            index,
            kind: kind.parse()?,
        })
    }
}

/// `--set generation.row_count=12`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigAssignment {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for ConfigAssignment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (key, raw) = value
            .split_once('=')
            .ok_or_else(|| {
                format!("invalid assignment '{value}', expected <section.key>=<value>")
            })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("invalid assignment '{value}': empty key"));
        }
        Ok(Self {
            key: key.to_owned(),
            value: raw.trim().to_owned(),
        })
    }
}

/// Cascade values shared by `options` and `generate`. Repeat a flag to select
/// several values on the viewer page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct SelectionArgs {
    #[arg(long, help = "Program value (repeatable on the viewer page)")]
    pub program: Vec<String>,

    #[arg(
        long,
        alias = "product-category",
        help = "Product category value (repeatable on the viewer page)"
    )]
    pub category: Vec<String>,

    #[arg(long, help = "Subsystem value (repeatable on the viewer page)")]
    pub subsystem: Vec<String>,

    #[arg(long, help = "Product value (repeatable on the viewer page)")]
    pub product: Vec<String>,
}

impl SelectionArgs {
    /// Levels in cascade order, skipping the ones not given.
    pub fn levels(&self) -> Vec<(CascadeLevel, Vec<String>)> {
        CascadeLevel::ALL
            .into_iter()
            .map(|level| (level, self.values(level).to_vec()))
            .filter(|(_, values)| !values.is_empty())
            .collect()
    }

    pub fn values(&self, level: CascadeLevel) -> &[String] {
        match level {
            CascadeLevel::Program => &self.program,
            CascadeLevel::ProductCategory => &self.category,
            CascadeLevel::Subsystem => &self.subsystem,
            CascadeLevel::Product => &self.product,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct LoginArgs {
    #[arg(long, help = "Account email")]
    pub email: String,

    #[arg(long, help = "Account password")]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct WhoamiArgs {
    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ThemeArgs {
    #[arg(
        value_parser = parse_theme_choice,
        help = "light, dark or toggle; prints the current theme when omitted"
    )]
    pub theme: Option<ThemeChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct OptionsArgs {
    #[arg(
        value_parser = parse_cascade_level,
        help = "Level to list: program, product_category, subsystem or product"
    )]
    pub level: CascadeLevel,

    #[command(flatten)]
    pub selection: SelectionArgs,

    #[arg(
        long,
        value_parser = parse_page,
        help = "Page to act on (defaults to the signed-in user's home page)"
    )]
    pub page: Option<Page>,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[arg(
        long,
        value_parser = parse_page,
        help = "Page to act on (defaults to the signed-in user's home page)"
    )]
    pub page: Option<Page>,

    #[arg(long, help = "Seed for the mock generator")]
    pub seed: Option<u64>,

    #[arg(long, help = "Custom prompt sent with the generation request")]
    pub prompt: Option<String>,

    #[arg(long, help = "Viewer \"Generated by\" filter")]
    pub generated_by: Option<String>,

    #[arg(long, help = "Regenerate once after the first generation")]
    pub regenerate: bool,

    #[arg(
        long,
        value_parser = parse_feedback_arg,
        help = "Row feedback as <row>=up|down (repeatable, applied in order)"
    )]
    pub feedback: Vec<FeedbackArg>,

    #[arg(long, help = "Save the rows to the gateway")]
    pub save: bool,

    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = CSV_FILE_NAME,
        help = "Write the rows as CSV (defaults to dfmea_export.csv)"
    )]
    pub export: Option<PathBuf>,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct UploadArgs {
    #[arg(long, help = "Programme text field")]
    pub programme: Option<String>,

    #[arg(long, help = "Product category text field")]
    pub product_category: Option<String>,

    #[arg(long, help = "Subsystem text field")]
    pub subsystem: Option<String>,

    #[arg(long, help = "Product text field")]
    pub product: Option<String>,

    #[arg(long, help = "Product requirement documents")]
    pub prd: Vec<PathBuf>,

    #[arg(long, help = "Knowledge base files")]
    pub kb: Vec<PathBuf>,

    #[arg(long = "field", help = "Field repair data files")]
    pub field_repair: Vec<PathBuf>,

    #[arg(long, help = "Add a new programme name after confirmation")]
    pub add_programme: Option<String>,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct FilesArgs {
    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct InitArgs {
    #[arg(
        long = "set",
        value_parser = parse_config_assignment,
        help = "Config value as <section.key>=<value> (repeatable)"
    )]
    pub assignments: Vec<ConfigAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Sign in with one of the configured accounts
    Login(LoginArgs),
    /// Sign out and clear the stored token
    Logout,
    /// Show the signed-in user and their home page
    Whoami(WhoamiArgs),
    /// Show or change the colour theme
    Theme(ThemeArgs),
    /// List the options of one cascade level
    Options(OptionsArgs),
    /// Generate DFMEA rows for a selection, then annotate, save or export them
    Generate(GenerateArgs),
    /// Upload PRD, knowledge base and field repair files (admin)
    Upload(UploadArgs),
    /// List indexed files (admin)
    Files(FilesArgs),
    /// Create .dfmea/config.toml and optionally set keys
    Init(InitArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Role-gated DFMEA workbench")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .dfmea/"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_theme_choice(value: &str) -> Result<ThemeChoice, String> {
    value.parse()
}

fn parse_cascade_level(value: &str) -> Result<CascadeLevel, String> {
    value.parse()
}

fn parse_feedback_arg(value: &str) -> Result<FeedbackArg, String> {
    value.parse()
}

fn parse_config_assignment(value: &str) -> Result<ConfigAssignment, String> {
    value.parse()
}

fn parse_page(value: &str) -> Result<Page, String> {
    match value.trim() {
        "viewer" => Ok(Page::Viewer),
        "engineer" => Ok(Page::Engineer),
        "admin" => Ok(Page::Admin),
        other => Err(format!(
            "invalid page '{other}', expected one of: viewer, engineer, admin"
        )),
    }
}
