use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexis::auth::{self, PERMISSION_READ, PERMISSION_WRITE, StaticTokenVerifier};
use lexis::config::ConfigError;
use lexis::generator::PromptGenerator;
use lexis::ollama::OllamaClientBuilder;
use lexis::utils::ensure_database_directory;
use lexis::{
    AppConfig, CategoryId, Database, DifficultyLevel, HistoryFilter, LessonRequest, LessonStage,
    PageRequest, PromptId, VocabularyError, VocabularyRepository, VocabularyService,
};
use tracing::info;

/// lexis - generate and review vocabulary lessons
#[derive(Parser)]
#[command(name = "lexis")]
#[command(about = "Generate multiple-choice vocabulary lessons and browse past ones")]
#[command(version)]
struct Cli {
    /// Access token (falls back to LEXIS_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Generate a lesson, streaming it to stdout, and store it
    Generate(GenerateCommand),
    /// Show stored lessons for a category and learning language
    History(HistoryCommand),
    /// List your categories
    Categories(PageArgs),
    /// Hide a stored lesson from history
    Invalidate(InvalidateCommand),
    /// List languages used by stored lessons
    Languages(PageArgs),
    /// List difficulty levels used by stored lessons, newest first
    Levels(PageArgs),
}

#[derive(Parser)]
struct GenerateCommand {
    /// Lesson topic, e.g. "football"
    #[arg(short, long)]
    category: String,

    /// Language being learned
    #[arg(short, long, value_name = "LANGUAGE")]
    learning: String,

    /// Language translations are given in
    #[arg(short, long, value_name = "LANGUAGE")]
    translated: String,

    /// Number of questions
    #[arg(short = 'q', long, default_value_t = lexis::models::DEFAULT_NUM_QUESTIONS)]
    questions: u32,

    /// Options per question
    #[arg(short = 'a', long, default_value_t = lexis::models::DEFAULT_NUM_ANSWERS)]
    answers: u32,

    /// Difficulty level name, or 1-3
    #[arg(long, default_value = "EASY")]
    level: String,
}

#[derive(Parser)]
struct HistoryCommand {
    /// Category id printed by `generate`
    #[arg(long)]
    category_id: i64,

    /// Learning language to filter on
    #[arg(short, long, value_name = "LANGUAGE")]
    learning: String,

    #[command(flatten)]
    page: PageArgs,
}

#[derive(Parser)]
struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Items per page
    #[arg(long, default_value_t = 10)]
    size: u32,
}

#[derive(Parser)]
struct InvalidateCommand {
    /// Prompt id from `history`
    #[arg(value_name = "PROMPT_ID")]
    prompt_id: i64,
}

fn main() {
    lexis::telemetry::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        if let Some(err) = e.downcast_ref::<VocabularyError>()
            && let Ok(payload) = serde_json::to_string(&err.payload())
        {
            println!("{payload}");
        }
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// 1 for caller mistakes, 2 for everything else.
fn exit_code(error: &anyhow::Error) -> i32 {
    if is_user_error(error) { 1 } else { 2 }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad input, bad credentials and bad configuration. Storage,
/// backend and parse failures are internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    if let Some(err) = error.downcast_ref::<VocabularyError>() {
        return err.is_user_error();
    }
    error.downcast_ref::<ConfigError>().is_some()
}

fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::from_env()?;
    let token = resolve_token(cli.token.as_deref())?;
    let verifier = StaticTokenVerifier::parse(&config.tokens).map_err(VocabularyError::from)?;

    let permission = match cli.command {
        Commands::Generate(_) | Commands::Invalidate(_) => PERMISSION_WRITE,
        Commands::History(_)
        | Commands::Categories(_)
        | Commands::Languages(_)
        | Commands::Levels(_) => PERMISSION_READ,
    };
    let identity =
        auth::authorize(&verifier, &token, permission).map_err(VocabularyError::from)?;

    let service = build_service(&config)?;
    info!(user = %identity.user_id, "Authorized");

    match &cli.command {
        Commands::Generate(cmd) => handle_generate(&service, &identity.user_id, cmd),
        Commands::History(cmd) => handle_history(&service, &identity.user_id, cmd),
        Commands::Categories(args) => handle_categories(&service, &identity.user_id, args),
        Commands::Invalidate(cmd) => handle_invalidate(&service, &identity.user_id, cmd),
        Commands::Languages(args) => handle_languages(&service, args),
        Commands::Levels(args) => handle_levels(&service, args),
    }
}

fn resolve_token(flag: Option<&str>) -> Result<String> {
    flag.map(String::from)
        .or_else(|| std::env::var("LEXIS_TOKEN").ok())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| VocabularyError::from(auth::AuthError::InvalidToken).into())
}

/// Wires the backend client, database and service from configuration.
fn build_service(config: &AppConfig) -> Result<VocabularyService> {
    let client = OllamaClientBuilder::new()
        .base_url(&config.ollama_host)
        .model(&config.ollama_model)
        .timeout(config.generation_timeout)
        .build()
        .context("Failed to create backend client")?;

    ensure_database_directory(&config.database_path)?;
    let db = Database::open(&config.database_path).context("Failed to open database")?;

    Ok(VocabularyService::new(
        PromptGenerator::new(Arc::new(client), &config.ollama_model),
        VocabularyRepository::new(db),
        &config.supported_languages,
    ))
}

fn lesson_request(cmd: &GenerateCommand) -> Result<LessonRequest, VocabularyError> {
    Ok(
        LessonRequest::new(&cmd.category, &cmd.learning, &cmd.translated)
            .num_questions(cmd.questions)
            .num_answers(cmd.answers)
            .level(DifficultyLevel::parse(&cmd.level)?),
    )
}

/// Streams lesson text to stdout as it arrives, then the marker line.
fn handle_generate(
    service: &VocabularyService,
    user_id: &str,
    cmd: &GenerateCommand,
) -> Result<()> {
    let request = lesson_request(cmd)?;
    let mut stream = service.generate_lesson(user_id, &request)?;
    let mut stdout = std::io::stdout().lock();

    while let Some(item) = stream.next() {
        match item {
            Ok(chunk) if stream.stage() == LessonStage::Done => {
                writeln!(stdout)?;
                writeln!(stdout, "{chunk}")?;
            }
            Ok(chunk) => {
                write!(stdout, "{chunk}")?;
                stdout.flush()?;
            }
            Err(err) => {
                writeln!(stdout)?;
                return Err(err.into());
            }
        }
    }
    Ok(())
}

fn handle_history(service: &VocabularyService, user_id: &str, cmd: &HistoryCommand) -> Result<()> {
    let filter = HistoryFilter {
        category_id: CategoryId::new(cmd.category_id),
        learning_language: cmd.learning.clone(),
    };
    let page = PageRequest::new(cmd.page.page, cmd.page.size)?;
    let lessons = service.get_history_lessons(user_id, &filter, page)?;

    println!("{}", serde_json::to_string_pretty(&lessons)?);
    Ok(())
}

fn handle_categories(service: &VocabularyService, user_id: &str, args: &PageArgs) -> Result<()> {
    let page = PageRequest::new(args.page, args.size)?;
    let categories = service.list_categories(user_id, page)?;

    println!("{}", serde_json::to_string_pretty(&categories)?);
    Ok(())
}

fn handle_languages(service: &VocabularyService, args: &PageArgs) -> Result<()> {
    let page = PageRequest::new(args.page, args.size)?;
    let languages = service.list_languages(page)?;

    println!("{}", serde_json::to_string_pretty(&languages)?);
    Ok(())
}

fn handle_levels(service: &VocabularyService, args: &PageArgs) -> Result<()> {
    let page = PageRequest::new(args.page, args.size)?;
    let levels = service.list_difficulty_levels(page)?;

    println!("{}", serde_json::to_string_pretty(&levels)?);
    Ok(())
}

fn handle_invalidate(
    service: &VocabularyService,
    user_id: &str,
    cmd: &InvalidateCommand,
) -> Result<()> {
    let prompt_id = PromptId::new(cmd.prompt_id);
    service.invalidate_prompt(user_id, prompt_id)?;

    println!("Prompt {prompt_id} invalidated");
    Ok(())
}
