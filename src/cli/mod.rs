//! Command-line interface.
//!
//! Every command runs against one [`AppState`] and produces a [`CliResult`];
//! `main` prints the message and exits with the code.

mod input;
mod render;

pub use input::{parse_answer_spec, parse_date, parse_positions, AnswerSpec, Prompt};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

use crate::api::{QuestionData, TestFilters};
use crate::auth::{Credentials, Registration};
use crate::authoring::{QuestionDraft, TestMetadata};
use crate::engine::{AnswerMode, Test, TestEngine};
use crate::error::{ApiError, AppError, AppResult, EngineError, ValidationError};
use crate::state::AppState;

/// Client for the quiz platform
#[derive(Parser, Debug)]
#[command(name = "quiz-client", version)]
#[command(about = "Take, browse and author multiple-choice tests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Refresh the stored session and report whether it is usable
    Status,

    /// Public tests shown on the home page
    Home {
        #[arg(default_value = "1")]
        page: u32,
    },

    /// Search public tests
    Tests {
        /// Test title contains
        #[arg(long)]
        name: Option<String>,
        /// Author name contains
        #[arg(long)]
        author: Option<String>,
        /// Created on or after (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<DateTime<Utc>>,
        /// Created on or before (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<DateTime<Utc>>,
        /// Only strict (true) or loose (false) tests
        #[arg(long)]
        strict: Option<bool>,
        #[arg(long, default_value = "1")]
        page: u32,
    },

    /// Number of public tests
    Count,

    /// Show a test's questions
    Show { id: String },

    /// Take a test and submit the result
    Take {
        id: String,
        /// QUESTION:ANSWER[,ANSWER...] with 1-based numbers; repeatable.
        /// Answers are prompted for when omitted.
        #[arg(long = "answer", value_parser = parse_answer_spec)]
        answers: Vec<AnswerSpec>,
    },

    /// Logged-in user's profile
    Profile,

    /// Results of tests you took
    Results,

    /// Results others got on your tests
    TestsResults,

    /// Tests you authored
    MyTests,

    /// Author a test from a JSON file and publish it
    Create { file: PathBuf },

    /// Inspect or publish the saved authoring draft
    #[command(subcommand)]
    Draft(DraftCommand),
}

/// Authoring draft subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum DraftCommand {
    /// Show the saved draft
    Show,
    /// Publish the saved draft
    Publish,
    /// Delete the saved draft
    Discard,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Test file accepted by `create`: metadata plus the questions
#[derive(Debug, Deserialize)]
struct AuthoringFile {
    #[serde(flatten)]
    metadata: TestMetadata,
    #[serde(default)]
    questions: Vec<QuestionData>,
}

/// Execute a CLI command.
pub async fn execute_command(command: Command, state: &AppState) -> CliResult {
    debug!(command = command_name(&command), "Executing command");
    match run(command, state).await {
        Ok(message) => CliResult::success(message),
        Err(e) => CliResult::error(describe(&e)),
    }
}

async fn run(command: Command, state: &AppState) -> AppResult<String> {
    match command {
        Command::Login { email, password } => execute_login(state, email, password).await,
        Command::Register {
            name,
            email,
            password,
        } => execute_register(state, name, email, password).await,
        Command::Logout => {
            state.session.logout().await?;
            Ok("Logged out".to_string())
        }
        Command::Status => Ok(if state.session.check_and_refresh().await {
            "Logged in".to_string()
        } else {
            "Not logged in".to_string()
        }),
        Command::Home { page } => {
            let tests = state.api.home_tests(page).await?;
            Ok(render::test_list(&format!("Home (page {})", page), &tests))
        }
        Command::Tests {
            name,
            author,
            from,
            to,
            strict,
            page,
        } => {
            let filters = TestFilters {
                test_name: name,
                author_name: author,
                created_from: from,
                created_to: to,
                is_strict: strict,
            };
            let tests = state.api.all_tests(&filters, page).await?;
            Ok(render::test_list(&format!("Tests (page {})", page), &tests))
        }
        Command::Count => {
            let count = state.api.count_public_tests().await?;
            Ok(format!("{} public tests", count))
        }
        Command::Show { id } => {
            let mut engine = state.engine();
            let test = engine.load(&id).await?;
            Ok(render::test_detail(test))
        }
        Command::Take { id, answers } => execute_take(state, &id, answers).await,
        Command::Profile => {
            let profile = state.api.my_profile().await?;
            Ok(render::profile(&profile))
        }
        Command::Results => {
            let results = state.api.my_results().await?;
            Ok(render::result_list("My results", &results))
        }
        Command::TestsResults => {
            let results = state.api.my_tests_results().await?;
            Ok(render::result_list("Results on my tests", &results))
        }
        Command::MyTests => {
            let tests = state.api.my_tests().await?;
            Ok(render::test_list("My tests", &tests))
        }
        Command::Create { file } => execute_create(state, file).await,
        Command::Draft(command) => execute_draft(state, command).await,
    }
}

async fn execute_login(
    state: &AppState,
    email: String,
    password: Option<String>,
) -> AppResult<String> {
    let password = match password {
        Some(p) => p,
        None => read_password().await?,
    };
    let credentials = Credentials::new(email, password);
    credentials.validate()?;

    state.session.login(&credentials).await?;
    Ok(format!("Logged in as {}", credentials.email))
}

async fn execute_register(
    state: &AppState,
    name: String,
    email: String,
    password: Option<String>,
) -> AppResult<String> {
    let password = match password {
        Some(p) => p,
        None => read_password().await?,
    };
    let registration = Registration::new(name, email, password);
    registration.validate()?;

    state.session.register(&registration).await?;
    Ok(format!("Registered {}", registration.email))
}

async fn read_password() -> AppResult<String> {
    Prompt::stdin()
        .ask("Password: ")
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Failed to read password: {}", e),
        })?
        .ok_or_else(|| ValidationError::new("password", "cannot be empty").into())
}

async fn execute_take(state: &AppState, id: &str, answers: Vec<AnswerSpec>) -> AppResult<String> {
    let mut engine = state.engine();
    let test = engine.load(id).await?.clone();
    engine.start()?;

    if answers.is_empty() {
        answer_interactively(&mut engine, &test).await?;
    } else {
        for spec in &answers {
            apply_answer(&mut engine, &test, spec)?;
        }
    }

    if !engine.can_submit() {
        let rule = match test.mode() {
            AnswerMode::Strict => "every question must be answered",
            AnswerMode::Loose => "answer at least one question",
        };
        return Err(AppError::Validation(ValidationError::new("answers", rule)));
    }

    let card = engine.submit().await?.clone();
    Ok(render::score_card(&test, &card))
}

fn apply_answer(engine: &mut TestEngine, test: &Test, spec: &AnswerSpec) -> AppResult<()> {
    let question = test.questions.get(spec.question).ok_or_else(|| {
        ValidationError::new(
            "answer",
            format!("test has no question {}", spec.question + 1),
        )
    })?;
    for &index in &spec.answers {
        let answer = question.answers.get(index).ok_or_else(|| {
            ValidationError::new(
                "answer",
                format!("question {} has no answer {}", spec.question + 1, index + 1),
            )
        })?;
        if !engine.selection().is_selected(&question.id, &answer.id) {
            engine.select(&question.id, &answer.id);
        }
    }
    Ok(())
}

async fn answer_interactively(engine: &mut TestEngine, test: &Test) -> AppResult<()> {
    let mut prompt = Prompt::stdin();
    prompt.say(&render::test_detail(test));
    if test.mode() == AnswerMode::Loose {
        prompt.say("Leave a question blank to skip it.");
    }

    for (qi, question) in test.questions.iter().enumerate() {
        loop {
            let label = format!("Answers for {} (e.g. 1,3): ", qi + 1);
            let line = prompt.ask(&label).await.map_err(|e| AppError::Internal {
                message: format!("Failed to read answers: {}", e),
            })?;
            let Some(line) = line else {
                return Ok(());
            };
            match input::parse_positions(&line) {
                Ok(answers) => {
                    let spec = AnswerSpec {
                        question: qi,
                        answers,
                    };
                    match apply_answer(engine, test, &spec) {
                        Ok(()) => break,
                        Err(e) => prompt.say(&describe(&e)),
                    }
                }
                Err(e) => prompt.say(&e),
            }
        }
    }
    Ok(())
}

async fn execute_create(state: &AppState, file: PathBuf) -> AppResult<String> {
    let raw = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Failed to read {}: {}", file.display(), e),
        })?;
    let authored: AuthoringFile = serde_json::from_str(&raw).map_err(|e| AppError::Internal {
        message: format!("Invalid test file {}: {}", file.display(), e),
    })?;

    // Validate everything up front so a bad file leaves no draft behind
    authored.metadata.validate()?;
    if authored.questions.is_empty() {
        return Err(
            ValidationError::new("questions", "a test needs at least one question").into(),
        );
    }
    let questions: Vec<QuestionDraft> = authored
        .questions
        .iter()
        .map(QuestionDraft::from_data)
        .collect();
    for (qi, question) in questions.iter().enumerate() {
        if let Err(e) = question.validate() {
            return Err(ValidationError::new(format!("questions[{}]", qi + 1), e.reason).into());
        }
    }

    let flow = state.authoring();
    let mut draft = flow.begin(authored.metadata).await?;
    for question in questions {
        flow.add_question(&mut draft, question).await?;
    }
    flow.finish(&draft).await?;

    Ok(format!(
        "Published '{}' with {} questions",
        draft.metadata.title,
        draft.questions.len()
    ))
}

async fn execute_draft(state: &AppState, command: DraftCommand) -> AppResult<String> {
    let flow = state.authoring();
    match command {
        DraftCommand::Show => Ok(match flow.resume().await? {
            Some(draft) => render::draft(&draft),
            None => "No saved draft".to_string(),
        }),
        DraftCommand::Publish => {
            let Some(draft) = flow.resume().await? else {
                return Ok("No saved draft".to_string());
            };
            flow.finish(&draft).await?;
            Ok(format!("Published '{}'", draft.metadata.title))
        }
        DraftCommand::Discard => {
            flow.discard().await?;
            Ok("Draft discarded".to_string())
        }
    }
}

/// User-facing text for an error. Session and credential failures get the
/// status-derived message instead of the technical one.
pub fn describe(err: &AppError) -> String {
    match err {
        AppError::Auth(e)
        | AppError::Api(ApiError::Auth(e))
        | AppError::Engine(EngineError::Session(e)) => e.user_message().to_string(),
        other => other.to_string(),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Login { .. } => "login",
        Command::Register { .. } => "register",
        Command::Logout => "logout",
        Command::Status => "status",
        Command::Home { .. } => "home",
        Command::Tests { .. } => "tests",
        Command::Count => "count",
        Command::Show { .. } => "show",
        Command::Take { .. } => "take",
        Command::Profile => "profile",
        Command::Results => "results",
        Command::TestsResults => "tests-results",
        Command::MyTests => "my-tests",
        Command::Create { .. } => "create",
        Command::Draft(_) => "draft",
    }
}
