use anyhow::Context;
use clap::{Parser, Subcommand};
use mocktest_client::{
    config::{get_config, init_config, LogFormat},
    models::candidate::Candidate,
    services::{
        api_client::TestApi, student_service::accuracy, test_builder::TestBuilder,
        test_manifest::TestManifest,
    },
    session::{
        answer_store::KeypadKey, HeadlessPlatform, PlatformEvent, SessionCommand, SessionEvent,
        SessionRuntime,
    },
    utils::time::{format_duration_minutes, format_time_spent, now},
    AppState,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mocktest", about = "Client for the mock-test platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show or set the stored candidate
    Whoami {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Live tests not yet completed by the candidate
    Live,
    /// Past attempts of the candidate
    Attempts,
    /// Print the instructions for a test
    Instructions { test_id: String },
    /// Start an attempt after agreeing to the instructions
    Start {
        test_id: String,
        #[arg(long)]
        agree: bool,
    },
    /// Take a started attempt interactively
    Take { attempt_id: String },
    /// Analyse a submitted attempt
    Analyse {
        attempt_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Creator view of all tests
    Tests,
    /// Pending resume requests
    ResumeRequests {
        #[arg(long)]
        test: Option<String>,
    },
    AllowResume { attempt_id: String },
    ToggleLive {
        test_id: String,
        #[arg(long, action = clap::ArgAction::Set)]
        live: bool,
    },
    DeleteTest { test_id: String },
    /// Create or update a test from a JSON manifest
    Publish {
        manifest: PathBuf,
        #[arg(long)]
        draft: bool,
        #[arg(long)]
        edit: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    let cli = Cli::parse();
    let state = AppState::new(config).await?;
    info!(api = %state.api.base_url(), "client ready");

    let result = run(cli.command, &state).await;
    state.keep_alive.force_stop();
    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<mocktest_client::error::Error>() {
            eprintln!("{}", err.user_message());
        }
    }
    result
}

async fn run(command: Command, state: &AppState) -> anyhow::Result<()> {
    match command {
        Command::Whoami { name, image } => {
            if let Some(name) = name {
                state
                    .candidates
                    .save(&Candidate {
                        candidate_name: name,
                        candidate_image: image,
                    })
                    .await?;
            }
            match state.candidates.load().await? {
                Some(c) => println!("{}", c.candidate_name),
                None => println!("No candidate stored"),
            }
        }
        Command::Live => {
            let dashboard = state.student_service.dashboard().await?;
            if dashboard.live_tests.is_empty() {
                println!("No live tests right now");
            }
            for test in dashboard.live_tests {
                println!(
                    "{}  {}  {}",
                    test.id,
                    test.name,
                    format_duration_minutes(test.duration)
                );
            }
        }
        Command::Attempts => {
            let dashboard = state.student_service.dashboard().await?;
            for attempt in dashboard.attempts {
                let name = attempt.test.as_ref().map(|t| t.name.as_str()).unwrap_or("-");
                println!(
                    "{}  {}  marks {}  accuracy {}%{}",
                    attempt.id,
                    name,
                    attempt.total_marks,
                    accuracy(&attempt),
                    if attempt.is_completed { "" } else { "  (in progress)" }
                );
            }
        }
        Command::Instructions { test_id } => {
            let test = state.student_service.instructions(&test_id).await?;
            println!("{}", test.name);
            println!("Duration: {}", format_duration_minutes(test.duration));
            println!("Questions: {}", test.question_count());
            for section in &test.sections {
                println!("  {} ({} questions)", section.name, section.questions.len());
            }
            println!("Leaving fullscreen or switching windows counts as a violation.");
        }
        Command::Start { test_id, agree } => {
            let attempt = state.student_service.start_test(&test_id, agree).await?;
            println!("Attempt {} started", attempt.id);
        }
        Command::Take { attempt_id } => take(state, &attempt_id).await?,
        Command::Analyse { attempt_id, json } => {
            let analysis = state.analytics_service.analyse(&attempt_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
                return Ok(());
            }
            let overall = &analysis.overall;
            println!("{} - {}", analysis.test_name, analysis.candidate_name);
            println!(
                "Score {}/{} ({:.2}%), accuracy {:.2}%",
                overall.total_marks, overall.max_marks, overall.percentage, overall.accuracy
            );
            println!(
                "Percentile {}, rank {}",
                analysis.rank.percentile_range, analysis.rank.rank_range
            );
            for (name, stats) in &analysis.sections {
                println!(
                    "  {}: {} correct, {} wrong, {} unattempted, {} marks, {:.2}% accuracy, {}",
                    name,
                    stats.correct,
                    stats.wrong,
                    stats.unattempted,
                    stats.marks,
                    stats.accuracy(),
                    format_time_spent(stats.total_time)
                );
            }
        }
        Command::Tests => {
            let categories = state.creator_service.overview().await?;
            for (label, tests) in [
                ("New", &categories.new),
                ("Live", &categories.live),
                ("Attempted", &categories.attempted),
            ] {
                println!("{} ({})", label, tests.len());
                for test in tests {
                    println!("  {}  {}{}", test.id, test.name, if test.is_draft { " [draft]" } else { "" });
                }
            }
        }
        Command::ResumeRequests { test } => {
            let requests = match test {
                Some(test_id) => state.creator_service.resume_requests_for(&test_id).await?,
                None => state.creator_service.resume_requests().await?,
            };
            for request in requests {
                let waiting = request
                    .requested_at
                    .map(|at| format_time_spent((now() - at).num_seconds().max(0) as u64))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {}  {}  waiting {}",
                    request.id, request.candidate_name, request.test.name, waiting
                );
            }
        }
        Command::AllowResume { attempt_id } => {
            state.creator_service.allow_resume(&attempt_id).await?;
            println!("Resume allowed for {}", attempt_id);
        }
        Command::ToggleLive { test_id, live } => {
            state.creator_service.toggle_live(&test_id, live).await?;
            println!("{} is now {}", test_id, if live { "live" } else { "offline" });
        }
        Command::DeleteTest { test_id } => {
            state.creator_service.delete_test(&test_id).await?;
            println!("Deleted {}", test_id);
        }
        Command::Publish {
            manifest,
            draft,
            edit,
        } => {
            let mut builder = TestBuilder::new();
            if let Some(test_id) = edit {
                let existing = state.api.get_test(&test_id).await?;
                builder.edit(&existing);
            }
            let base_dir = manifest.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            TestManifest::load(&manifest)
                .await
                .with_context(|| format!("reading {}", manifest.display()))?
                .apply(&mut builder, &base_dir)
                .await?;
            let saved = state.creator_service.save(&mut builder, draft).await?;
            println!("Saved {} ({})", saved.name, saved.id);
        }
    }
    Ok(())
}

/// Runs one test window on the terminal until it submits or stdin closes.
async fn take(state: &AppState, attempt_id: &str) -> anyhow::Result<()> {
    let config = get_config();
    let (command_tx, command_rx) = mpsc::channel(32);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let runtime = SessionRuntime::new(
        state.session(config, attempt_id),
        Box::new(HeadlessPlatform::new()),
        command_rx,
        event_tx,
    )
    .with_keep_alive(state.keep_alive.clone());
    let mut session = tokio::spawn(runtime.run());

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    let input = BufReader::new(tokio::io::stdin());
    let finished = relay_input(input, &command_tx, &mut session).await?;
    drop(command_tx);

    let outcome = match finished {
        Some(result) => result??,
        None => session.await??,
    };
    let _ = printer.await;
    println!("Session ended: {:?}", outcome);
    Ok(())
}

/// Forwards typed commands until `quit`, end of input, or the session ending
/// on its own. Time-up and forced submissions need no input to finish.
async fn relay_input<R, S>(
    input: R,
    command_tx: &mpsc::Sender<SessionCommand>,
    session: &mut S,
) -> std::io::Result<Option<S::Output>>
where
    R: AsyncBufRead + Unpin,
    S: Future + Unpin,
{
    let mut lines = input.lines();
    loop {
        tokio::select! {
            result = &mut *session => return Ok(Some(result)),
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(None) };
                if line.trim() == "quit" {
                    return Ok(None);
                }
                match parse_command(&line) {
                    Some(command) => {
                        if command_tx.send(command).await.is_err() {
                            return Ok(None);
                        }
                    }
                    None => warn!(input = %line.trim(), "unknown command"),
                }
            }
        }
    }
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("next", None) => SessionCommand::Next,
        ("prev", None) => SessionCommand::Previous,
        ("goto", Some(section)) => SessionCommand::Navigate {
            section: section.parse::<usize>().ok()?.checked_sub(1)?,
            question: words.next()?.parse::<usize>().ok()?.checked_sub(1)?,
        },
        ("section", Some(section)) => {
            SessionCommand::SelectSection(section.parse::<usize>().ok()?.checked_sub(1)?)
        }
        ("opt", Some(option)) => SessionCommand::SelectOption(option.to_uppercase()),
        ("int", Some(text)) => SessionCommand::IntegerInput(text.to_string()),
        ("int", None) => SessionCommand::IntegerInput(String::new()),
        ("key", Some(key)) => SessionCommand::Keypad(KeypadKey::parse(key)?),
        ("review", None) => SessionCommand::MarkForReviewAndNext,
        ("clear", None) => SessionCommand::ClearResponse,
        ("submit", None) => SessionCommand::RequestSubmit,
        ("confirm", None) => SessionCommand::ConfirmSubmit,
        ("dismiss", None) => SessionCommand::DismissWarning,
        ("blur", None) => SessionCommand::Platform(PlatformEvent::WindowBlurred),
        ("focus", None) => SessionCommand::Platform(PlatformEvent::WindowFocused),
        ("hide", None) => SessionCommand::Platform(PlatformEvent::PageHidden),
        ("show", None) => SessionCommand::Platform(PlatformEvent::PageVisible),
        ("exit-fs", None) => SessionCommand::Platform(PlatformEvent::FullscreenExited),
        ("enter-fs", None) => SessionCommand::Platform(PlatformEvent::FullscreenEntered),
        _ => return None,
    };
    Some(command)
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Loaded {
            test_name,
            questions,
            ..
        } => println!("{} - {} questions", test_name, questions),
        // Once a minute is enough on a terminal.
        SessionEvent::Tick {
            remaining_secs,
            formatted,
        } if remaining_secs % 60 == 0 => println!("Time left {}", formatted),
        SessionEvent::Tick { .. } => {}
        SessionEvent::QuestionChanged {
            number,
            question_id,
            ..
        } => println!("Question {} ({})", number, question_id),
        SessionEvent::CommandRejected { message }
        | SessionEvent::SubmitFailed { message }
        | SessionEvent::LoadFailed { message } => println!("! {}", message),
        SessionEvent::WarningShown {
            count, max, reason, ..
        } => println!("Warning {}/{}: {}. Type `dismiss` to continue.", count, max, reason),
        SessionEvent::WarningDismissed { .. } => println!("Warning dismissed"),
        SessionEvent::SubmitConfirmation(summary) => {
            let o = &summary.overall;
            println!(
                "Answered {}, not answered {}, marked {}, not visited {}. Type `confirm` to submit.",
                o.answered, o.not_answered, o.marked_for_review, o.not_visited
            );
        }
        SessionEvent::TimeUp => println!("Time is up, submitting"),
        SessionEvent::Submitted { reason } => println!("Submitted ({:?})", reason),
        SessionEvent::Redirect { route, .. } => println!("Back to {}", route.path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_ending_by_itself_stops_reading_input() {
        let (command_tx, mut command_rx) = mpsc::channel(4);
        // Writer stays open, so input never reaches end of file.
        let (_writer, reader) = tokio::io::duplex(64);
        let mut session = tokio::spawn(async { "submitted" });

        let finished = relay_input(BufReader::new(reader), &command_tx, &mut session)
            .await
            .unwrap();

        assert_eq!(finished.unwrap().unwrap(), "submitted");
        drop(command_tx);
        assert!(command_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn typed_commands_are_forwarded_until_quit() {
        let (command_tx, mut command_rx) = mpsc::channel(4);
        let input = BufReader::new(&b"next\nbogus\nquit\nprev\n"[..]);
        let mut session = std::pin::pin!(std::future::pending::<()>());

        let finished = relay_input(input, &command_tx, &mut session).await.unwrap();

        assert!(finished.is_none());
        drop(command_tx);
        assert!(matches!(command_rx.recv().await, Some(SessionCommand::Next)));
        assert!(command_rx.recv().await.is_none());
    }
}
