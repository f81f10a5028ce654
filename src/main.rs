//! `triage` console front end.
//!
//! Thin layer over the library: argument parsing, stdin prompts and plain-text
//! rendering. All behavior lives in `triage_client`.


use std::cell::Cell;
use std::io::Write as _;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use triage_client::config::{ClientConfig, ConfigError, normalize_base_url};
use triage_client::net::api;
use triage_client::net::gateway::{Gateway, GatewayError, TransportError};
use triage_client::net::http::HttpTransport;
use triage_client::net::types::{RegisterRequest, TriageResult};
use triage_client::services::queue_sync::{ActionOutcome, FetchKind, QueueSynchronizer};
use triage_client::state::queue::QueueState;
use triage_client::state::session::{FileStorage, Session};
use triage_client::state::wizard::{COMPLAINT_OPTIONS, ComplaintMode, StepError, WizardController, WizardStep};
use triage_client::util::auth::AuthExpiry;
use triage_client::util::guard::{Navigator, Route, RouteGuard};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("could not build HTTP client: {0}")]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    Step(#[from] StepError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("not logged in; run `triage login` first")]
    NotLoggedIn,
    #[error("already logged in; run `triage logout` first")]
    AlreadyLoggedIn,
    #[error("input closed before the intake was finished")]
    InputClosed,
}

#[derive(Parser, Debug)]
#[command(name = "triage", about = "Emergency triage intake and queue client")]
struct Cli {
    /// Overrides `TRIAGE_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `TRIAGE_POLL_INTERVAL_SECS`.
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Overrides `TRIAGE_CREDENTIAL_FILE`.
    #[arg(long)]
    credential_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the access token.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TRIAGE_PASSWORD")]
        password: String,
    },
    /// Create a staff account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TRIAGE_PASSWORD")]
        password: String,
        #[arg(long)]
        full_name: String,
    },
    /// Forget the stored token.
    Logout,
    /// Register a patient through the intake wizard.
    Intake,
    /// Watch the live queue and attend or resolve patients.
    Queue,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = resolve_config(&cli, ClientConfig::read_env())?;
    let ctx = AppContext::connect(config)?;

    tokio::task::LocalSet::new()
        .run_until(async move {
            match cli.command {
                Command::Login { username, password } => run_login(&ctx, &username, &password).await,
                Command::Register { username, password, full_name } => {
                    run_register(&ctx, RegisterRequest { username, password, full_name }).await
                }
                Command::Logout => run_logout(&ctx),
                Command::Intake => run_intake(&ctx).await,
                Command::Queue => run_queue(&ctx).await,
            }
        })
        .await
}

/// Layer CLI flags over the environment, then validate the result once.
fn resolve_config(cli: &Cli, mut config: ClientConfig) -> Result<ClientConfig, CliError> {
    if let Some(url) = &cli.base_url {
        config.base_url = normalize_base_url(url);
    }
    if let Some(secs) = cli.poll_interval_secs {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(path) = &cli.credential_file {
        config.credential_file.clone_from(path);
    }
    config.validate()?;
    Ok(config)
}

// =============================================================================
// CONTEXT
// =============================================================================

struct AppContext {
    config: ClientConfig,
    session: Session,
    gateway: Gateway,
    navigator: Rc<ConsoleNavigator>,
}

impl AppContext {
    fn connect(config: ClientConfig) -> Result<Self, CliError> {
        let session = Session::restore(FileStorage::new(&config.credential_file));
        let transport = HttpTransport::new(&config.base_url, config.request_timeout, config.connect_timeout)?;
        let gateway = Gateway::new(Rc::new(transport), session.clone());
        info!(base_url = %config.base_url, authenticated = session.is_authenticated(), "triage client ready");
        Ok(Self { config, session, gateway, navigator: Rc::new(ConsoleNavigator::default()) })
    }

    fn guard(&self, requested: Route) -> Route {
        RouteGuard::new(self.session.clone()).enter(requested, &*self.navigator)
    }
}

/// Records where the guard or the expiry path sent us.
#[derive(Default)]
struct ConsoleNavigator {
    expired: Cell<bool>,
}

impl ConsoleNavigator {
    fn session_expired(&self) -> bool {
        self.expired.get()
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route, session_expired: bool) {
        info!(route = route.path(), session_expired, "navigate");
        if session_expired {
            self.expired.set(true);
            eprintln!("Session expired. Run `triage login` to sign in again.");
        }
    }
}

// =============================================================================
// ACCOUNT COMMANDS
// =============================================================================

async fn run_login(ctx: &AppContext, username: &str, password: &str) -> Result<(), CliError> {
    if ctx.guard(Route::Login) != Route::Login {
        return Err(CliError::AlreadyLoggedIn);
    }
    let token = api::authenticate(&ctx.gateway, username, password).await?;
    ctx.session.login(&token);
    println!("Logged in as {username}.");
    Ok(())
}

async fn run_register(ctx: &AppContext, account: RegisterRequest) -> Result<(), CliError> {
    if ctx.guard(Route::Register) != Route::Register {
        return Err(CliError::AlreadyLoggedIn);
    }
    api::register(&ctx.gateway, &account).await?;
    println!("Account '{}' created. Run `triage login` to sign in.", account.username);
    Ok(())
}

fn run_logout(ctx: &AppContext) -> Result<(), CliError> {
    ctx.session.logout();
    println!("Logged out.");
    Ok(())
}

// =============================================================================
// INTAKE
// =============================================================================

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines() }
    }

    async fn ask(&mut self, label: &str) -> Result<String, CliError> {
        print!("{label}");
        std::io::stdout().flush()?;
        self.lines.next_line().await?.ok_or(CliError::InputClosed)
    }
}

fn report_step(result: Result<WizardStep, StepError>) {
    if let Err(err) = result {
        println!("  ! {err}");
    }
}

async fn run_intake(ctx: &AppContext) -> Result<(), CliError> {
    ctx.guard(Route::Intake);
    let mut prompt = Prompt::new();
    let mut wizard = WizardController::new(ctx.gateway.clone());

    loop {
        match wizard.step() {
            WizardStep::Basics => {
                println!("\n[1/3] Patient");
                let name = prompt.ask("Name: ").await?;
                let age = prompt.ask("Age: ").await?;
                wizard.set_name(&name)?;
                wizard.set_age(&age)?;
                report_step(wizard.advance());
            }
            WizardStep::ComplaintSelection => {
                println!("\n[2/3] Main complaint");
                for (index, option) in COMPLAINT_OPTIONS.iter().enumerate() {
                    println!("  {:>2}. {}", index + 1, option.label);
                }
                println!("  Enter a number, 'free' to describe it, or 'back'.");
                let answer = prompt.ask("> ").await?;
                match answer.trim() {
                    "back" => report_step(wizard.back()),
                    "free" => {
                        wizard.set_complaint_mode(ComplaintMode::FreeText)?;
                        let text = prompt.ask("Describe the complaint: ").await?;
                        wizard.set_main_complaint(&text)?;
                        report_step(wizard.advance());
                    }
                    choice => match parse_option(choice) {
                        Some(key) => {
                            wizard.select_complaint(key)?;
                            report_step(wizard.advance());
                        }
                        None => println!("  ! unknown choice '{choice}'"),
                    },
                }
            }
            WizardStep::Details => {
                if let Some(error) = wizard.error() {
                    println!("\nSubmission failed:");
                    for line in error.lines() {
                        println!("  ! {line}");
                    }
                    let answer = prompt.ask("[enter] retry, 'edit' to change details, 'back' to go back: ").await?;
                    match answer.trim() {
                        "back" => {
                            report_step(wizard.back());
                            continue;
                        }
                        "edit" => {}
                        _ => {
                            println!("Submitting...");
                            wizard.submit().await?;
                            continue;
                        }
                    }
                }
                println!("\n[3/3] Details (optional, 'back' to go back)");
                let symptoms = prompt.ask("Symptoms: ").await?;
                if symptoms.trim() == "back" {
                    report_step(wizard.back());
                    continue;
                }
                let history = prompt.ask("Medical history: ").await?;
                wizard.set_symptoms(&symptoms)?;
                wizard.set_medical_history(&history)?;
                println!("Submitting...");
                wizard.submit().await?;
            }
            WizardStep::Submitting | WizardStep::Result => {
                if let Some(result) = wizard.result() {
                    print_result(result);
                }
                let again = prompt.ask("\nRegister another patient? [y/N] ").await?;
                if !again.trim().eq_ignore_ascii_case("y") {
                    return Ok(());
                }
                wizard.restart();
            }
        }
    }
}

/// Map a 1-based menu number to a complaint key.
fn parse_option(choice: &str) -> Option<&'static str> {
    let index = choice.parse::<usize>().ok()?.checked_sub(1)?;
    COMPLAINT_OPTIONS.get(index).map(|option| option.key)
}

fn print_result(result: &TriageResult) {
    let classification = &result.classification;
    let priority = classification.priority;
    let description = if classification.description.is_empty() {
        priority.description()
    } else {
        classification.description.as_str()
    };
    let wait = if classification.estimated_wait_time.is_empty() {
        priority.wait_hint()
    } else {
        classification.estimated_wait_time.as_str()
    };

    println!("\nPatient:  {}", result.patient_name);
    println!("Ticket:   {}", classification.ticket);
    println!("Priority: {priority} ({description})");
    println!("Wait:     {wait}");
    if !result.ai_suggestions.is_empty() {
        println!("AI suggestions:");
        for suggestion in &result.ai_suggestions {
            println!("  {:>5.1}%  {}", suggestion.probability * 100.0, suggestion.disease);
        }
    }
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum QueueCommand {
    Attend(String),
    Resolve { ticket: String, diagnosis: String },
    Refresh,
    Dismiss,
    Quit,
}

fn parse_command(line: &str) -> Option<QueueCommand> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match verb {
        "attend" if !rest.is_empty() => Some(QueueCommand::Attend(rest.to_owned())),
        "resolve" if !rest.is_empty() => {
            let (ticket, diagnosis) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Some(QueueCommand::Resolve { ticket: ticket.to_owned(), diagnosis: diagnosis.trim().to_owned() })
        }
        "refresh" => Some(QueueCommand::Refresh),
        "dismiss" => Some(QueueCommand::Dismiss),
        "quit" | "exit" => Some(QueueCommand::Quit),
        _ => None,
    }
}

const QUEUE_HELP: &str = "commands: attend <ticket> | resolve <ticket> <diagnosis> | refresh | dismiss | quit";

async fn run_queue(ctx: &AppContext) -> Result<(), CliError> {
    if ctx.guard(Route::Dashboard) != Route::Dashboard {
        return Err(CliError::NotLoggedIn);
    }

    let expiry = AuthExpiry::new(ctx.session.clone(), ctx.navigator.clone());
    let (sync, handle) = QueueSynchronizer::mount(ctx.gateway.clone(), expiry, ctx.config.poll_interval);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut redraw = tokio::time::interval(Duration::from_millis(250));
    let mut shown = None;
    println!("{QUEUE_HELP}");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = redraw.tick() => {
                if ctx.navigator.session_expired() {
                    break;
                }
                let revision = sync.revision();
                if shown != Some(revision) {
                    shown = Some(revision);
                    sync.with_state(render_queue);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Some(QueueCommand::Quit) => break,
                    Some(QueueCommand::Attend(ticket)) => {
                        let pending = sync.attend(&ticket);
                        tokio::task::spawn_local(async move {
                            report_action("attend", &ticket, &pending.await);
                        });
                    }
                    Some(QueueCommand::Resolve { ticket, diagnosis }) => {
                        sync.open_resolve(&ticket);
                        sync.set_diagnosis(&diagnosis);
                        let sync = sync.clone();
                        tokio::task::spawn_local(async move {
                            report_action("resolve", &ticket, &sync.confirm_resolve().await);
                        });
                    }
                    Some(QueueCommand::Refresh) => {
                        let sync = sync.clone();
                        tokio::task::spawn_local(async move {
                            sync.refresh(FetchKind::Reconcile).await;
                        });
                    }
                    Some(QueueCommand::Dismiss) => sync.dismiss_error(),
                    None => println!("{QUEUE_HELP}"),
                }
            }
        }
    }

    handle.cancel();
    Ok(())
}

fn report_action(action: &str, ticket: &str, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Done => println!("{action} {ticket}: done"),
        ActionOutcome::Failed(message) | ActionOutcome::Rejected(message) => {
            println!("{action} {ticket}: {message}");
        }
        ActionOutcome::AuthExpired | ActionOutcome::Inactive => {}
    }
}

fn render_queue(state: &QueueState) {
    if state.initial_loading {
        println!("Loading queue...");
        return;
    }
    let stats = &state.stats;
    println!(
        "\n{} waiting | {} emergencies | avg wait {:.0} min | {} in the last hour{}",
        stats.total_in_queue,
        stats.emergency_count,
        stats.avg_wait_minutes,
        stats.last_hour_count,
        if state.refreshing { " | refreshing" } else { "" }
    );
    if let Some(error) = &state.error {
        println!("! {error}");
    }
    if state.entries.is_empty() {
        println!("  No patients waiting.");
    }
    for entry in state.sorted_entries() {
        println!(
            "  {:<8} {:<9} {:>4} min  {}  ({})",
            entry.ticket,
            entry.priority.as_str(),
            entry.wait_minutes,
            entry.name,
            entry.complaint
        );
        if let Some(error) = state.row_error(&entry.ticket) {
            println!("           ! {error}");
        }
    }
    if let Some(dialog) = &state.resolve {
        if let Some(error) = &dialog.error {
            println!("! resolve {}: {error}", dialog.ticket);
        }
    }
}
