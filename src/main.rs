use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing::Instrument;

use gym_workflow::api::types::TrainerPreferences;
use gym_workflow::workflow::SessionBoard;
use gym_workflow::{
    config, create_workflow_span, generate_correlation_id, init_telemetry, ActionOutcome,
    GymWorkflowConfig, HttpWorkflowApi, PackageWorkflow, StepName, ToggleOutcome, WorkflowApi,
    WorkflowError,
};

#[derive(Parser)]
#[command(name = "gym-workflow")]
#[command(about = "Drive the gym package activation workflow")]
#[command(long_about = "Walks a paid package registration through branch selection, trainer \
                       selection and schedule creation against the gym backend. Start with \
                       'gym-workflow status <REGISTRATION_ID>' to see where a registration stands.")]
struct Cli {
    /// Backend origin, overrides configuration
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Bearer token, overrides configuration and GYM_API_TOKEN
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the workflow step a registration is at
    Status {
        registration_id: String,
    },
    /// List trainers matching training preferences
    Trainers {
        registration_id: String,
        #[command(flatten)]
        preferences: PreferenceArgs,
    },
    /// List candidate sessions grouped by day and time slot
    Sessions {
        registration_id: String,
    },
    /// Perform every workflow step for which arguments are given
    Activate {
        registration_id: String,
        /// Branch to confirm (owners only)
        #[arg(long)]
        branch: Option<String>,
        /// Trainer to select
        #[arg(long)]
        trainer: Option<String>,
        #[command(flatten)]
        preferences: PreferenceArgs,
        /// Session ids to book, one per time slot
        #[arg(long = "session")]
        sessions: Vec<String>,
        /// Mark the workflow complete once the schedule exists
        #[arg(long)]
        complete: bool,
    },
}

#[derive(Args)]
struct PreferenceArgs {
    /// Preferred time window such as 06:00-08:00 (repeatable)
    #[arg(long = "hours")]
    hours: Vec<String>,
    /// Training days per week
    #[arg(long, default_value = "3")]
    days: u8,
}

impl PreferenceArgs {
    fn to_preferences(&self) -> TrainerPreferences {
        TrainerPreferences {
            preferred_hours: self.hours.clone(),
            days_per_week: self.days,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = config()?.clone();
    if let Some(base_url) = cli.base_url.clone() {
        settings.api.base_url = base_url;
    }
    if let Some(token) = cli.token.clone() {
        settings.api.token = Some(token);
    }
    init_telemetry(&settings.observability)?;

    tokio::runtime::Runtime::new()?.block_on(run(cli.command, settings))
}

async fn run(command: Commands, settings: GymWorkflowConfig) -> Result<()> {
    let api = Arc::new(HttpWorkflowApi::new(&settings.api)?);
    match command {
        Commands::Status { registration_id } => {
            status_command(api, &settings, &registration_id).await
        }
        Commands::Trainers {
            registration_id,
            preferences,
        } => trainers_command(api, &registration_id, &preferences.to_preferences()).await,
        Commands::Sessions { registration_id } => sessions_command(api, &registration_id).await,
        Commands::Activate {
            registration_id,
            branch,
            trainer,
            preferences,
            sessions,
            complete,
        } => {
            let request = ActivateRequest {
                branch,
                trainer,
                preferences: preferences.to_preferences(),
                sessions,
                complete,
            };
            activate_command(api, &settings, &registration_id, request).await
        }
    }
}

fn report(err: WorkflowError) -> anyhow::Error {
    if err.is_fatal() {
        anyhow!("❌ {}", err.user_message())
    } else {
        anyhow!("❌ {} (retry the command to try again)", err.user_message())
    }
}

fn open_workflow(
    api: Arc<HttpWorkflowApi>,
    settings: &GymWorkflowConfig,
    registration_id: &str,
) -> Result<PackageWorkflow> {
    PackageWorkflow::from_config(registration_id, api, &settings.workflow).map_err(report)
}

fn print_steps(workflow: &PackageWorkflow) {
    let current = workflow.current_index();
    for (index, step) in workflow.step_names().iter().enumerate() {
        let marker = match current {
            Some(c) if c == index => "👉",
            Some(c) if c > index => "✅",
            _ => "  ",
        };
        println!("   {marker} {}. {step}", index + 1);
    }
}

async fn status_command(
    api: Arc<HttpWorkflowApi>,
    settings: &GymWorkflowConfig,
    registration_id: &str,
) -> Result<()> {
    let workflow = open_workflow(api, settings, registration_id)?;
    let span = create_workflow_span("status", registration_id, Some(&generate_correlation_id()));
    workflow.load().instrument(span).await.map_err(report)?;

    println!("📋 Registration {registration_id}");
    if let Some(snapshot) = workflow.snapshot() {
        println!("   Role: {:?}", snapshot.role());
        println!("   Registration status: {}", snapshot.registration.status.as_str());
        if let Some(branch) = &snapshot.registration.branch {
            println!("   Branch: {}", branch.name().unwrap_or(branch.id()));
        }
    }
    println!();
    print_steps(&workflow);
    Ok(())
}

async fn trainers_command(
    api: Arc<HttpWorkflowApi>,
    registration_id: &str,
    preferences: &TrainerPreferences,
) -> Result<()> {
    let trainers = api
        .available_trainers(registration_id, preferences)
        .await
        .map_err(|e| anyhow!("❌ {}", e.user_message()))?;

    if trainers.is_empty() {
        println!("No trainers match these preferences.");
        return Ok(());
    }
    println!("🏋️ Available trainers:");
    for trainer in trainers {
        let rating = trainer
            .rating
            .map(|r| format!(" ★{r:.1}"))
            .unwrap_or_default();
        let specialty = trainer.specialty.unwrap_or_default();
        println!("   {} {}{} {}", trainer.id, trainer.name, rating, specialty);
    }
    Ok(())
}

async fn sessions_command(api: Arc<HttpWorkflowApi>, registration_id: &str) -> Result<()> {
    let available = api
        .available_sessions(registration_id)
        .await
        .map_err(|e| anyhow!("❌ {}", e.user_message()))?;

    if let Some(week) = &available.week_info {
        println!(
            "📅 Week {} → {}",
            week.start_date.as_deref().unwrap_or("?"),
            week.end_date.as_deref().unwrap_or("?")
        );
    }

    let board = SessionBoard::build(&available.sessions);
    for date in board.dates() {
        println!("{}", date.format("%A %Y-%m-%d"));
        for (slot, sessions) in board.slots(date) {
            for session in sessions {
                println!(
                    "   {slot}  {}  trainer {}  {} place(s) left",
                    session.id,
                    session.trainer.name().unwrap_or(session.trainer.id()),
                    session.remaining_capacity()
                );
            }
        }
    }
    for session in &board.unslotted {
        println!("   (off-grid) {} {} {}", session.id, session.date, session.start);
    }
    Ok(())
}

struct ActivateRequest {
    branch: Option<String>,
    trainer: Option<String>,
    preferences: TrainerPreferences,
    sessions: Vec<String>,
    complete: bool,
}

fn print_outcome(outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Step { step, notice, .. } => {
            if let Some(notice) = notice {
                println!("   ℹ️  {notice}");
            }
            println!("   ➡️  Now at step: {step}");
        }
        ActionOutcome::Finished { notice } => {
            if let Some(notice) = notice {
                println!("   ℹ️  {notice}");
            }
            println!("🎉 Package activated");
        }
        ActionOutcome::Discarded => println!("   Result discarded"),
    }
}

async fn activate_command(
    api: Arc<HttpWorkflowApi>,
    settings: &GymWorkflowConfig,
    registration_id: &str,
    request: ActivateRequest,
) -> Result<()> {
    let workflow = open_workflow(api, settings, registration_id)?;
    let span = create_workflow_span("activate", registration_id, Some(&generate_correlation_id()));
    drive_steps(&workflow, request).instrument(span).await
}

/// Run steps from the current one while arguments for them remain.
async fn drive_steps(workflow: &PackageWorkflow, mut request: ActivateRequest) -> Result<()> {
    workflow.load().await.map_err(report)?;
    print_steps(workflow);

    loop {
        let step = workflow
            .current_step()
            .ok_or_else(|| anyhow!("❌ Workflow status is not loaded"))?;

        let outcome = match step {
            StepName::SelectBranch => match request.branch.take() {
                Some(branch) => {
                    println!("🏢 Confirming branch {branch}");
                    workflow.select_branch(&branch).await.map_err(report)?
                }
                None => {
                    println!("⏸️  Next step needs --branch <BRANCH_ID>");
                    return Ok(());
                }
            },
            StepName::SelectTrainer => match request.trainer.take() {
                Some(trainer) => {
                    println!("🏋️ Selecting trainer {trainer}");
                    workflow
                        .select_trainer(&trainer, &request.preferences)
                        .await
                        .map_err(report)?
                }
                None => {
                    println!("⏸️  Next step needs --trainer <TRAINER_ID> and --hours <WINDOW>");
                    return Ok(());
                }
            },
            StepName::CreateSchedule => {
                if request.sessions.is_empty() {
                    println!("⏸️  Next step needs one or more --session <SESSION_ID>");
                    return Ok(());
                }
                workflow.available_sessions().await.map_err(report)?;
                for session_id in std::mem::take(&mut request.sessions) {
                    match workflow.toggle_session_by_id(&session_id).map_err(report)? {
                        ToggleOutcome::Rejected(notice) => println!("   ⚠️  {session_id}: {notice}"),
                        _ => println!("   ✅ {session_id} selected"),
                    }
                }
                println!("📅 Creating schedule");
                workflow.create_schedule().await.map_err(report)?
            }
            StepName::Completed => {
                if !request.complete {
                    println!("⏸️  Schedule is in place. Re-run with --complete to finish.");
                    return Ok(());
                }
                let outcome = workflow.complete_workflow().await.map_err(report)?;
                print_outcome(&outcome);
                return Ok(());
            }
        };

        print_outcome(&outcome);
        if !matches!(outcome, ActionOutcome::Step { advanced: true, .. }) {
            return Ok(());
        }
    }
}
