//! LifeLens CLI - Command-line interface for the LifeLens engine
//!
//! Commands:
//! - init-user / delete-user / habits / add-habit: manage users and habits
//! - log: record a success or failure and retrain in the background
//! - train / predict / nudge / model: prediction and nudge generation
//! - pet: read or update the virtual pet
//! - diary-add / diary: write and read diary entries
//! - create-group / groups / join-group / user-groups: social groups
//! - doctor: diagnose database and configuration

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use lifelens_engine::pipeline::DEFAULT_DIARY_LIMIT;
use lifelens_engine::{
    DiaryDraft, Engine, EngineConfig, EngineError, PetUpdate, SqliteStore, Store, StoreError,
    TextGenerationConfig, ENGINE_VERSION,
};

/// LifeLens - Adaptive engagement prediction and nudges for habit tracking
#[derive(Parser)]
#[command(name = "lifelens")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Predict habit engagement and compose nudges", long_about = None)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, default_value = "lifelens.db")]
    db: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user
    InitUser {
        #[arg(long)]
        name: String,

        /// Communication style (e.g. encourager, mentor, challenger)
        #[arg(long, default_value = "encourager")]
        style: String,
    },

    /// Delete a user with their habits, logs, model and pet
    DeleteUser {
        #[arg(long)]
        user: String,
    },

    /// Change a user's communication style
    SetStyle {
        #[arg(long)]
        user: String,

        #[arg(long)]
        style: String,
    },

    /// Add a habit for a user
    AddHabit {
        #[arg(long)]
        user: String,

        #[arg(long)]
        name: String,

        /// Target completions per day
        #[arg(long, default_value = "1")]
        target: u32,
    },

    /// List a user's habits
    Habits {
        #[arg(long)]
        user: String,
    },

    /// Log a habit outcome (success unless --missed)
    Log {
        #[arg(long)]
        user: String,

        #[arg(long)]
        habit: String,

        /// Record a missed habit instead of a success
        #[arg(long)]
        missed: bool,
    },

    /// Train the user's model now
    Train {
        #[arg(long)]
        user: String,
    },

    /// Predict continued engagement for a habit
    Predict {
        #[arg(long)]
        user: String,

        #[arg(long)]
        habit: String,

        /// Also compose a nudge in the user's style
        #[arg(long)]
        nudge: bool,
    },

    /// Compose a nudge without touching the database
    Nudge {
        #[arg(long)]
        habit_name: String,

        #[arg(long)]
        probability: f64,

        #[arg(long, default_value = "encourager")]
        style: String,

        /// Never call the external text generator
        #[arg(long)]
        local: bool,
    },

    /// Print the stored model for a user
    Model {
        #[arg(long)]
        user: String,
    },

    /// Show or update the user's pet
    Pet {
        #[arg(long)]
        user: String,

        /// JSON object of fields to update (mood, hunger, energy, affection)
        #[arg(long)]
        update: Option<String>,
    },

    /// Write a diary entry
    DiaryAdd {
        #[arg(long)]
        user: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        mood: Option<String>,

        /// Path of an attached voice note
        #[arg(long)]
        audio_path: Option<String>,
    },

    /// List a user's diary entries, newest first
    Diary {
        #[arg(long)]
        user: String,

        #[arg(long, default_value_t = DEFAULT_DIARY_LIMIT)]
        limit: usize,
    },

    /// Create a social group
    CreateGroup {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List all groups
    Groups,

    /// Add a user to a group
    JoinGroup {
        #[arg(long)]
        user: String,

        #[arg(long)]
        group: String,
    },

    /// List the groups a user belongs to
    UserGroups {
        #[arg(long)]
        user: String,
    },

    /// Diagnose database and configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, LifelensCliError> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    // A config file wins; otherwise pick up credentials from the environment
    if !config.text_generation.enabled {
        let from_env = TextGenerationConfig::from_env();
        if from_env.enabled {
            config.text_generation = from_env;
        }
    }
    Ok(config)
}

fn open_engine(cli: &Cli) -> Result<Engine, LifelensCliError> {
    let config = load_config(cli.config.as_deref())?;
    let store = SqliteStore::open(&cli.db).map_err(EngineError::from)?;
    Ok(Engine::new(Arc::new(store), config)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), LifelensCliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), LifelensCliError> {
    if let Commands::Doctor { json } = &cli.command {
        return cmd_doctor(&cli.db, cli.config.as_deref(), *json);
    }
    if let Commands::Nudge {
        habit_name,
        probability,
        style,
        local,
    } = &cli.command
    {
        return cmd_nudge(cli.config.as_deref(), habit_name, *probability, style, *local).await;
    }

    let mut engine = open_engine(&cli)?;

    match &cli.command {
        Commands::InitUser { name, style } => print_json(&engine.create_user(name, style)?),
        Commands::DeleteUser { user } => {
            engine.delete_user(user)?;
            print_json(&serde_json::json!({ "deleted": user }))
        }
        Commands::SetStyle { user, style } => print_json(&engine.update_style(user, style)?),
        Commands::AddHabit { user, name, target } => {
            print_json(&engine.add_habit(user, name, *target)?)
        }
        Commands::Habits { user } => print_json(&engine.list_habits(user)?),
        Commands::Log {
            user,
            habit,
            missed,
        } => {
            engine.start_background_training();
            let logged = engine.log_event(user, habit, !*missed);
            // Let the queued retrain finish before the process exits
            engine.shutdown().await;
            print_json(&logged?)
        }
        Commands::Train { user } => {
            let trained = engine.extract_and_train(user)?;
            print_json(&serde_json::json!({ "user_id": user, "trained": trained }))
        }
        Commands::Predict { user, habit, nudge } => {
            if *nudge {
                print_json(&engine.predict_and_nudge(user, habit).await?)
            } else {
                print_json(&engine.predict(user, habit)?)
            }
        }
        Commands::Model { user } => {
            engine.get_user(user)?;
            match engine.store().get_model(user).map_err(EngineError::from)? {
                Some(record) => {
                    println!("{}", record.to_json()?);
                    Ok(())
                }
                None => Err(LifelensCliError::NoModel(user.clone())),
            }
        }
        Commands::Pet { user, update } => match update {
            Some(json) => {
                let update = PetUpdate::from_json(json)?;
                print_json(&engine.update_pet(user, &update)?)
            }
            None => print_json(&engine.pet(user)?),
        },
        Commands::DiaryAdd {
            user,
            title,
            text,
            mood,
            audio_path,
        } => {
            let draft = DiaryDraft {
                title: title.clone(),
                text: text.clone(),
                mood: mood.clone(),
                audio_path: audio_path.clone(),
                created_at: None,
            };
            print_json(&engine.add_diary_entry(user, &draft)?)
        }
        Commands::Diary { user, limit } => print_json(&engine.list_diary_entries(user, *limit)?),
        Commands::CreateGroup { name, description } => {
            print_json(&engine.create_group(name, description.as_deref())?)
        }
        Commands::Groups => print_json(&engine.list_groups()?),
        Commands::JoinGroup { user, group } => print_json(&engine.join_group(user, group)?),
        Commands::UserGroups { user } => print_json(&engine.list_user_groups(user)?),
        Commands::Doctor { .. } | Commands::Nudge { .. } => Ok(()),
    }
}

async fn cmd_nudge(
    config_path: Option<&Path>,
    habit_name: &str,
    probability: f64,
    style: &str,
    local: bool,
) -> Result<(), LifelensCliError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(LifelensCliError::InvalidArgument(format!(
            "probability must be between 0 and 1, got {probability}"
        )));
    }

    let config = load_config(config_path)?;
    let composer = lifelens_engine::NudgeComposer::from_config(
        config.nudge.taxonomy,
        &config.text_generation,
    );

    let message = if local {
        composer.compose_local(habit_name, probability, style)
    } else {
        composer.compose(habit_name, probability, style).await
    };

    print_json(&lifelens_engine::NudgeResponse {
        message,
        probability,
        style_used: composer.resolve_style(style).as_str().to_string(),
    })
}

fn cmd_doctor(db: &Path, config_path: Option<&Path>, json: bool) -> Result<(), LifelensCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("LifeLens engine {}", ENGINE_VERSION),
    });

    let config = match load_config(config_path) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: match config_path {
                    Some(path) => format!("Loaded {}", path.display()),
                    None => "Using built-in defaults".to_string(),
                },
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            });
            None
        }
    };

    if let Some(config) = &config {
        checks.push(DoctorCheck {
            name: "taxonomy".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Styles: {} (default {})",
                config
                    .nudge
                    .taxonomy
                    .styles()
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                config.nudge.taxonomy.default_style().as_str()
            ),
        });

        let text = &config.text_generation;
        checks.push(if text.is_usable() {
            DoctorCheck {
                name: "text_generation".to_string(),
                status: CheckStatus::Ok,
                message: format!("Enabled: {} via {}", text.model, text.endpoint),
            }
        } else if text.enabled {
            DoctorCheck {
                name: "text_generation".to_string(),
                status: CheckStatus::Warning,
                message: "Enabled but no API key configured; local nudges only".to_string(),
            }
        } else {
            DoctorCheck {
                name: "text_generation".to_string(),
                status: CheckStatus::Ok,
                message: "Disabled; local nudges only".to_string(),
            }
        });
    }

    checks.push(if db.exists() {
        match SqliteStore::open(db) {
            Ok(_) => DoctorCheck {
                name: "database".to_string(),
                status: CheckStatus::Ok,
                message: format!("Opened {}", db.display()),
            },
            Err(e) => DoctorCheck {
                name: "database".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot open {}: {}", db.display(), e),
            },
        }
    } else {
        DoctorCheck {
            name: "database".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist yet; it is created on first use", db.display()),
        }
    });

    let report = DoctorReport {
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("LifeLens Doctor Report");
        println!("======================");
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(LifelensCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum LifelensCliError {
    Engine(EngineError),
    Json(serde_json::Error),
    NoModel(String),
    InvalidArgument(String),
    DoctorFailed,
}

impl From<EngineError> for LifelensCliError {
    fn from(e: EngineError) -> Self {
        LifelensCliError::Engine(e)
    }
}

impl From<serde_json::Error> for LifelensCliError {
    fn from(e: serde_json::Error) -> Self {
        LifelensCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LifelensCliError> for CliError {
    fn from(e: LifelensCliError) -> Self {
        match e {
            LifelensCliError::Engine(e) => {
                let (code, hint) = match &e {
                    EngineError::UserNotFound(_) => {
                        ("USER_NOT_FOUND", "Create the user with 'lifelens init-user'")
                    }
                    EngineError::HabitNotFound(_) => {
                        ("HABIT_NOT_FOUND", "List habits with 'lifelens habits --user <id>'")
                    }
                    EngineError::GroupNotFound(_) => {
                        ("GROUP_NOT_FOUND", "List groups with 'lifelens groups'")
                    }
                    EngineError::Storage(StoreError::Sqlite(_)) => {
                        ("STORAGE_ERROR", "Run 'lifelens doctor' to check the database")
                    }
                    EngineError::Storage(_) => ("STORAGE_ERROR", "Retry the command"),
                    EngineError::InvalidInput(_) => ("INVALID_INPUT", "Check the command arguments"),
                    EngineError::InvalidPetUpdate(_) => (
                        "INVALID_PET_UPDATE",
                        "Only mood, hunger, energy and affection can be updated",
                    ),
                    EngineError::Config(_) => ("CONFIG_ERROR", "Check the configuration file"),
                    EngineError::Training(_) => {
                        ("TRAINING_ERROR", "Check the training section of the configuration")
                    }
                    EngineError::Json(_) => ("JSON_ERROR", "Check JSON syntax"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            LifelensCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LifelensCliError::NoModel(user) => CliError {
                code: "NO_MODEL".to_string(),
                message: format!("No trained model for user {}", user),
                hint: Some("Log events for at least 5 habits, then run 'lifelens train'".to_string()),
            },
            LifelensCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: None,
            },
            LifelensCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
