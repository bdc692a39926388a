mod ui;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kiosk_camera::ConfiguredCamera;
use kiosk_network::{AttendanceBackend, HttpBackend};
use kiosk_ops::{init_tracing, ActivityLog};
use kiosk_types::{
    config::KioskConfig,
    ui::{IDENTIFY_RESULT, NAME_INPUT, PUNCH_MESSAGE, REGISTER_MESSAGE, USER_ID_INPUT, USER_LIST},
    wire::PunchAction,
};
use kiosk_workflow::{
    AttendanceController, MemorySurface, PageController, RegistrationController, WorkflowSettings,
};
use tokio::sync::mpsc;
use tracing::info;

use crate::ui::{KeyCommand, Page, UiMessage};

#[derive(Parser)]
#[command(name = "kiosk", about = "Face registration and attendance kiosk")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture one frame and register it under the given identity.
    Register {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
    },
    /// Capture one frame and record a punch-in.
    PunchIn,
    /// Capture one frame and record a punch-out.
    PunchOut,
    /// Remove a registered user from the backend.
    DeleteUser { user_id: String },
    /// Print every registered user.
    ListUsers,
    /// Interactive terminal kiosk.
    Run {
        #[arg(long, value_enum, default_value_t = PageArg::Attend)]
        page: PageArg,
        #[arg(long, default_value = "")]
        user_id: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PageArg {
    Register,
    Attend,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config);
    if let Err(err) = init_tracing(&config.ops) {
        eprintln!("Logging disabled: {err}");
    }

    match cli.command {
        Command::Register { user_id, name } => register_once(&config, &user_id, &name).await,
        Command::PunchIn => punch_once(&config, PunchAction::In).await,
        Command::PunchOut => punch_once(&config, PunchAction::Out).await,
        Command::DeleteUser { user_id } => {
            let backend = HttpBackend::new(&config.backend)?;
            if backend.delete_user(&user_id).await? {
                println!("Removed {user_id}");
                Ok(())
            } else {
                bail!("backend refused to remove {user_id}")
            }
        }
        Command::ListUsers => {
            let backend = HttpBackend::new(&config.backend)?;
            let users = backend.list_users().await?;
            if users.is_empty() {
                println!("No users registered yet.");
            }
            for user in users {
                println!("{}", user.label());
            }
            Ok(())
        }
        Command::Run {
            page,
            user_id,
            name,
        } => match page {
            PageArg::Register => run_registration(&config, &user_id, &name).await,
            PageArg::Attend => run_attendance(&config).await,
        },
    }
}

async fn register_once(config: &KioskConfig, user_id: &str, name: &str) -> Result<()> {
    let surface = Arc::new(MemorySurface::new());
    surface.set_input(USER_ID_INPUT, user_id);
    surface.set_input(NAME_INPUT, name);
    let controller = RegistrationController::new(
        WorkflowSettings::from_config(config),
        ConfiguredCamera::from_config(&config.camera),
        HttpBackend::new(&config.backend)?,
        surface.clone(),
        ActivityLog::new(),
    );

    let outcome = async {
        controller.load().await?;
        controller.capture().await?;
        controller.submit().await
    }
    .await;
    controller.unload().await;

    println!("{}", surface.text(REGISTER_MESSAGE));
    let entry = outcome?;
    info!("Registered {}", entry.label());
    Ok(())
}

async fn punch_once(config: &KioskConfig, action: PunchAction) -> Result<()> {
    let surface = Arc::new(MemorySurface::new());
    let controller = AttendanceController::new(
        WorkflowSettings::from_config(config),
        ConfiguredCamera::from_config(&config.camera),
        HttpBackend::new(&config.backend)?,
        surface.clone(),
        ActivityLog::new(),
    );

    let outcome = async {
        controller.load().await?;
        controller.punch(action).await
    }
    .await;
    controller.unload().await;

    println!("{}", surface.text(PUNCH_MESSAGE));
    println!("{}", surface.text(IDENTIFY_RESULT));
    outcome?;
    Ok(())
}

async fn run_registration(config: &KioskConfig, user_id: &str, name: &str) -> Result<()> {
    let surface = MemorySurface::new();
    surface.set_input(USER_ID_INPUT, user_id);
    surface.set_input(NAME_INPUT, name);
    let controller = Arc::new(RegistrationController::new(
        WorkflowSettings::from_config(config),
        ConfiguredCamera::from_config(&config.camera),
        HttpBackend::new(&config.backend)?,
        Arc::new(surface.clone()),
        ActivityLog::new(),
    ));

    let (log_tx, log_rx) = std::sync::mpsc::channel();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    report(&log_tx, "load", controller.load().await.map(|_| "camera ready".into()));

    let summary = format!("{} -> {}", user_id, config.backend.base_url);
    let ui_surface = surface.clone();
    let ui = tokio::task::spawn_blocking(move || {
        ui::run(Page::Register, ui_surface, cmd_tx, log_rx, summary)
    });

    while let Some(command) = cmd_rx.recv().await {
        let controller = controller.clone();
        let log = log_tx.clone();
        match command {
            KeyCommand::Quit => break,
            KeyCommand::Capture => {
                tokio::spawn(async move {
                    let captured = controller.capture().await;
                    report(&log, "capture", captured.map(|frame| {
                        format!("{}x{} {} bytes", frame.width, frame.height, frame.data_uri.len())
                    }));
                });
            }
            KeyCommand::Retake => {
                report(&log, "retake", controller.retake().map(|_| "live view".into()));
            }
            KeyCommand::Submit => {
                tokio::spawn(async move {
                    let submitted = controller.submit().await;
                    report(&log, "submit", submitted.map(|entry| entry.label()));
                });
            }
            KeyCommand::DeleteLast => {
                let last = surface.items(USER_LIST).pop();
                match last {
                    Some((key, _)) => {
                        tokio::spawn(async move {
                            let removed = controller.remove_user(&key).await;
                            report(&log, "delete", removed.map(|_| format!("removed {key}")));
                        });
                    }
                    None => report(&log, "delete", Err("no users to remove")),
                }
            }
            KeyCommand::PunchIn | KeyCommand::PunchOut => {}
        }
    }

    controller.unload().await;
    drop(log_tx);
    ui.await??;
    Ok(())
}

async fn run_attendance(config: &KioskConfig) -> Result<()> {
    let surface = MemorySurface::new();
    let controller = Arc::new(AttendanceController::new(
        WorkflowSettings::from_config(config),
        ConfiguredCamera::from_config(&config.camera),
        HttpBackend::new(&config.backend)?,
        Arc::new(surface.clone()),
        ActivityLog::new(),
    ));

    let (log_tx, log_rx) = std::sync::mpsc::channel();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    report(&log_tx, "load", controller.load().await.map(|_| "camera ready".into()));

    let summary = config.backend.base_url.clone();
    let ui = tokio::task::spawn_blocking(move || {
        ui::run(Page::Attend, surface, cmd_tx, log_rx, summary)
    });

    while let Some(command) = cmd_rx.recv().await {
        let action = match command {
            KeyCommand::Quit => break,
            KeyCommand::PunchIn => PunchAction::In,
            KeyCommand::PunchOut => PunchAction::Out,
            _ => continue,
        };
        let controller = controller.clone();
        let log = log_tx.clone();
        tokio::spawn(async move {
            let punched = controller.punch(action).await;
            report(&log, action.label(), punched.map(|receipt| receipt.message));
        });
    }

    controller.unload().await;
    drop(log_tx);
    ui.await??;
    Ok(())
}

fn report<E: std::fmt::Display>(
    log: &std::sync::mpsc::Sender<UiMessage>,
    step: &str,
    outcome: std::result::Result<String, E>,
) {
    let message = match outcome {
        Ok(detail) => UiMessage::Info(format!("{step}: {detail}")),
        Err(err) => UiMessage::Error(format!("{step}: {err}")),
    };
    // The receiver is gone once the terminal closes.
    let _ = log.send(message);
}

fn load_config(explicit: Option<PathBuf>) -> KioskConfig {
    let from_env = env::var("KIOSK_CONFIG").ok().map(PathBuf::from);
    let path = explicit
        .or(from_env)
        .unwrap_or_else(|| PathBuf::from("configs/kiosk.toml"));
    match KioskConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            default_config()
        }
    }
}

fn default_config() -> KioskConfig {
    let config = KioskConfig::default();
    debug_assert!(config.validate().is_ok());
    config
}
