//! CLI commands for Mission Deck using clap.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{get_home_dir, load_settings_or_default, Settings};
use crate::daemon::{shutdown_signal, BackgroundTasks};
use crate::mission::AgentRegistry;
use crate::realtime::{ConnectionState, RealtimeClient};
use crate::telegram::{Channel, ChannelSelector};
use crate::web::{run_server, AppState, WebServerConfig};

/// Mission Deck - mission control for a team of agents.
#[derive(Parser)]
#[command(name = "mission-deck")]
#[command(version)]
#[command(about = "Mission Deck - realtime mission control for agents", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway, WebSocket push, status refresh and relay polling
    Serve {
        /// Bind address
        #[arg(long, env = "MISSION_DECK_HOST")]
        host: Option<String>,

        /// Bind port
        #[arg(short, long, env = "MISSION_DECK_PORT")]
        port: Option<u16>,

        /// Workspace directory to list
        #[arg(short, long, env = "MISSION_DECK_WORKSPACE")]
        workspace: Option<PathBuf>,
    },

    /// Build one snapshot and print it as JSON
    Snapshot {
        /// Workspace directory to list
        #[arg(short, long, env = "MISSION_DECK_WORKSPACE")]
        workspace: Option<PathBuf>,
    },

    /// Manage configured agents
    #[command(subcommand, alias = "a")]
    Agents(AgentsCommand),

    /// Follow a running gateway over WebSocket
    Watch {
        /// WebSocket URL, e.g. ws://127.0.0.1:3333/ws
        url: String,
    },

    /// Show or switch the relay channel
    Channel {
        /// Channel name: telegram, none
        name: Option<String>,

        /// Persist the choice to settings
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
pub enum AgentsCommand {
    /// List configured agents
    List,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Serve { host, port, workspace } => {
                cmd_serve(host.clone(), *port, workspace.clone()).await
            }
            Command::Snapshot { workspace } => cmd_snapshot(workspace.clone()).await,
            Command::Agents(AgentsCommand::List) => cmd_agents_list(),
            Command::Watch { url } => cmd_watch(url).await,
            Command::Channel { name, save } => cmd_channel(name.as_deref(), *save),
        }
    }
}

fn settings_with_workspace(workspace: Option<PathBuf>) -> Settings {
    let mut settings = load_settings_or_default();
    if workspace.is_some() {
        settings.workspace.path = workspace;
    }
    settings
}

async fn cmd_serve(host: Option<String>, port: Option<u16>, workspace: Option<PathBuf>) -> Result<()> {
    let settings = settings_with_workspace(workspace);
    let home = get_home_dir()?;
    std::fs::create_dir_all(&home).with_context(|| format!("creating {}", home.display()))?;

    let (state, relay) = AppState::from_settings(&settings, &home)?;
    tracing::info!(
        "Workspace: {}, relay channel: {}",
        settings.workspace.resolve().display(),
        state.channels.active()
    );

    let mut tasks = BackgroundTasks::new();
    tasks.spawn_status_refresh(
        Arc::clone(&state.synth),
        Duration::from_secs(settings.status.refresh_interval_secs.max(1)),
    );
    if let Some(relay) = relay {
        tasks.spawn_relay_poll(
            relay,
            Arc::clone(&state.store),
            Duration::from_secs(settings.channels.telegram.poll_interval_secs.max(1)),
        );
    }

    let config = WebServerConfig {
        host: host.unwrap_or(settings.web.host),
        port: port.unwrap_or(settings.web.port),
    };
    let served = run_server(state, config, shutdown_signal()).await;

    tasks.shutdown().await;
    served?;
    Ok(())
}

async fn cmd_snapshot(workspace: Option<PathBuf>) -> Result<()> {
    let settings = settings_with_workspace(workspace);
    let home = get_home_dir()?;
    let (state, _) = AppState::from_settings(&settings, &home)?;

    let snapshot = state.synth.build_snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn cmd_agents_list() -> Result<()> {
    let registry = AgentRegistry::open(get_home_dir()?)?;
    let agents = registry.list();
    if agents.is_empty() {
        println!("No configured agents.");
        return Ok(());
    }

    println!("Configured agents:");
    for agent in agents {
        println!("  {} - {} ({}, {})", agent.id, agent.name, agent.role, agent.model);
    }
    Ok(())
}

async fn cmd_watch(url: &str) -> Result<()> {
    let client = RealtimeClient::new(url);
    let mut states = client.subscribe_state();
    client.start();

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let ctrl_c = shutdown_signal();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                println!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), state);
            }
            _ = ticker.tick() => {
                if client.state() == ConnectionState::Connected {
                    let view = client.view();
                    println!(
                        "  agents: {}, tasks: {}, chat: {}, channel: {}",
                        view.snapshot.agents.len(),
                        view.snapshot.tasks.len(),
                        view.snapshot.chat_messages.len(),
                        view.active_channel.as_deref().unwrap_or("-"),
                    );
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    client.disconnect().await;
    Ok(())
}

fn cmd_channel(name: Option<&str>, save: bool) -> Result<()> {
    let settings = load_settings_or_default();
    let selector = ChannelSelector::new(Channel::from_settings(&settings));

    let Some(name) = name else {
        println!("Active channel: {}", selector.active());
        println!("Available: {}", Channel::available().join(", "));
        return Ok(());
    };

    let previous = selector.switch(name)?;
    if save {
        selector.save()?;
        println!("Relay channel: {} -> {} (saved)", previous, selector.active());
    } else {
        println!(
            "Relay channel: {} -> {} (not saved; pass --save to persist)",
            previous,
            selector.active()
        );
    }
    Ok(())
}
