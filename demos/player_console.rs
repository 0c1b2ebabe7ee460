//! # Player Console
//!
//! A terminal front end for one battle player:
//!
//! 1. Connect to the battle server via WebSocket
//! 2. Join the battle and authenticate with a player token
//! 3. Print the reconciled battle state, logs, chat and alerts
//! 4. Read intents from stdin
//! 5. Shut down gracefully on Ctrl+C, `quit` or disconnect
//!
//! ## Running
//!
//! ```sh
//! BATTLE_URL=ws://localhost:3001/battle BATTLE_ID=b1 BATTLE_TOKEN=t0k3n \
//!     cargo run --example player_console
//! ```
//!
//! ## Commands
//!
//! ```text
//! ready                     mark ready
//! attack <target-id>        attack a player
//! defend | dodge | pass     other actions
//! item <kind> [target-id]   use dittany / attackBooster / defenseBooster
//! say <text>                chat
//! mute | unmute             toggle alerts
//! quit
//! ```

use battle_sync_client::snapshot::BattleState;
use battle_sync_client::{
    BattleClient, BattleEvent, ClientConfig, ItemKind, PlayerAction, WebSocketTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_URL: &str = "ws://localhost:3001/battle";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=battle_sync_client=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("BATTLE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let battle_id = std::env::var("BATTLE_ID").unwrap_or_else(|_| "demo".to_string());
    let mut config = ClientConfig::new(battle_id);
    if let Ok(token) = std::env::var("BATTLE_TOKEN") {
        config = config.with_token(token);
    }
    if let Ok(name) = std::env::var("BATTLE_NAME") {
        config = config.with_player_name(name);
    }

    // ── Connect ─────────────────────────────────────────────────────
    tracing::info!("Connecting to {url}");
    let transport = WebSocketTransport::connect(&url).await?;
    let (mut client, mut events) = BattleClient::start(transport, config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };
                if !print_event(event) {
                    break;
                }
            }

            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                if line.trim() == "quit" {
                    break;
                }
                if let Err(e) = run_command(&client, &line).await {
                    println!("! {e}");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Print one event. Returns `false` once the connection is gone.
fn print_event(event: BattleEvent) -> bool {
    match event {
        BattleEvent::Connected => println!("* connected, authenticating..."),
        BattleEvent::IdentityConfirmed { player_id } => println!("* you are {player_id}"),
        BattleEvent::AuthFailed { reason } => println!("! authentication failed: {reason}"),
        BattleEvent::StateUpdated {
            state,
            my_turn,
            can_act,
        } => print_state(&state, my_turn, can_act),
        BattleEvent::Log(entry) => println!("[log] {}", entry.message),
        BattleEvent::Chat(line) => println!("<{}> {}", line.sender, line.message),
        BattleEvent::Alert(alert) => println!("(!) {}: {}", alert.title, alert.body),
        BattleEvent::ActionAccepted => println!("* action accepted"),
        BattleEvent::ActionRejected { reason } => println!("! action rejected: {reason}"),
        BattleEvent::ControlsChanged { can_act } => {
            println!("* controls {}", if can_act { "open" } else { "locked" });
        }
        BattleEvent::BattleEnded { winner } => match winner {
            Some(team) => println!("* battle over, {} wins", team.label()),
            None => println!("* battle over"),
        },
        BattleEvent::Disconnected { reason } => {
            println!("* disconnected: {}", reason.as_deref().unwrap_or("server closed"));
            return false;
        }
    }
    true
}

fn print_state(state: &BattleState, my_turn: bool, can_act: bool) {
    println!(
        "── {} · {} · {}s left{}",
        state.status.label(),
        state.current_turn.phase.label(),
        state.current_turn.time_left_sec,
        if my_turn { " · YOUR TURN" } else { "" }
    );
    for p in &state.players {
        let team = p.team.map(|t| t.code()).unwrap_or("-");
        println!("   [{team}] {:<12} {:>3}/{:<3} ({})", p.name, p.hp, p.max_hp, p.id);
    }
    if my_turn && !can_act {
        println!("   (waiting for your last action to resolve)");
    }
}

async fn run_command(client: &BattleClient, line: &str) -> battle_sync_client::Result<()> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(());
    };
    let target = words.next().map(str::to_string);

    match cmd {
        "ready" => {
            client.mark_ready().await?;
        }
        "attack" => {
            let Some(target_id) = target else {
                println!("usage: attack <target-id>");
                return Ok(());
            };
            client.submit_action(PlayerAction::Attack { target_id }).await?;
        }
        "defend" => {
            client.submit_action(PlayerAction::Defend).await?;
        }
        "dodge" => {
            client.submit_action(PlayerAction::Dodge).await?;
        }
        "pass" => {
            client.submit_action(PlayerAction::Pass).await?;
        }
        "item" => {
            let item = match target.as_deref() {
                Some("dittany") => ItemKind::Dittany,
                Some("attackBooster") => ItemKind::AttackBooster,
                Some("defenseBooster") => ItemKind::DefenseBooster,
                _ => {
                    println!("usage: item <dittany|attackBooster|defenseBooster> [target-id]");
                    return Ok(());
                }
            };
            let target_id = words.next().map(str::to_string);
            client
                .submit_action(PlayerAction::Item { item, target_id })
                .await?;
        }
        "say" => {
            let text = line.trim_start().trim_start_matches("say");
            client.send_chat(text).await?;
        }
        "mute" => client.set_notifications_enabled(false)?,
        "unmute" => client.set_notifications_enabled(true)?,
        other => println!("unknown command '{other}'"),
    }
    Ok(())
}
