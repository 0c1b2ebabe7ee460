//! # Battle Sync Client
//!
//! Live client for turn-based team battles. It turns the server's noisy,
//! duplicated, loosely-shaped event stream into one consistent view of the
//! battle plus a throttled stream of player alerts.
//!
//! ## Layers
//!
//! - [`team`]: canonical team identity from the many wire spellings
//! - [`snapshot`]: lenient normalization of raw battle snapshots
//! - [`turn`]: turn ownership and the local action lock
//! - [`dedup`]: suppression of rapid re-deliveries
//! - [`timer`]: the display countdown
//! - [`notify`]: alert throttling and dispatch to visual/audio channels
//! - [`session`]: the reducer tying the above together per connection
//! - [`client`]: the async handle driving a [`Transport`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), battle_sync_client::BattleClientError> {
//! use battle_sync_client::{BattleClient, BattleEvent, ClientConfig, WebSocketTransport};
//!
//! let transport = WebSocketTransport::connect("ws://localhost:3001/battle").await?;
//! let config = ClientConfig::new("b1").with_token("t0k3n");
//! let (mut client, mut events) = BattleClient::start(transport, config);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         BattleEvent::Alert(alert) => println!("{}: {}", alert.title, alert.body),
//!         BattleEvent::BattleEnded { .. } => break,
//!         _ => {}
//!     }
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod dedup;
pub mod error;
pub mod event;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod snapshot;
pub mod team;
pub mod timer;
pub mod transport;
pub mod transports;
pub mod turn;

// Re-export primary types for ergonomic imports.
pub use client::{BattleClient, ClientConfig};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{BattleClientError, Result};
pub use event::{BattleEvent, ChatLine, LogEntry, LogKind};
pub use notify::{Alert, AlertChannel, AlertKind, LogCategory, Notifier, NotifyConfig};
pub use protocol::{ClientMessage, PlayerAction, ServerMessage};
pub use session::BattleSession;
pub use snapshot::{normalize, BattleState, ItemKind, Phase, Player, Status};
pub use team::{resolve_team, Team};
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
