//! Canonical battle state and the snapshot normalizer.
//!
//! Servers (and older server builds) push battle snapshots in several shapes:
//! the turn may be nested under `currentTurn` or flattened onto the root, the
//! current player may be embedded as an object or referenced by id, and any
//! field can be missing or carry the wrong JSON type. [`RawSnapshot`] absorbs
//! all of that at the boundary; [`normalize`] turns it into one [`BattleState`].
//!
//! Normalization is total and idempotent: serializing a [`BattleState`] and
//! normalizing it again yields the same state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::team::{resolve_team, Team};

/// Avatar shown when a player has none.
pub const DEFAULT_AVATAR: &str = "/uploads/avatars/default.svg";

/// `maxHp` assumed when the server omits it.
pub const DEFAULT_MAX_HP: u32 = 100;

// ── Canonical model ─────────────────────────────────────────────────

/// Lifecycle of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Waiting,
    Active,
    Paused,
    Ended,
}

impl Status {
    /// Parse a wire status. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Status> {
        match raw {
            "waiting" => Some(Status::Waiting),
            "active" => Some(Status::Active),
            "paused" => Some(Status::Paused),
            "ended" => Some(Status::Ended),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Waiting => "waiting",
            Status::Active => "active",
            Status::Paused => "paused",
            Status::Ended => "ended",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Status::Waiting => "대기 중",
            Status::Active => "진행 중",
            Status::Paused => "일시정지",
            Status::Ended => "종료됨",
        }
    }
}

/// Sub-state of the turn cycle.
///
/// Phases the client does not know are preserved verbatim in [`Phase::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    #[default]
    Waiting,
    /// `A_select` / `B_select`: the named team is choosing actions.
    TeamSelect(Team),
    Resolve,
    /// Waiting period between rounds.
    Inter,
    TeamAction,
    Processing,
    Switching,
    Other(String),
}

impl Phase {
    /// Parse a wire phase. Empty strings are treated as `waiting`.
    pub fn parse(raw: &str) -> Phase {
        match raw {
            "" | "waiting" => Phase::Waiting,
            "A_select" => Phase::TeamSelect(Team::A),
            "B_select" => Phase::TeamSelect(Team::B),
            "resolve" => Phase::Resolve,
            "inter" => Phase::Inter,
            "team_action" => Phase::TeamAction,
            "processing" => Phase::Processing,
            "switching" => Phase::Switching,
            other => Phase::Other(other.to_string()),
        }
    }

    /// The wire spelling of this phase.
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Waiting => "waiting",
            Phase::TeamSelect(Team::A) => "A_select",
            Phase::TeamSelect(Team::B) => "B_select",
            Phase::Resolve => "resolve",
            Phase::Inter => "inter",
            Phase::TeamAction => "team_action",
            Phase::Processing => "processing",
            Phase::Switching => "switching",
            Phase::Other(raw) => raw,
        }
    }

    /// The team a `<team>_select` phase names.
    pub fn selecting_team(&self) -> Option<Team> {
        match self {
            Phase::TeamSelect(team) => Some(*team),
            _ => None,
        }
    }

    /// Display label.
    pub fn label(&self) -> String {
        match self {
            Phase::TeamSelect(team) => format!("{} 선택 중", team.label()),
            Phase::Resolve => "라운드 해석 중".to_string(),
            Phase::Inter => "다음 라운드 대기".to_string(),
            Phase::TeamAction => "행동 페이즈".to_string(),
            Phase::Processing => "결과 처리 중".to_string(),
            Phase::Switching => "팀 교체 중".to_string(),
            Phase::Waiting | Phase::Other(_) => "대기 중".to_string(),
        }
    }
}

impl From<String> for Phase {
    fn from(raw: String) -> Self {
        Phase::parse(&raw)
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.as_str().to_string()
    }
}

/// Combat stats of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub attack: i32,
    pub defense: i32,
    pub agility: i32,
    pub luck: i32,
}

/// Consumable item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Dittany,
    AttackBooster,
    DefenseBooster,
}

impl ItemKind {
    /// Map a wire key to an item kind, returning whether it was the
    /// canonical spelling.
    fn from_wire(key: &str) -> Option<(ItemKind, bool)> {
        match key {
            "dittany" => Some((ItemKind::Dittany, true)),
            "ditany" => Some((ItemKind::Dittany, false)),
            "attackBooster" => Some((ItemKind::AttackBooster, true)),
            "attack_boost" => Some((ItemKind::AttackBooster, false)),
            "defenseBooster" => Some((ItemKind::DefenseBooster, true)),
            "defense_boost" => Some((ItemKind::DefenseBooster, false)),
            _ => None,
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            ItemKind::Dittany => "디터니",
            ItemKind::AttackBooster => "공격 보정기",
            ItemKind::DefenseBooster => "방어 보정기",
        }
    }
}

/// Coarse HP band used for bar colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpBand {
    High,
    Medium,
    Low,
}

/// A combatant.
///
/// `hp` and `max_hp` are clamped during normalization: `1 <= max_hp` and
/// `0 <= hp <= max_hp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub team: Option<Team>,
    pub hp: u32,
    pub max_hp: u32,
    pub avatar: Option<String>,
    pub stats: Stats,
    pub items: BTreeMap<ItemKind, u32>,
    pub ready: bool,
    /// Server-reported flag: this player already acted in the current turn.
    pub has_acted: bool,
}

impl Player {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn avatar_or_default(&self) -> &str {
        self.avatar.as_deref().unwrap_or(DEFAULT_AVATAR)
    }

    /// Number of `kind` items held.
    pub fn item_count(&self, kind: ItemKind) -> u32 {
        self.items.get(&kind).copied().unwrap_or(0)
    }

    /// HP as a percentage in `0.0..=100.0`.
    pub fn hp_percent(&self) -> f64 {
        let max = f64::from(self.max_hp.max(1));
        (f64::from(self.hp) / max * 100.0).clamp(0.0, 100.0)
    }

    pub fn hp_band(&self) -> HpBand {
        let pct = self.hp_percent();
        if pct > 60.0 {
            HpBand::High
        } else if pct > 30.0 {
            HpBand::Medium
        } else {
            HpBand::Low
        }
    }
}

/// Whose turn it is and how long is left.
///
/// Rebuilt from scratch on every normalization pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnInfo {
    pub current_player: Option<Player>,
    pub current_team: Option<Team>,
    pub time_left_sec: u32,
    pub phase: Phase,
    pub turn_number: u32,
}

/// The canonical battle state every consumer reads from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleState {
    pub id: Option<String>,
    pub status: Status,
    pub players: Vec<Player>,
    pub current_turn: TurnInfo,
    pub phase: Phase,
}

impl BattleState {
    /// Look up a player by id.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Players on `team`, in roster order.
    pub fn team_members(&self, team: Team) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(move |p| p.team == Some(team))
    }

    /// Living players on the other side from `viewer_id`.
    pub fn targets_for(&self, viewer_id: &str) -> Vec<&Player> {
        let Some(me) = self.player(viewer_id) else {
            return Vec::new();
        };
        self.players
            .iter()
            .filter(|p| p.team != me.team && p.is_alive())
            .collect()
    }
}

// ── Wire shapes ─────────────────────────────────────────────────────

/// Field-level leniency: a present field with the wrong JSON type behaves as
/// if it were absent.
pub(crate) mod lenient {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{RawPlayer, RawTurn};

    /// Non-empty string or integer id.
    pub(crate) fn id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Non-empty string.
    pub(crate) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
    }

    /// Finite JSON number.
    pub(crate) fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(Value::deserialize(d)?.as_f64().filter(|n| n.is_finite()))
    }

    pub(crate) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(matches!(Value::deserialize(d)?, Value::Bool(true)))
    }

    /// Embedded object; anything else is absent.
    pub(crate) fn player<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RawPlayer>, D::Error> {
        let value = Value::deserialize(d)?;
        if !value.is_object() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value).ok())
    }

    /// Nested turn block; anything but an object is absent.
    pub(crate) fn turn<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RawTurn>, D::Error> {
        let value = Value::deserialize(d)?;
        if !value.is_object() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value).ok())
    }

    /// Array of objects; non-arrays become empty and non-object elements are skipped.
    pub(crate) fn players<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RawPlayer>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub(crate) fn object<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        })
    }
}

/// A player as it arrives on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlayer {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub team: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub hp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub max_hp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub stats: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub items: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub ready: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub has_acted: bool,
}

/// The nested `currentTurn` block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTurn {
    #[serde(default, deserialize_with = "lenient::player")]
    pub current_player: Option<RawPlayer>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub player_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub current_team: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub time_left_sec: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phase: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub turn_number: Option<f64>,
}

/// Every snapshot field any server build has been seen to send.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnapshot {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    pub battle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::players")]
    pub players: Vec<RawPlayer>,
    #[serde(default, deserialize_with = "lenient::turn")]
    pub current_turn: Option<RawTurn>,
    /// Flat shape: current player embedded at the root.
    #[serde(default, deserialize_with = "lenient::player")]
    pub current: Option<RawPlayer>,
    /// Flat shape: current player referenced at the root.
    #[serde(default, deserialize_with = "lenient::id")]
    pub current_player_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phase: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub time_left_sec: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub turn_number: Option<f64>,
}

/// How a snapshot identifies the current player.
#[derive(Debug, Clone)]
pub enum TurnSource {
    /// A full player object was embedded.
    Embedded(RawPlayer),
    /// Only an id was sent; resolve it against the roster.
    Reference(String),
    Absent,
}

impl RawSnapshot {
    /// Parse any JSON value. Non-objects yield an empty snapshot.
    pub fn from_value(value: &Value) -> RawSnapshot {
        if !value.is_object() {
            return RawSnapshot::default();
        }
        RawSnapshot::deserialize(value).unwrap_or_default()
    }

    /// Battle id under either field name.
    pub fn battle_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.battle_id.as_deref())
    }

    fn turn(&self) -> Option<&RawTurn> {
        self.current_turn.as_ref()
    }

    /// Pick the current-player source. Embedded beats reference; nested
    /// beats root within each.
    pub fn turn_source(&self) -> TurnSource {
        let embedded = self
            .turn()
            .and_then(|t| t.current_player.as_ref())
            .filter(|p| p.id.is_some())
            .or_else(|| self.current.as_ref().filter(|p| p.id.is_some()));
        if let Some(player) = embedded {
            return TurnSource::Embedded(player.clone());
        }

        let reference = self
            .turn()
            .and_then(|t| t.player_id.as_deref())
            .or(self.current_player_id.as_deref());
        match reference {
            Some(id) => TurnSource::Reference(id.to_string()),
            None => TurnSource::Absent,
        }
    }

    /// Team carried by an embedded current player that has no id.
    fn anonymous_current_team(&self) -> Option<Team> {
        self.turn()
            .and_then(|t| t.current_player.as_ref())
            .or(self.current.as_ref())
            .and_then(|p| p.team.as_deref())
            .and_then(resolve_team)
    }

    fn phase(&self) -> Phase {
        self.turn()
            .and_then(|t| t.phase.as_deref())
            .or(self.phase.as_deref())
            .map(Phase::parse)
            .unwrap_or_default()
    }

    fn time_left_sec(&self) -> u32 {
        self.turn()
            .and_then(|t| t.time_left_sec)
            .or(self.time_left_sec)
            .map(to_count)
            .unwrap_or(0)
    }

    fn turn_number(&self) -> u32 {
        self.turn()
            .and_then(|t| t.turn_number)
            .or(self.turn_number)
            .map(to_count)
            .unwrap_or(0)
    }
}

/// Truncate toward zero and clamp into `u32`.
fn to_count(n: f64) -> u32 {
    if n <= 0.0 {
        0
    } else if n >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        n as u32
    }
}

fn to_stat(value: Option<&Value>) -> i32 {
    match value.and_then(Value::as_f64).filter(|n| n.is_finite()) {
        Some(n) => n.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32,
        None => 0,
    }
}

fn normalize_items(raw: &BTreeMap<String, Value>) -> BTreeMap<ItemKind, u32> {
    let mut items = BTreeMap::new();
    for (key, value) in raw {
        let Some((kind, canonical)) = ItemKind::from_wire(key) else {
            continue;
        };
        let Some(count) = value.as_f64().filter(|n| n.is_finite()).map(to_count) else {
            continue;
        };
        if canonical {
            items.insert(kind, count);
        } else {
            items.entry(kind).or_insert(count);
        }
    }
    items
}

/// Normalize a single wire player. Players without an id are unusable and
/// yield `None`.
pub fn normalize_player(raw: &RawPlayer) -> Option<Player> {
    let id = raw.id.clone()?;

    let max_hp = match raw.max_hp {
        Some(n) if n != 0.0 => to_count(n).max(1),
        _ => DEFAULT_MAX_HP,
    };
    let hp = raw.hp.map(to_count).unwrap_or(0).min(max_hp);

    Some(Player {
        id,
        name: raw.name.clone().unwrap_or_default(),
        team: raw.team.as_deref().and_then(resolve_team),
        hp,
        max_hp,
        avatar: raw.avatar.clone(),
        stats: Stats {
            attack: to_stat(raw.stats.get("attack")),
            defense: to_stat(raw.stats.get("defense")),
            agility: to_stat(raw.stats.get("agility")),
            luck: to_stat(raw.stats.get("luck")),
        },
        items: normalize_items(&raw.items),
        ready: raw.ready,
        has_acted: raw.has_acted,
    })
}

/// Build a [`BattleState`] from an already-parsed wire snapshot.
pub fn normalize_raw(raw: &RawSnapshot) -> BattleState {
    let players: Vec<Player> = raw.players.iter().filter_map(normalize_player).collect();
    let status = match raw.status.as_deref() {
        None => Status::Waiting,
        Some(s) => Status::parse(s).unwrap_or_else(|| {
            debug!(status = s, "unknown battle status, treating as waiting");
            Status::Waiting
        }),
    };

    let current_player = match raw.turn_source() {
        TurnSource::Embedded(player) => normalize_player(&player),
        TurnSource::Reference(id) => players.iter().find(|p| p.id == id).cloned(),
        TurnSource::Absent => None,
    };

    let phase = raw.phase();

    let current_team = raw
        .turn()
        .and_then(|t| t.current_team.as_deref())
        .and_then(resolve_team)
        .or_else(|| current_player.as_ref().and_then(|p| p.team))
        .or_else(|| raw.anonymous_current_team())
        .or_else(|| phase.selecting_team());

    BattleState {
        id: raw.battle_id().map(str::to_string),
        status,
        players,
        current_turn: TurnInfo {
            current_player,
            current_team,
            time_left_sec: raw.time_left_sec(),
            phase: phase.clone(),
            turn_number: raw.turn_number(),
        },
        phase,
    }
}

/// Normalize any JSON payload into a [`BattleState`]. Never fails.
///
/// ```
/// use battle_sync_client::snapshot::{normalize, Status};
/// use serde_json::json;
///
/// let state = normalize(&json!({}));
/// assert_eq!(state.status, Status::Waiting);
/// assert!(state.players.is_empty());
/// assert_eq!(state.current_turn.time_left_sec, 0);
/// ```
pub fn normalize(value: &Value) -> BattleState {
    normalize_raw(&RawSnapshot::from_value(value))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renormalize(state: &BattleState) -> BattleState {
        normalize(&serde_json::to_value(state).unwrap())
    }

    #[test]
    fn empty_object_gets_all_defaults() {
        let state = normalize(&json!({}));
        assert_eq!(state.id, None);
        assert_eq!(state.status, Status::Waiting);
        assert!(state.players.is_empty());
        assert_eq!(state.current_turn.current_player, None);
        assert_eq!(state.current_turn.current_team, None);
        assert_eq!(state.current_turn.time_left_sec, 0);
        assert_eq!(state.current_turn.phase, Phase::Waiting);
        assert_eq!(state.current_turn.turn_number, 0);
        assert_eq!(state.phase, Phase::Waiting);
    }

    #[test]
    fn non_object_payloads_normalize_to_defaults() {
        for value in [json!(null), json!("battle"), json!(42), json!([1, 2])] {
            assert_eq!(normalize(&value), BattleState::default());
        }
    }

    #[test]
    fn id_falls_back_to_battle_id() {
        assert_eq!(normalize(&json!({"battleId": "b9"})).id.as_deref(), Some("b9"));
        assert_eq!(
            normalize(&json!({"id": "b1", "battleId": "b9"})).id.as_deref(),
            Some("b1")
        );
        assert_eq!(
            normalize(&json!({"id": null, "battleId": 7})).id.as_deref(),
            Some("7")
        );
    }

    #[test]
    fn non_array_players_become_empty() {
        let state = normalize(&json!({"players": {"p1": {"id": "p1"}}}));
        assert!(state.players.is_empty());
        let state = normalize(&json!({"players": [1, "x", {"id": "p1"}, {"name": "no id"}]}));
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].id, "p1");
    }

    #[test]
    fn hp_is_clamped_and_max_hp_floored() {
        let state = normalize(&json!({"players": [
            {"id": "p1", "hp": 150, "maxHp": 100},
            {"id": "p2", "hp": -5, "maxHp": 80},
            {"id": "p3", "hp": 10, "maxHp": -3},
            {"id": "p4", "hp": "lots"},
        ]}));
        let hp: Vec<(u32, u32)> = state.players.iter().map(|p| (p.hp, p.max_hp)).collect();
        assert_eq!(hp, vec![(100, 100), (0, 80), (1, 1), (0, DEFAULT_MAX_HP)]);
    }

    #[test]
    fn embedded_current_player_wins_over_reference() {
        let state = normalize(&json!({
            "players": [{"id": "p1", "team": "A"}, {"id": "p2", "team": "B"}],
            "currentTurn": {"currentPlayer": {"id": "p2", "team": "B"}, "playerId": "p1"}
        }));
        assert_eq!(state.current_turn.current_player.unwrap().id, "p2");
    }

    #[test]
    fn reference_is_resolved_against_roster() {
        let state = normalize(&json!({
            "players": [{"id": "p1", "team": "team_a", "hp": 50, "maxHp": 100}],
            "currentTurn": {"playerId": "p1"}
        }));
        let current = state.current_turn.current_player.unwrap();
        assert_eq!(current.id, "p1");
        assert_eq!(current.hp, 50);
        assert_eq!(state.current_turn.current_team, Some(Team::A));
    }

    #[test]
    fn unknown_reference_yields_no_current_player() {
        let state = normalize(&json!({
            "players": [{"id": "p1"}],
            "currentTurn": {"playerId": "ghost"}
        }));
        assert_eq!(state.current_turn.current_player, None);
    }

    #[test]
    fn flat_root_shapes_are_recognised() {
        let state = normalize(&json!({
            "players": [{"id": "p1", "team": "B"}],
            "currentPlayerId": "p1"
        }));
        assert_eq!(state.current_turn.current_player.unwrap().id, "p1");

        let state = normalize(&json!({"current": {"id": "p7", "team": "A"}}));
        assert_eq!(state.current_turn.current_player.unwrap().id, "p7");
    }

    #[test]
    fn explicit_team_beats_player_team_beats_phase() {
        let state = normalize(&json!({
            "players": [{"id": "p1", "team": "A"}],
            "currentTurn": {"playerId": "p1", "currentTeam": "B"},
            "phase": "A_select"
        }));
        assert_eq!(state.current_turn.current_team, Some(Team::B));

        let state = normalize(&json!({
            "players": [{"id": "p1", "team": "B"}],
            "currentTurn": {"playerId": "p1"},
            "phase": "A_select"
        }));
        assert_eq!(state.current_turn.current_team, Some(Team::B));

        let state = normalize(&json!({"phase": "A_select"}));
        assert_eq!(state.current_turn.current_team, Some(Team::A));
        let state = normalize(&json!({"phase": "B_select"}));
        assert_eq!(state.current_turn.current_team, Some(Team::B));
    }

    #[test]
    fn nested_values_beat_root_values() {
        let state = normalize(&json!({
            "timeLeftSec": 30,
            "phase": "resolve",
            "turnNumber": 2,
            "currentTurn": {"timeLeftSec": 12, "phase": "inter", "turnNumber": 5}
        }));
        assert_eq!(state.current_turn.time_left_sec, 12);
        assert_eq!(state.current_turn.phase, Phase::Inter);
        assert_eq!(state.current_turn.turn_number, 5);
    }

    #[test]
    fn non_numeric_nested_time_falls_back_to_root() {
        let state = normalize(&json!({
            "timeLeftSec": 30,
            "currentTurn": {"timeLeftSec": "soon"}
        }));
        assert_eq!(state.current_turn.time_left_sec, 30);
        let state = normalize(&json!({"timeLeftSec": -4}));
        assert_eq!(state.current_turn.time_left_sec, 0);
    }

    #[test]
    fn item_aliases_collapse_with_canonical_priority() {
        let state = normalize(&json!({"players": [{
            "id": "p1",
            "items": {"ditany": 1, "dittany": 3, "attack_boost": 2, "potion": 9}
        }]}));
        let p = &state.players[0];
        assert_eq!(p.item_count(ItemKind::Dittany), 3);
        assert_eq!(p.item_count(ItemKind::AttackBooster), 2);
        assert_eq!(p.item_count(ItemKind::DefenseBooster), 0);
        assert_eq!(p.items.len(), 2);
    }

    #[test]
    fn unknown_phase_is_preserved() {
        let state = normalize(&json!({"phase": "sudden_death"}));
        assert_eq!(state.phase, Phase::Other("sudden_death".into()));
        assert_eq!(renormalize(&state).phase.as_str(), "sudden_death");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            json!({}),
            json!({"battleId": "b2", "status": "paused", "phase": "B_select", "timeLeftSec": 9.7}),
            json!({
                "id": "b1",
                "status": "active",
                "players": [
                    {"id": "p1", "name": "Harry", "team": "phoenix", "hp": 120, "maxHp": 100,
                     "stats": {"attack": 3, "luck": 2}, "items": {"ditany": 2}, "ready": true},
                    {"id": "p2", "team": "죽음을 먹는 자", "hp": 40, "avatar": "/a.png", "hasActed": true}
                ],
                "currentTurn": {"playerId": "p2", "timeLeftSec": 17, "phase": "team_action", "turnNumber": 3}
            }),
            json!({"current": {"team": "B"}, "currentPlayerId": "nobody", "status": "bogus"}),
            json!(null),
            json!([1, "x"]),
            json!({"players": "nope", "currentTurn": 7}),
            json!({
                "players": [{"id": "p1", "maxHp": -3, "hp": -8, "items": {"attack_boost": 1}}],
                "currentPlayerId": "p1",
                "phase": "A_select",
                "currentTurn": {"timeLeftSec": -4, "phase": "inter"}
            }),
        ];
        for input in inputs {
            let once = normalize(&input);
            assert_eq!(renormalize(&once), once, "input {input}");
        }
    }

    #[test]
    fn anonymous_embedded_player_still_names_the_team() {
        let state = normalize(&json!({"currentTurn": {"currentPlayer": {"team": "B"}}}));
        assert_eq!(state.current_turn.current_player, None);
        assert_eq!(state.current_turn.current_team, Some(Team::B));
    }

    #[test]
    fn roster_helpers() {
        let state = normalize(&json!({"players": [
            {"id": "p1", "team": "A", "hp": 10},
            {"id": "p2", "team": "B", "hp": 0},
            {"id": "p3", "team": "B", "hp": 5},
        ]}));
        assert_eq!(state.team_members(Team::B).count(), 2);
        let targets: Vec<&str> = state.targets_for("p1").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(targets, vec!["p3"]);
        assert!(state.targets_for("ghost").is_empty());
    }

    #[test]
    fn hp_band_thresholds() {
        let mut p = normalize_player(&RawPlayer {
            id: Some("p".into()),
            hp: Some(61.0),
            max_hp: Some(100.0),
            ..RawPlayer::default()
        })
        .unwrap();
        assert_eq!(p.hp_band(), HpBand::High);
        p.hp = 31;
        assert_eq!(p.hp_band(), HpBand::Medium);
        p.hp = 30;
        assert_eq!(p.hp_band(), HpBand::Low);
        assert_eq!(p.avatar_or_default(), DEFAULT_AVATAR);
    }
}
