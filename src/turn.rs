//! Turn ownership and the local "can I act" gate.

use tracing::debug;

use crate::snapshot::{BattleState, ItemKind, Phase, Status};

/// Decide whether it is `my_id`'s turn.
///
/// The first applicable signal wins:
/// 1. an explicit current player id (team ignored),
/// 2. a `<team>_select` phase,
/// 3. the current team,
/// 4. otherwise not my turn.
///
/// Returns `false` when the viewer is unknown, absent from the roster, or the
/// battle has ended.
///
/// ```
/// use battle_sync_client::snapshot::normalize;
/// use battle_sync_client::turn::is_my_turn;
/// use serde_json::json;
///
/// let state = normalize(&json!({
///     "status": "active",
///     "players": [{"id": "p1", "team": "A"}],
///     "currentTurn": {"currentPlayer": {"id": "p1"}, "currentTeam": "B"}
/// }));
/// assert!(is_my_turn(&state, Some("p1")));
/// assert!(!is_my_turn(&state, None));
/// ```
pub fn is_my_turn(state: &BattleState, my_id: Option<&str>) -> bool {
    let Some(my_id) = my_id else {
        return false;
    };
    let Some(me) = state.player(my_id) else {
        return false;
    };
    if state.status == Status::Ended {
        return false;
    }

    let turn = &state.current_turn;
    if let Some(current) = &turn.current_player {
        return current.id == my_id;
    }
    if let Some(team) = turn.phase.selecting_team() {
        return me.team == Some(team);
    }
    if let Some(team) = turn.current_team {
        return me.team == Some(team);
    }
    false
}

/// Identifies one turn window; a change means the gate may reopen.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TurnKey {
    turn_number: u32,
    phase: Phase,
}

impl TurnKey {
    fn of(state: &BattleState) -> Self {
        Self {
            turn_number: state.current_turn.turn_number,
            phase: state.current_turn.phase.clone(),
        }
    }
}

/// Locally-owned lock over the action controls.
///
/// Submitting locks it. A rejection (server error, negative or missing
/// acknowledgment) unlocks it. A success keeps it locked until the server
/// moves to another turn window.
#[derive(Debug, Default)]
pub struct ActionGate {
    locked_at: Option<Option<TurnKey>>,
}

impl ActionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// Lock on submit, remembering the turn window it was submitted in.
    pub fn lock(&mut self, state: Option<&BattleState>) {
        self.locked_at = Some(state.map(TurnKey::of));
    }

    /// Reopen after the server refused the action.
    pub fn release(&mut self) {
        if self.locked_at.take().is_some() {
            debug!("action gate released");
        }
    }

    /// Reopen once the server has moved on to another turn window.
    pub fn observe(&mut self, state: &BattleState) {
        if state.status == Status::Ended {
            return;
        }
        if let Some(locked) = &self.locked_at {
            if locked.as_ref() != Some(&TurnKey::of(state)) {
                debug!(
                    turn_number = state.current_turn.turn_number,
                    phase = state.current_turn.phase.as_str(),
                    "turn window changed, action gate reopened"
                );
                self.locked_at = None;
            }
        }
    }

    /// Whether the viewer may submit an action right now.
    pub fn can_act(&self, state: &BattleState, my_id: Option<&str>) -> bool {
        let Some(me) = my_id.and_then(|id| state.player(id)) else {
            return false;
        };
        state.status == Status::Active
            && me.is_alive()
            && !me.has_acted
            && !self.is_locked()
            && is_my_turn(state, my_id)
    }

    /// Whether the viewer may use an item of `kind` right now.
    pub fn can_use_item(&self, state: &BattleState, my_id: Option<&str>, kind: ItemKind) -> bool {
        let held = my_id
            .and_then(|id| state.player(id))
            .map(|p| p.item_count(kind))
            .unwrap_or(0);
        held > 0 && self.can_act(state, my_id)
    }
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
    use crate::snapshot::normalize;
    use serde_json::{json, Value};

    fn state(turn: Value, phase: &str) -> BattleState {
        normalize(&json!({
            "id": "b1",
            "status": "active",
            "phase": phase,
            "players": [
                {"id": "p1", "team": "A", "hp": 50, "maxHp": 100, "items": {"dittany": 1}},
                {"id": "p2", "team": "B", "hp": 50, "maxHp": 100},
            ],
            "currentTurn": turn
        }))
    }

    #[test]
    fn player_signal_overrides_team_signal() {
        let s = state(json!({"currentPlayer": {"id": "p1"}, "currentTeam": "B"}), "");
        assert!(is_my_turn(&s, Some("p1")));
        assert!(!is_my_turn(&s, Some("p2")));
    }

    #[test]
    fn select_phase_overrides_current_team() {
        let s = state(json!({"currentTeam": "B"}), "A_select");
        assert!(is_my_turn(&s, Some("p1")));
        assert!(!is_my_turn(&s, Some("p2")));
    }

    #[test]
    fn current_team_decides_when_nothing_else_does() {
        let s = state(json!({"currentTeam": "team_b"}), "team_action");
        assert!(!is_my_turn(&s, Some("p1")));
        assert!(is_my_turn(&s, Some("p2")));
    }

    #[test]
    fn no_signal_means_not_my_turn() {
        let s = state(json!({}), "resolve");
        assert!(!is_my_turn(&s, Some("p1")));
    }

    #[test]
    fn unknown_viewer_is_never_on_turn() {
        let s = state(json!({"currentTeam": "A"}), "");
        assert!(!is_my_turn(&s, None));
        assert!(!is_my_turn(&s, Some("ghost")));
    }

    #[test]
    fn ended_battle_has_no_turn() {
        let mut s = state(json!({"playerId": "p1"}), "");
        s.status = Status::Ended;
        assert!(!is_my_turn(&s, Some("p1")));
    }

    #[test]
    fn gate_locks_until_turn_window_changes() {
        let s = state(json!({"playerId": "p1", "turnNumber": 1}), "");
        let mut gate = ActionGate::new();
        assert!(gate.can_act(&s, Some("p1")));

        gate.lock(Some(&s));
        assert!(!gate.can_act(&s, Some("p1")));

        // Same window again: still locked.
        gate.observe(&s);
        assert!(gate.is_locked());

        let next = state(json!({"playerId": "p1", "turnNumber": 2}), "");
        gate.observe(&next);
        assert!(gate.can_act(&next, Some("p1")));
    }

    #[test]
    fn gate_release_reopens_immediately() {
        let s = state(json!({"playerId": "p1"}), "");
        let mut gate = ActionGate::new();
        gate.lock(Some(&s));
        gate.release();
        assert!(gate.can_act(&s, Some("p1")));
    }

    #[test]
    fn server_acted_flag_and_dead_players_block_actions() {
        let s = normalize(&json!({
            "status": "active",
            "players": [{"id": "p1", "team": "A", "hp": 0}, {"id": "p3", "team": "A", "hp": 9, "hasActed": true}],
            "currentTurn": {"currentTeam": "A"}
        }));
        let gate = ActionGate::new();
        assert!(!gate.can_act(&s, Some("p1")));
        assert!(!gate.can_act(&s, Some("p3")));
    }

    #[test]
    fn items_need_stock_and_turn() {
        let s = state(json!({"playerId": "p1"}), "");
        let gate = ActionGate::new();
        assert!(gate.can_use_item(&s, Some("p1"), ItemKind::Dittany));
        assert!(!gate.can_use_item(&s, Some("p1"), ItemKind::AttackBooster));
    }
}
