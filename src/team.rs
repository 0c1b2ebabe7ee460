//! Canonical two-team labels.
//!
//! The server and older clients spell teams many ways: bare letters, prefixed
//! codes, faction names, or a Korean faction phrase. [`resolve_team`] folds all
//! of them into [`Team::A`] or [`Team::B`], or `None` when the token is not
//! recognised. Callers must treat `None` as "render nothing team-specific".

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two sides of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

const TEAM_A_EXACT: &[&str] = &["a", "team_a", "team-a", "phoenix", "order", "phoenix_order"];
const TEAM_B_EXACT: &[&str] = &["b", "team_b", "team-b", "eaters", "death", "death_eaters"];

const TEAM_A_MARKERS: &[&str] = &["불사조"];
const TEAM_B_MARKERS: &[&str] = &["죽음", "먹는 자"];

/// Resolve an arbitrary team token to a canonical [`Team`].
///
/// Exact aliases are checked first, then marker substrings. Never fails.
///
/// ```
/// use battle_sync_client::team::{resolve_team, Team};
///
/// assert_eq!(resolve_team("team_a"), Some(Team::A));
/// assert_eq!(resolve_team("  Phoenix "), Some(Team::A));
/// assert_eq!(resolve_team("불사조 기사단"), Some(Team::A));
/// assert_eq!(resolve_team("Death_Eaters"), Some(Team::B));
/// assert_eq!(resolve_team("spectators"), None);
/// ```
pub fn resolve_team(raw: &str) -> Option<Team> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if TEAM_A_EXACT.contains(&s.as_str()) {
        return Some(Team::A);
    }
    if TEAM_B_EXACT.contains(&s.as_str()) {
        return Some(Team::B);
    }

    if TEAM_A_MARKERS.iter().any(|m| s.contains(m)) {
        return Some(Team::A);
    }
    if TEAM_B_MARKERS.iter().any(|m| s.contains(m)) {
        return Some(Team::B);
    }

    None
}

/// [`resolve_team`] over an optional token.
pub fn resolve_team_opt(raw: Option<&str>) -> Option<Team> {
    raw.and_then(resolve_team)
}

impl Team {
    /// Single-letter code used on the wire and in short messages.
    pub fn code(self) -> &'static str {
        match self {
            Team::A => "A",
            Team::B => "B",
        }
    }

    /// Faction name shown to players.
    pub fn label(self) -> &'static str {
        match self {
            Team::A => "불사조 기사단",
            Team::B => "죽음을 먹는 자",
        }
    }

    /// The opposing team.
    pub fn opponent(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
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

    #[test]
    fn every_team_a_alias_resolves_to_a() {
        for raw in ["A", "a", "team_a", "TEAM-A", "Phoenix", "order", "phoenix_order"] {
            assert_eq!(resolve_team(raw), Some(Team::A), "alias {raw:?}");
        }
        assert_eq!(resolve_team("우리는 불사조 편"), Some(Team::A));
    }

    #[test]
    fn every_team_b_alias_resolves_to_b() {
        for raw in ["B", "team_b", "team-b", "eaters", "DEATH", "death_eaters"] {
            assert_eq!(resolve_team(raw), Some(Team::B), "alias {raw:?}");
        }
        assert_eq!(resolve_team("죽음을 먹는 자"), Some(Team::B));
        assert_eq!(resolve_team("먹는 자들"), Some(Team::B));
    }

    #[test]
    fn unknown_and_empty_tokens_are_none() {
        assert_eq!(resolve_team(""), None);
        assert_eq!(resolve_team("   "), None);
        assert_eq!(resolve_team("c"), None);
        assert_eq!(resolve_team("team_c"), None);
        assert_eq!(resolve_team_opt(None), None);
    }

    #[test]
    fn exact_match_wins_over_markers() {
        // "death" is an exact B alias even though nothing else matches.
        assert_eq!(resolve_team("death"), Some(Team::B));
    }

    #[test]
    fn labels_and_codes() {
        assert_eq!(Team::A.code(), "A");
        assert_eq!(Team::B.to_string(), "B");
        assert_eq!(Team::A.label(), "불사조 기사단");
        assert_eq!(Team::B.opponent(), Team::A);
    }

    #[test]
    fn serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Team::A).unwrap(), "\"A\"");
        let team: Team = serde_json::from_str("\"B\"").unwrap();
        assert_eq!(team, Team::B);
    }
}
