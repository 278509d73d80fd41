use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Lettres des 9 demi-équipes, dans l'ordre du registre.
pub const TEAM_LETTERS: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];

/// Équipe substituée quand une lettre inconnue est rencontrée.
pub const DEFAULT_TEAM: char = 'A';

/// Demi-équipe : identité = une lettre, égalité par lettre.
///
/// Ne se construit qu'à travers le registre, désérialisation comprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "char")]
pub struct HalfTeam(char);

impl HalfTeam {
    pub fn letter(self) -> char {
        self.0
    }

    /// Position dans le registre (0 pour A ... 8 pour I).
    pub fn index(self) -> usize {
        TEAM_LETTERS.iter().position(|&l| l == self.0).unwrap_or(0)
    }
}

impl TryFrom<char> for HalfTeam {
    type Error = UnknownTeam;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        TeamRegistry::global().resolve(letter)
    }
}

impl fmt::Display for HalfTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown team: {0}")]
pub struct UnknownTeam(pub char);

/// Registre des 9 demi-équipes, construit une seule fois par processus.
#[derive(Debug)]
pub struct TeamRegistry {
    teams: [HalfTeam; 9],
}

impl TeamRegistry {
    pub fn global() -> &'static TeamRegistry {
        static REGISTRY: OnceLock<TeamRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| TeamRegistry {
            teams: TEAM_LETTERS.map(HalfTeam),
        })
    }

    pub fn all(&self) -> &[HalfTeam] {
        &self.teams
    }

    /// Résout une lettre (insensible à la casse).
    pub fn resolve(&self, letter: char) -> Result<HalfTeam, UnknownTeam> {
        let upper = letter.to_ascii_uppercase();
        self.teams
            .iter()
            .copied()
            .find(|t| t.0 == upper)
            .ok_or(UnknownTeam(letter))
    }

    pub fn by_index(&self, index: usize) -> Option<HalfTeam> {
        self.teams.get(index).copied()
    }

    pub fn default_team(&self) -> HalfTeam {
        HalfTeam(DEFAULT_TEAM)
    }

    /// Résout une lettre, ou substitue l'équipe par défaut en journalisant.
    pub fn resolve_or_default(&self, letter: char) -> HalfTeam {
        self.resolve(letter).unwrap_or_else(|err| {
            tracing::warn!(%err, substitute = %DEFAULT_TEAM, "invalid team name");
            self.default_team()
        })
    }
}
