//! Tableau publié du roulement 4/2.
//!
//! Chaque ligne correspond à un jour du cycle (0 = date d'ancrage). Les trois
//! premières colonnes sont les postes (matin, après-midi, nuit), la dernière
//! le groupe au repos. Chaque demi-équipe travaille 4 jours puis se repose 2.

use crate::scheduler::EngineError;
use crate::team::{HalfTeam, TeamRegistry};

/// Longueur du cycle (N).
pub const CYCLE_LENGTH: usize = 18;
/// Postes par jour (S).
pub const SLOTS_PER_DAY: usize = 3;

const STANDARD_TABLE: [[&str; SLOTS_PER_DAY + 1]; CYCLE_LENGTH] = [
    ["AB", "CD", "EF", "GHI"], // 0
    ["AB", "CD", "EF", "GHI"], // 1
    ["EI", "AH", "DG", "BCF"], // 2
    ["EI", "AH", "DG", "BCF"], // 3
    ["FG", "BI", "CH", "ADE"], // 4
    ["FG", "BI", "CH", "ADE"], // 5
    ["CD", "EF", "AB", "GHI"], // 6
    ["CD", "EF", "AB", "GHI"], // 7
    ["AH", "DG", "EI", "BCF"], // 8
    ["AH", "DG", "EI", "BCF"], // 9
    ["BI", "CH", "FG", "ADE"], // 10
    ["BI", "CH", "FG", "ADE"], // 11
    ["EF", "AB", "CD", "GHI"], // 12
    ["EF", "AB", "CD", "GHI"], // 13
    ["DG", "EI", "AH", "BCF"], // 14
    ["DG", "EI", "AH", "BCF"], // 15
    ["CH", "FG", "BI", "ADE"], // 16
    ["CH", "FG", "BI", "ADE"], // 17
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct SchemeRow {
    slots: Vec<Vec<HalfTeam>>,
    rest: Vec<HalfTeam>,
}

/// Matrice constante `[N][S] -> équipes`, immuable après chargement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationScheme {
    rows: Vec<SchemeRow>,
    slots_per_day: usize,
}

impl RotationScheme {
    /// Le roulement standard 18 jours × 3 postes.
    pub fn standard() -> Self {
        let rows: Vec<Vec<&str>> = STANDARD_TABLE.iter().map(|r| r.to_vec()).collect();
        Self::build(&rows, SLOTS_PER_DAY)
    }

    /// Construit un schéma depuis un tableau de lettres.
    ///
    /// Chaque ligne doit contenir `slots_per_day` postes suivis du groupe au
    /// repos. Une dimension incohérente est une faute structurelle.
    pub fn from_rows<R, S>(rows: &[R], slots_per_day: usize) -> Result<Self, EngineError>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        if rows.is_empty() {
            return Err(EngineError::MalformedScheme("scheme has no rows".into()));
        }
        if slots_per_day == 0 {
            return Err(EngineError::MalformedScheme("scheme has no slots".into()));
        }
        let expected = slots_per_day + 1;
        let mut owned = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != expected {
                return Err(EngineError::MalformedScheme(format!(
                    "row {i} has {} groups, expected {expected}",
                    row.len()
                )));
            }
            owned.push(row.iter().map(|g| g.as_ref()).collect::<Vec<&str>>());
        }
        Ok(Self::build(&owned, slots_per_day))
    }

    fn build(rows: &[Vec<&str>], slots_per_day: usize) -> Self {
        let registry = TeamRegistry::global();
        let parse = |group: &str| -> Vec<HalfTeam> {
            group
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ',')
                .map(|c| registry.resolve_or_default(c))
                .collect()
        };
        let rows = rows
            .iter()
            .map(|row| SchemeRow {
                slots: row[..slots_per_day].iter().map(|g| parse(g)).collect(),
                rest: parse(row[slots_per_day]),
            })
            .collect();
        Self { rows, slots_per_day }
    }

    pub fn cycle_length(&self) -> usize {
        self.rows.len()
    }

    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    /// Équipes affectées au poste `slot` du jour de cycle `day`.
    ///
    /// Les indices sont construits dans les bornes par le moteur.
    pub fn slot_teams(&self, day: usize, slot: usize) -> &[HalfTeam] {
        &self.rows[day].slots[slot]
    }

    pub fn rest_teams(&self, day: usize) -> &[HalfTeam] {
        &self.rows[day].rest
    }
}

impl Default for RotationScheme {
    fn default() -> Self {
        Self::standard()
    }
}
