use crate::team::HalfTeam;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifiant attribué par le stockage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShiftTypeId(u64);

impl ShiftTypeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ShiftTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Définition persistée d'un poste (horaire, durée, couleur, drapeaux).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftType {
    #[serde(default)]
    pub id: Option<ShiftTypeId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_hour: u8,
    pub start_minute: u8,
    pub duration_minutes: u32,
    pub color: String,
    #[serde(default)]
    pub is_rest_type: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_user_defined: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl ShiftType {
    /// Nouveau type de poste défini par l'utilisateur (pas encore persisté).
    pub fn new<N: Into<String>, C: Into<String>>(
        name: N,
        start_hour: u8,
        start_minute: u8,
        duration_minutes: u32,
        color: C,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            start_hour,
            start_minute,
            duration_minutes,
            color: color.into(),
            is_rest_type: false,
            is_active: true,
            is_user_defined: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Les trois postes semés dans un catalogue vide.
    pub fn defaults() -> Vec<ShiftType> {
        [
            ("Morning", "Morning shift", 5, "#4CAF50"),
            ("Afternoon", "Afternoon shift", 13, "#FF9800"),
            ("Night", "Night shift", 21, "#3F51B5"),
        ]
        .into_iter()
        .map(|(name, desc, hour, color)| {
            let mut st = ShiftType::new(name, hour, 0, 8 * 60, color);
            st.description = desc.to_string();
            st.is_user_defined = false;
            st
        })
        .collect()
    }

    /// Vérifie les invariants de champ (l'unicité du nom relève du catalogue).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty");
        }
        if self.start_hour > 23 {
            return Err("start hour must be in 0..=23");
        }
        if self.start_minute > 59 {
            return Err("start minute must be in 0..=59");
        }
        if self.duration_minutes == 0 {
            return Err("duration must be > 0");
        }
        if !is_hex_color(&self.color) {
            return Err("color must be #RRGGBB");
        }
        Ok(())
    }

    /// Met à jour `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn start_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.start_hour), u32::from(self.start_minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn end_time(&self) -> NaiveTime {
        let minutes = self.start_minutes() + self.duration_minutes;
        let wrapped = minutes % (24 * 60);
        NaiveTime::from_hms_opt(wrapped / 60, wrapped % 60, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Vrai si le poste se termine le lendemain.
    pub fn crosses_midnight(&self) -> bool {
        self.start_minutes() + self.duration_minutes > 24 * 60
    }

    pub fn is_work(&self) -> bool {
        !self.is_rest_type
    }

    /// Comparaison de nom insensible à la casse, accents compris.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    fn start_minutes(&self) -> u32 {
        u32::from(self.start_hour) * 60 + u32::from(self.start_minute)
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Un poste d'une journée : son type et les équipes affectées.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shift {
    pub shift_type: Arc<ShiftType>,
    pub teams: Vec<HalfTeam>,
}

impl Shift {
    pub fn new(shift_type: Arc<ShiftType>, teams: Vec<HalfTeam>) -> Self {
        Self { shift_type, teams }
    }

    /// Poste travaillé avec au moins une équipe.
    pub fn is_staffed_work(&self) -> bool {
        self.shift_type.is_work() && !self.teams.is_empty()
    }

    pub fn has_team(&self, team: HalfTeam) -> bool {
        self.teams.contains(&team)
    }
}

/// Une journée : exactement S postes, plus le groupe au repos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Day {
    pub date: NaiveDate,
    pub cycle_index: usize,
    pub shifts: Vec<Shift>,
    pub rest_teams: Vec<HalfTeam>,
}

impl Day {
    /// Copie indépendante datée au jour `date`.
    pub fn dated(&self, date: NaiveDate) -> Day {
        Day {
            date,
            ..self.clone()
        }
    }

    pub fn has_work(&self) -> bool {
        self.shifts.iter().any(Shift::is_staffed_work)
    }

    /// Index du poste occupé par `team`, `None` si l'équipe est au repos.
    pub fn slot_of(&self, team: HalfTeam) -> Option<usize> {
        self.shifts.iter().position(|s| s.has_team(team))
    }
}
