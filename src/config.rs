//! Préférences lues depuis un fournisseur externe (fichier, mémoire...).
//!
//! Les valeurs absentes prennent les constantes intégrées ; les valeurs
//! invalides aussi, avec un avertissement.

use crate::scheduler::EngineError;
use crate::storage::{read_json_or_default, write_json_atomic};
use crate::team::{HalfTeam, TeamRegistry};
use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Ancrage par défaut : 7 novembre 2018 = jour 0 du cycle.
pub const DEFAULT_ANCHOR: AnchorConfiguration = AnchorConfiguration {
    day: 7,
    month: 11,
    year: 2018,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorConfiguration {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl AnchorConfiguration {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: date.day(),
            month: date.month(),
            year: date.year(),
        }
    }

    /// `None` si le triplet ne forme pas une date calendaire.
    pub fn to_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

impl Default for AnchorConfiguration {
    fn default() -> Self {
        DEFAULT_ANCHOR
    }
}

/// Bascules d'affichage. Elles ne changent jamais le calcul du roulement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    ShowMorning,
    ShowAfternoon,
    ShowNight,
    ShowRest,
    HighlightMyTeam,
}

impl Toggle {
    pub const ALL: [Toggle; 5] = [
        Toggle::ShowMorning,
        Toggle::ShowAfternoon,
        Toggle::ShowNight,
        Toggle::ShowRest,
        Toggle::HighlightMyTeam,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Toggle::ShowMorning => "show_morning",
            Toggle::ShowAfternoon => "show_afternoon",
            Toggle::ShowNight => "show_night",
            Toggle::ShowRest => "show_rest",
            Toggle::HighlightMyTeam => "highlight_my_team",
        }
    }

    pub fn from_key(key: &str) -> Option<Toggle> {
        Toggle::ALL.into_iter().find(|t| t.key() == key)
    }

    /// Bascule qui masque le poste `slot`.
    pub fn for_slot(slot: usize) -> Option<Toggle> {
        match slot {
            0 => Some(Toggle::ShowMorning),
            1 => Some(Toggle::ShowAfternoon),
            2 => Some(Toggle::ShowNight),
            _ => None,
        }
    }
}

/// Interface étroite de lecture/écriture des préférences.
pub trait ConfigurationProvider: Send + Sync {
    fn toggle(&self, toggle: Toggle) -> anyhow::Result<Option<bool>>;
    fn set_toggle(&self, toggle: Toggle, value: bool) -> anyhow::Result<()>;
    fn team_index(&self) -> anyhow::Result<Option<i64>>;
    fn set_team_index(&self, index: i64) -> anyhow::Result<()>;
    fn anchor(&self) -> anyhow::Result<Option<AnchorConfiguration>>;
    fn set_anchor(&self, anchor: AnchorConfiguration) -> anyhow::Result<()>;
}

/// Contenu brut persisté ; `None` = non renseigné.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub toggles: BTreeMap<Toggle, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorConfiguration>,
}

/// Fournisseur en mémoire.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    settings: RwLock<StoredSettings>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: StoredSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> StoredSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigurationProvider for MemoryConfig {
    fn toggle(&self, toggle: Toggle) -> anyhow::Result<Option<bool>> {
        Ok(self.snapshot().toggles.get(&toggle).copied())
    }
    fn set_toggle(&self, toggle: Toggle, value: bool) -> anyhow::Result<()> {
        let mut s = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        s.toggles.insert(toggle, value);
        Ok(())
    }
    fn team_index(&self) -> anyhow::Result<Option<i64>> {
        Ok(self.snapshot().team_index)
    }
    fn set_team_index(&self, index: i64) -> anyhow::Result<()> {
        let mut s = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        s.team_index = Some(index);
        Ok(())
    }
    fn anchor(&self) -> anyhow::Result<Option<AnchorConfiguration>> {
        Ok(self.snapshot().anchor)
    }
    fn set_anchor(&self, anchor: AnchorConfiguration) -> anyhow::Result<()> {
        let mut s = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        s.anchor = Some(anchor);
        Ok(())
    }
}

/// Fournisseur adossé à un fichier JSON, réécrit à chaque modification.
#[derive(Debug)]
pub struct JsonConfig {
    path: PathBuf,
    settings: RwLock<StoredSettings>,
}

impl JsonConfig {
    /// Ouvre le fichier ; un fichier absent équivaut à une configuration vide.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings: StoredSettings = read_json_or_default(&path)
            .with_context(|| format!("loading configuration {}", path.display()))?;
        Ok(Self {
            path,
            settings: RwLock::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut StoredSettings)) -> anyhow::Result<()> {
        let mut s = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = s.clone();
        f(&mut next);
        write_json_atomic(&self.path, &next)
            .with_context(|| format!("writing configuration {}", self.path.display()))?;
        *s = next;
        Ok(())
    }

    fn read(&self) -> StoredSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigurationProvider for JsonConfig {
    fn toggle(&self, toggle: Toggle) -> anyhow::Result<Option<bool>> {
        Ok(self.read().toggles.get(&toggle).copied())
    }
    fn set_toggle(&self, toggle: Toggle, value: bool) -> anyhow::Result<()> {
        self.update(|s| {
            s.toggles.insert(toggle, value);
        })
    }
    fn team_index(&self) -> anyhow::Result<Option<i64>> {
        Ok(self.read().team_index)
    }
    fn set_team_index(&self, index: i64) -> anyhow::Result<()> {
        self.update(|s| s.team_index = Some(index))
    }
    fn anchor(&self) -> anyhow::Result<Option<AnchorConfiguration>> {
        Ok(self.read().anchor)
    }
    fn set_anchor(&self, anchor: AnchorConfiguration) -> anyhow::Result<()> {
        self.update(|s| s.anchor = Some(anchor))
    }
}

/// Préférences résolues, prêtes à l'emploi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub anchor: NaiveDate,
    pub my_team: HalfTeam,
    pub toggles: BTreeMap<Toggle, bool>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            anchor: default_anchor_date(),
            my_team: TeamRegistry::global().default_team(),
            toggles: Toggle::ALL.into_iter().map(|t| (t, true)).collect(),
        }
    }
}

impl Preferences {
    /// Lit le fournisseur ; toute valeur absente ou invalide retombe sur
    /// la constante intégrée.
    pub fn resolve(provider: Option<&dyn ConfigurationProvider>) -> Self {
        let mut prefs = Preferences::default();
        let Some(provider) = provider else {
            missing("no configuration provider");
            return prefs;
        };

        match provider.anchor() {
            Ok(Some(anchor)) => match anchor.to_date() {
                Some(date) => prefs.anchor = date,
                None => missing(&format!(
                    "invalid anchor {}-{}-{}",
                    anchor.year, anchor.month, anchor.day
                )),
            },
            Ok(None) => {}
            Err(err) => missing(&format!("anchor unreadable: {err:#}")),
        }

        match provider.team_index() {
            Ok(Some(index)) => {
                let team = usize::try_from(index)
                    .ok()
                    .and_then(|i| TeamRegistry::global().by_index(i));
                match team {
                    Some(team) => prefs.my_team = team,
                    None => missing(&format!("team index out of range: {index}")),
                }
            }
            Ok(None) => {}
            Err(err) => missing(&format!("team index unreadable: {err:#}")),
        }

        for toggle in Toggle::ALL {
            match provider.toggle(toggle) {
                Ok(Some(value)) => {
                    prefs.toggles.insert(toggle, value);
                }
                Ok(None) => {}
                Err(err) => missing(&format!("toggle {} unreadable: {err:#}", toggle.key())),
            }
        }
        prefs
    }

    pub fn is_enabled(&self, toggle: Toggle) -> bool {
        self.toggles.get(&toggle).copied().unwrap_or(true)
    }
}

pub fn default_anchor_date() -> NaiveDate {
    // constante valide par construction
    DEFAULT_ANCHOR.to_date().unwrap_or(NaiveDate::MIN)
}

fn missing(reason: &str) {
    let err = EngineError::ConfigurationMissing(reason.to_string());
    tracing::warn!(%err, "falling back to built-in defaults");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_provider_uses_defaults() {
        let prefs = Preferences::resolve(None);
        assert_eq!(prefs.anchor, NaiveDate::from_ymd_opt(2018, 11, 7).unwrap());
        assert_eq!(prefs.my_team.letter(), 'A');
        assert!(Toggle::ALL.iter().all(|t| prefs.is_enabled(*t)));
    }

    #[test]
    fn provider_values_are_applied() {
        let cfg = MemoryConfig::new();
        cfg.set_anchor(AnchorConfiguration { day: 1, month: 2, year: 2020 }).unwrap();
        cfg.set_team_index(4).unwrap();
        cfg.set_toggle(Toggle::ShowNight, false).unwrap();
        let prefs = Preferences::resolve(Some(&cfg));
        assert_eq!(prefs.anchor, NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
        assert_eq!(prefs.my_team.letter(), 'E');
        assert!(!prefs.is_enabled(Toggle::ShowNight));
        assert!(prefs.is_enabled(Toggle::ShowMorning));
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = MemoryConfig::with_settings(StoredSettings {
            anchor: Some(AnchorConfiguration { day: 30, month: 2, year: 2021 }),
            team_index: Some(12),
            ..StoredSettings::default()
        });
        let prefs = Preferences::resolve(Some(&cfg));
        assert_eq!(prefs.anchor, default_anchor_date());
        assert_eq!(prefs.my_team.letter(), 'A');
    }

    #[test]
    fn toggle_keys_round_trip() {
        for t in Toggle::ALL {
            assert_eq!(Toggle::from_key(t.key()), Some(t));
        }
        assert_eq!(Toggle::from_key("nope"), None);
        assert_eq!(Toggle::for_slot(2), Some(Toggle::ShowNight));
        assert_eq!(Toggle::for_slot(3), None);
    }

    #[test]
    fn json_config_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        {
            let cfg = JsonConfig::open(&path).unwrap();
            assert_eq!(cfg.anchor().unwrap(), None);
            cfg.set_team_index(2).unwrap();
            cfg.set_toggle(Toggle::ShowRest, false).unwrap();
        }
        let cfg = JsonConfig::open(&path).unwrap();
        assert_eq!(cfg.team_index().unwrap(), Some(2));
        assert_eq!(cfg.toggle(Toggle::ShowRest).unwrap(), Some(false));
    }

    #[test]
    fn corrupt_json_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(JsonConfig::open(&path).is_err());
    }
}
