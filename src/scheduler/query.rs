use super::{util, CycleInfo, Duty, ScheduleEngine};
use crate::model::Day;
use crate::team::HalfTeam;
use chrono::{Days, Local, NaiveDate};

impl ScheduleEngine {
    /// Position dans le cycle, `None` si le moteur n'est pas prêt.
    pub fn cycle_position(&self, date: NaiveDate) -> Option<usize> {
        self.current()?.position_of(date)
    }

    /// Position dans le cycle, ou `-1` si le moteur n'est pas prêt.
    pub fn day_in_cycle(&self, date: NaiveDate) -> i64 {
        self.cycle_position(date).map_or(-1, |p| p as i64)
    }

    /// Journée datée `date`, copiée depuis le modèle.
    pub fn day_by_date(&self, date: NaiveDate) -> Option<Day> {
        let snapshot = self.current()?;
        let position = snapshot.position_of(date)?;
        snapshot.template.day(position).map(|d| d.dated(date))
    }

    /// Toutes les journées du mois de `month`, dans l'ordre ; vide si le
    /// moteur n'est pas prêt.
    pub fn shifts_for_month(&self, month: NaiveDate) -> Vec<Day> {
        let Some(snapshot) = self.current() else {
            return Vec::new();
        };
        let first = util::first_of_month(month);
        let Some(start) = snapshot.position_of(first) else {
            return Vec::new();
        };
        let n = snapshot.template.len();

        (0..util::days_in_month(first))
            .map_while(|k| {
                let date = first.checked_add_days(Days::new(u64::from(k)))?;
                let index = (start + k as usize) % n;
                snapshot.template.day(index).map(|d| d.dated(date))
            })
            .collect()
    }

    /// Vrai si au moins un poste travaillé a une équipe affectée ce jour-là.
    pub fn has_work_schedule_on_date(&self, date: NaiveDate) -> bool {
        self.day_by_date(date).is_some_and(|d| d.has_work())
    }

    pub fn is_date_calculatable(&self, date: NaiveDate) -> bool {
        let Some(snapshot) = self.current() else {
            return false;
        };
        let n = self.scheme.cycle_length();
        snapshot.template.len() == n && snapshot.position_of(date).is_some_and(|p| p < n)
    }

    /// Affectation d'une équipe à une date.
    pub fn duty_of(&self, date: NaiveDate, team: HalfTeam) -> Option<Duty> {
        let day = self.day_by_date(date)?;
        Some(day.slot_of(team).map_or(Duty::Rest, Duty::Slot))
    }

    pub fn cycle_info(&self) -> CycleInfo {
        self.cycle_info_at(Local::now().date_naive())
    }

    /// Diagnostic tiré d'un seul instantané, sans accès au stockage.
    pub fn cycle_info_at(&self, today: NaiveDate) -> CycleInfo {
        let snapshot = self.current();
        CycleInfo {
            cycle_length: self.scheme.cycle_length(),
            anchor_date: snapshot.as_ref().map(|s| s.template.anchor()),
            template_size: snapshot.as_ref().map_or(0, |s| s.template.len()),
            catalog_size: snapshot.as_ref().map_or(0, |s| s.catalog_size),
            current_cycle_position: snapshot
                .as_ref()
                .and_then(|s| s.position_of(today))
                .map_or(-1, |p| p as i64),
        }
    }
}
