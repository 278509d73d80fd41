use chrono::{Datelike, Days, NaiveDate};

/// Reste toujours dans `[0, n)`, y compris pour un décalage négatif.
///
/// `n` doit être non nul.
pub fn normalized_mod(offset: i64, n: usize) -> usize {
    debug_assert!(n > 0);
    let n = n as i64;
    (((offset % n) + n) % n) as usize
}

/// Nombre de jours calendaires de `from` à `to` (négatif si `to` précède).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    match date.month() {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ if NaiveDate::from_ymd_opt(date.year(), 2, 29).is_some() => 29,
        _ => 28,
    }
}
