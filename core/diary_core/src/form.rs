use crate::{
    catalog::{self, LIST_SEPARATOR},
    store::{self, Episode},
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

pub const INTENSITY_MIN: i64 = 1;
pub const INTENSITY_MAX: i64 = 10;
pub const DEFAULT_INTENSITY: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("invalid date '{0}'")]
    Date(String),
    #[error("invalid time '{0}'")]
    Time(String),
    #[error("intensity {0} is outside 1-10")]
    Intensity(String),
    #[error("unknown location '{0}'")]
    Location(String),
    #[error("unknown symptom '{0}'")]
    Symptom(String),
    #[error("unknown trigger '{0}'")]
    Trigger(String),
    #[error("columns do not map onto the episode table")]
    Columns,
}

impl InputError {
    pub fn code(&self) -> &'static str {
        match self {
            InputError::Date(_) => "invalid_date",
            InputError::Time(_) => "invalid_time",
            InputError::Intensity(_) => "invalid_intensity",
            InputError::Location(_) => "invalid_location",
            InputError::Symptom(_) => "invalid_symptom",
            InputError::Trigger(_) => "invalid_trigger",
            InputError::Columns => "invalid_columns",
        }
    }
}

/// Entry-form submission. Values may be in either display vocabulary.
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeInput {
    /// `YYYY-MM-DD` or `DD.MM.YYYY`; today when absent.
    #[serde(default)]
    pub date: Option<String>,
    /// `HH:MM[:SS]`; now when absent.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default = "default_intensity")]
    pub intensity: i64,
    pub location: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub medication: String,
    #[serde(default)]
    pub notes: String,
}

fn default_intensity() -> i64 {
    DEFAULT_INTENSITY
}

impl EpisodeInput {
    /// Validates against the fixed option sets and converts to the storage vocabulary.
    pub fn into_episode(self, now: NaiveDateTime) -> Result<Episode, InputError> {
        let date = match self.date.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => parse_input_date(s).ok_or_else(|| InputError::Date(s.to_string()))?,
            None => now.date(),
        };
        let time = match self.time.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => store::parse_time(s).ok_or_else(|| InputError::Time(s.to_string()))?,
            None => now.time(),
        };
        let intensity = check_intensity(self.intensity)?;

        let location = catalog::canonicalize(self.location.trim());
        if !catalog::is_location(location) {
            return Err(InputError::Location(self.location));
        }

        let symptoms = canonical_choices(&self.symptoms, catalog::is_symptom)
            .map_err(InputError::Symptom)?;
        let triggers = canonical_choices(&self.triggers, catalog::is_trigger)
            .map_err(InputError::Trigger)?;

        Ok(Episode {
            date: Some(date),
            time,
            intensity: Some(intensity),
            location: location.to_string(),
            symptoms,
            triggers,
            medication: self.medication.trim().to_string(),
            notes: self.notes,
        })
    }
}

fn canonical_choices(values: &[String], known: fn(&str) -> bool) -> Result<String, String> {
    let mut out: Vec<&str> = Vec::with_capacity(values.len());
    for v in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let c = catalog::canonicalize(v);
        if !known(c) {
            return Err(v.to_string());
        }
        if !out.contains(&c) {
            out.push(c);
        }
    }
    Ok(out.join(LIST_SEPARATOR))
}

pub fn check_intensity(v: i64) -> Result<u8, InputError> {
    if (INTENSITY_MIN..=INTENSITY_MAX).contains(&v) {
        Ok(v as u8)
    } else {
        Err(InputError::Intensity(v.to_string()))
    }
}

/// Store format first, then the day-first form the grid displays.
pub fn parse_input_date(s: &str) -> Option<NaiveDate> {
    store::parse_date(s).or_else(|| NaiveDate::parse_from_str(s.trim(), "%d.%m.%Y").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(18, 45, 12)
            .unwrap()
    }

    fn input(location: &str) -> EpisodeInput {
        EpisodeInput {
            date: None,
            time: None,
            intensity: 6,
            location: location.to_string(),
            symptoms: vec![],
            triggers: vec![],
            medication: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn hebrew_submission_is_stored_in_russian() {
        let mut i = input("רקות");
        i.symptoms = vec!["בחילה".into(), "רגישות לאור".into()];
        i.triggers = vec!["לחץ/סטרס".into()];
        i.medication = " Нурофен ".into();
        let e = i.into_episode(now()).unwrap();
        assert_eq!(e.location, "Виски");
        assert_eq!(e.symptoms, "Тошнота, Светобоязнь");
        assert_eq!(e.triggers, "Стресс");
        assert_eq!(e.medication, "Нурофен");
    }

    #[test]
    fn date_and_time_default_to_now() {
        let e = input("Лоб").into_episode(now()).unwrap();
        assert_eq!(e.date, Some(now().date()));
        assert_eq!(e.time, NaiveTime::from_hms_opt(18, 45, 12).unwrap());
        assert_eq!(e.intensity, Some(6));
    }

    #[test]
    fn explicit_date_and_time_are_parsed() {
        let mut i = input("Лоб");
        i.date = Some("03.02.2024".into());
        i.time = Some("07:05".into());
        let e = i.into_episode(now()).unwrap();
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2024, 2, 3));
        assert_eq!(e.time, NaiveTime::from_hms_opt(7, 5, 0).unwrap());
    }

    #[test]
    fn rejects_values_outside_the_option_sets() {
        let mut i = input("Лоб");
        i.intensity = 11;
        assert_eq!(i.into_episode(now()).unwrap_err().code(), "invalid_intensity");

        let i = input("Колено");
        assert_eq!(i.into_episode(now()).unwrap_err().code(), "invalid_location");

        let mut i = input("Лоб");
        i.triggers = vec!["Шоколад".into()];
        assert_eq!(
            i.into_episode(now()).unwrap_err(),
            InputError::Trigger("Шоколад".into())
        );

        let mut i = input("Лоб");
        i.time = Some("вечером".into());
        assert_eq!(i.into_episode(now()).unwrap_err().code(), "invalid_time");
    }

    #[test]
    fn duplicate_choices_collapse() {
        let mut i = input("Шея");
        i.triggers = vec!["Голод".into(), "רעב".into()];
        assert_eq!(i.into_episode(now()).unwrap().triggers, "Голод");
    }
}
