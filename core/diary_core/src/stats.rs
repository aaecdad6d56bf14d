use crate::{
    catalog::{self, Lang},
    store::Episode,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub intensity: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frequency {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub lang: Lang,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_intensity: Option<f64>,
    /// One decimal, as shown on the metric card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_date: Option<NaiveDate>,
    /// Scatter series: date vs intensity. Rows missing either are left out.
    pub timeline: Vec<TimelinePoint>,
    /// Bar series: location frequency.
    pub locations: Vec<Frequency>,
    /// Pie series: trigger frequency after splitting the joined cells.
    pub triggers: Vec<Frequency>,
}

/// Aggregates over every row; blank intensities are left out of the mean.
pub fn summarize(episodes: &[Episode], lang: Lang) -> Summary {
    let total = episodes.len();
    let rated: Vec<u64> = episodes
        .iter()
        .filter_map(|e| e.intensity.map(u64::from))
        .collect();
    let avg_intensity =
        (!rated.is_empty()).then(|| rated.iter().sum::<u64>() as f64 / rated.len() as f64);

    let mut timeline: Vec<TimelinePoint> = episodes
        .iter()
        .filter_map(|e| {
            Some(TimelinePoint {
                date: e.date?,
                time: e.time,
                intensity: e.intensity?,
            })
        })
        .collect();
    timeline.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));

    let locations = frequencies(
        episodes
            .iter()
            .map(|e| e.location.trim())
            .filter(|l| !l.is_empty())
            .map(|l| catalog::translate(l, lang)),
    );
    let triggers = frequencies(
        episodes
            .iter()
            .flat_map(|e| catalog::list_tokens(&e.triggers))
            .map(|t| catalog::translate(t, lang)),
    );

    Summary {
        lang,
        total,
        avg_intensity,
        avg_display: avg_intensity.map(|v| format!("{v:.1}")),
        last_date: episodes.iter().filter_map(|e| e.date).max(),
        timeline,
        locations,
        triggers,
    }
}

/// Counts labels; most frequent first, ties alphabetical.
pub fn frequencies<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<Frequency> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for l in labels {
        *counts.entry(l).or_default() += 1;
    }
    let mut out: Vec<Frequency> = counts
        .into_iter()
        .map(|(label, count)| Frequency {
            label: label.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(date: &str, intensity: u8, location: &str, triggers: &str) -> Episode {
        Episode {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            intensity: Some(intensity),
            location: location.to_string(),
            symptoms: String::new(),
            triggers: triggers.to_string(),
            medication: String::new(),
            notes: String::new(),
        }
    }

    fn freq(label: &str, count: usize) -> Frequency {
        Frequency {
            label: label.to_string(),
            count,
        }
    }

    #[test]
    fn metrics_over_three_episodes() {
        let rows = vec![
            ep("2024-02-10", 3, "Виски", "Стресс, Голод"),
            ep("2024-03-01", 7, "Лоб", "Голод"),
            ep("2024-01-20", 5, "Виски", ""),
        ];
        let s = summarize(&rows, Lang::Russian);
        assert_eq!(s.total, 3);
        assert_eq!(s.avg_intensity, Some(5.0));
        assert_eq!(s.avg_display.as_deref(), Some("5.0"));
        assert_eq!(s.last_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(s.timeline[0].intensity, 5);
        assert_eq!(s.locations, vec![freq("Виски", 2), freq("Лоб", 1)]);
        assert_eq!(s.triggers, vec![freq("Голод", 2), freq("Стресс", 1)]);
    }

    #[test]
    fn hebrew_series_are_translated() {
        let rows = vec![
            ep("2024-02-10", 4, "Виски", "Стресс, Голод"),
            ep("2024-02-11", 4, "Шея", "Голод, Шоколад"),
        ];
        let s = summarize(&rows, Lang::Hebrew);
        assert_eq!(s.triggers[0], freq("רעב", 2));
        assert!(s.triggers.contains(&freq("Шоколад", 1)));
        assert!(s.locations.contains(&freq("רקות", 1)));
    }

    #[test]
    fn empty_table_has_no_average() {
        let s = summarize(&[], Lang::Russian);
        assert_eq!(s.total, 0);
        assert!(s.avg_intensity.is_none());
        assert!(s.last_date.is_none());
        assert!(s.triggers.is_empty());
    }

    #[test]
    fn rounding_to_one_decimal() {
        let rows = vec![
            ep("2024-02-10", 2, "Лоб", ""),
            ep("2024-02-10", 3, "Лоб", ""),
            ep("2024-02-10", 3, "Лоб", ""),
        ];
        assert_eq!(summarize(&rows, Lang::Russian).avg_display.as_deref(), Some("2.7"));
    }

    #[test]
    fn blank_cells_still_count_as_episodes() {
        let mut no_rating = ep("2024-02-12", 1, "Шея", "Голод");
        no_rating.intensity = None;
        let mut no_date = ep("2024-02-12", 9, "Шея", "");
        no_date.date = None;
        let rows = vec![ep("2024-02-10", 4, "Лоб", ""), no_rating, no_date];

        let s = summarize(&rows, Lang::Russian);
        assert_eq!(s.total, 3);
        assert_eq!(s.avg_display.as_deref(), Some("6.5"));
        assert_eq!(s.last_date, NaiveDate::from_ymd_opt(2024, 2, 12));
        assert_eq!(s.timeline.len(), 1);
        assert_eq!(s.locations, vec![freq("Шея", 2), freq("Лоб", 1)]);
        assert_eq!(s.triggers, vec![freq("Голод", 1)]);
    }
}
