//! Plain-text rendering of the three views. Right-to-left locales get
//! right-aligned text and mirrored column order.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::fmt::Write;

const BAR_WIDTH: usize = 30;
const BAR: char = '█';

#[derive(Debug, Deserialize)]
pub struct UiStrings {
    pub stats_title: String,
    pub total: String,
    pub avg: String,
    pub last: String,
    pub c_cal: String,
    pub c_loc: String,
    pub c_trig: String,
    pub edit_title: String,
    pub edit_help: String,
    pub empty: String,
}

#[derive(Debug, Deserialize)]
pub struct FormOptions {
    pub locations: Vec<String>,
    pub symptoms: Vec<String>,
    pub triggers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogInfo {
    pub dir: String,
    pub columns: Vec<String>,
    pub ui: UiStrings,
    pub options: FormOptions,
}

impl CatalogInfo {
    fn rtl(&self) -> bool {
        self.dir == "rtl"
    }
}

#[derive(Debug, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub intensity: u8,
}

#[derive(Debug, Deserialize)]
pub struct Frequency {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct Summary {
    pub total: usize,
    #[serde(default)]
    pub avg_display: Option<String>,
    #[serde(default)]
    pub last_date: Option<NaiveDate>,
    #[serde(default)]
    pub timeline: Vec<TimelinePoint>,
    #[serde(default)]
    pub locations: Vec<Frequency>,
    #[serde(default)]
    pub triggers: Vec<Frequency>,
}

#[derive(Debug, Deserialize)]
pub struct GridRow {
    pub row: usize,
    pub cells: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GridTable {
    pub columns: Vec<String>,
    pub rows: Vec<GridRow>,
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, w: usize, rtl: bool) -> String {
    let fill = " ".repeat(w.saturating_sub(width(s)));
    if rtl {
        format!("{fill}{s}")
    } else {
        format!("{s}{fill}")
    }
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let n = (count * BAR_WIDTH / max).max(1);
    std::iter::repeat(BAR).take(n).collect()
}

fn day(d: NaiveDate) -> String {
    d.format("%d.%m.%Y").to_string()
}

fn heading(out: &mut String, title: &str, rtl: bool) {
    let line = format!("-- {title} --");
    let _ = writeln!(out, "{}", if rtl { pad(&line, BAR_WIDTH + 20, true) } else { line });
}

fn frequency_chart(out: &mut String, items: &[Frequency], total: Option<usize>, rtl: bool) {
    let max = items.iter().map(|f| f.count).max().unwrap_or(0);
    let label_w = items.iter().map(|f| width(&f.label)).max().unwrap_or(0);
    for f in items {
        let share = total
            .filter(|&t| t > 0)
            .map(|t| format!(" ({:.1}%)", f.count as f64 * 100.0 / t as f64))
            .unwrap_or_default();
        let b = bar(f.count, max);
        let line = if rtl {
            let label = pad(&f.label, label_w, true);
            format!("{share}{} {} {label}", f.count, pad(&b, BAR_WIDTH, true))
        } else {
            let label = pad(&f.label, label_w, false);
            format!("{label} {} {}{share}", pad(&b, BAR_WIDTH, false), f.count)
        };
        let _ = writeln!(out, "{}", line.trim_end());
    }
}

pub fn stats(cat: &CatalogInfo, s: &Summary) -> String {
    let rtl = cat.rtl();
    let ui = &cat.ui;
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", ui.stats_title);
    if s.total == 0 {
        let _ = writeln!(out, "{}", ui.empty);
        return out;
    }

    let mut metrics = vec![
        format!("{}: {}", ui.total, s.total),
        format!("{}: {}", ui.avg, s.avg_display.as_deref().unwrap_or("-")),
        format!("{}: {}", ui.last, s.last_date.map(day).unwrap_or_default()),
    ];
    if rtl {
        metrics.reverse();
    }
    let _ = writeln!(out, "{}", metrics.join("   "));

    out.push('\n');
    heading(&mut out, &ui.c_cal, rtl);
    for p in &s.timeline {
        let stamp = format!("{} {}", day(p.date), p.time.format("%H:%M"));
        let b = bar(usize::from(p.intensity), 10);
        let line = if rtl {
            format!("{:>2} {} {stamp}", p.intensity, pad(&b, BAR_WIDTH, true))
        } else {
            format!("{stamp} {} {:>2}", pad(&b, BAR_WIDTH, false), p.intensity)
        };
        let _ = writeln!(out, "{line}");
    }

    out.push('\n');
    heading(&mut out, &ui.c_loc, rtl);
    frequency_chart(&mut out, &s.locations, None, rtl);

    out.push('\n');
    heading(&mut out, &ui.c_trig, rtl);
    if s.triggers.is_empty() {
        let _ = writeln!(out, "{}", ui.empty);
    } else {
        let total = s.triggers.iter().map(|f| f.count).sum();
        frequency_chart(&mut out, &s.triggers, Some(total), rtl);
    }
    out
}

// Date and time cells are shown day-first and without seconds.
fn display_cell(col: usize, cell: &str) -> String {
    match col {
        0 => NaiveDate::parse_from_str(cell, "%Y-%m-%d")
            .map(day)
            .unwrap_or_else(|_| cell.to_string()),
        1 => NaiveTime::parse_from_str(cell, "%H:%M:%S")
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|_| cell.to_string()),
        _ => cell.to_string(),
    }
}

pub fn grid(cat: &CatalogInfo, table: &GridTable) -> String {
    let rtl = cat.rtl();
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", cat.ui.edit_title);
    if table.rows.is_empty() {
        let _ = writeln!(out, "{}", cat.ui.empty);
        return out;
    }

    let mut lines: Vec<Vec<String>> = Vec::with_capacity(table.rows.len() + 1);
    let mut header = vec!["#".to_string()];
    header.extend(table.columns.iter().cloned());
    lines.push(header);
    for r in &table.rows {
        let mut line = vec![r.row.to_string()];
        line.extend(r.cells.iter().enumerate().map(|(i, c)| display_cell(i, c)));
        lines.push(line);
    }

    let cols = lines.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..cols)
        .map(|i| {
            lines
                .iter()
                .filter_map(|l| l.get(i))
                .map(|c| width(c))
                .max()
                .unwrap_or(0)
        })
        .collect();

    for line in &lines {
        let mut cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| pad(line.get(i).map(String::as_str).unwrap_or(""), w, rtl))
            .collect();
        if rtl {
            cells.reverse();
        }
        let _ = writeln!(out, "{}", cells.join(" | ").trim_end());
    }
    let _ = writeln!(out, "\n{}", cat.ui.edit_help);
    out
}

pub fn options(cat: &CatalogInfo) -> String {
    let mut out = String::new();
    let title = |i: usize| cat.columns.get(i).map(String::as_str).unwrap_or("");
    let groups = [
        (title(3), &cat.options.locations),
        (title(4), &cat.options.symptoms),
        (title(5), &cat.options.triggers),
    ];
    for (title, values) in groups {
        let _ = writeln!(out, "{title}:");
        for v in values {
            let _ = writeln!(out, "  {v}");
        }
    }
    out
}
