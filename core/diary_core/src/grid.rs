//! Edit-grid projection of the episode table and the change sets applied to it.
//!
//! Rows have no identifier beyond their position in the file, so every change
//! set is expressed in row indices of the table the client last saw.
//! `base_rows` lets the client prove the table has not grown or shrunk since.

use crate::{
    catalog::{self, Direction, Field, Lang},
    form::{self, InputError},
    store::{self, Episode, DATE_FORMAT, TIME_FORMAT},
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
    pub row: usize,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridTable {
    pub lang: Lang,
    pub dir: Direction,
    pub columns: Vec<&'static str>,
    pub rows: Vec<GridRow>,
}

/// A whole table as uploaded for a full overwrite, headers in any locale.
#[derive(Debug, Clone, Deserialize)]
pub struct TableUpload {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowEdit {
    pub row: usize,
    pub cells: Vec<String>,
}

/// Explicit add/update/delete set against a grid the client fetched earlier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub base_rows: Option<usize>,
    #[serde(default)]
    pub added: Vec<Vec<String>>,
    #[serde(default)]
    pub updated: Vec<RowEdit>,
    #[serde(default)]
    pub deleted: Vec<usize>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("table has {actual} rows, change set was built against {expected}")]
    Stale { expected: usize, actual: usize },
    #[error("row {0} does not exist")]
    RowOutOfRange(usize),
    #[error("row {0} is both updated and deleted")]
    RowConflict(usize),
    #[error("row {row}: {source}")]
    Input {
        row: usize,
        #[source]
        source: InputError,
    },
}

impl EditError {
    pub fn code(&self) -> &'static str {
        match self {
            EditError::Stale { .. } => "stale_table",
            EditError::RowOutOfRange(_) => "row_out_of_range",
            EditError::RowConflict(_) => "row_conflict",
            EditError::Input { source, .. } => source.code(),
        }
    }
}

pub fn grid_view(episodes: &[Episode], lang: Lang) -> GridTable {
    GridTable {
        lang,
        dir: lang.direction(),
        columns: catalog::columns(lang).to_vec(),
        rows: episodes
            .iter()
            .enumerate()
            .map(|(row, e)| GridRow {
                row,
                cells: display_cells(e, lang),
            })
            .collect(),
    }
}

fn display_cells(e: &Episode, lang: Lang) -> Vec<String> {
    Field::ALL.iter().map(|&f| display_cell(e, f, lang)).collect()
}

fn display_cell(e: &Episode, field: Field, lang: Lang) -> String {
    match field {
        Field::Date => e
            .date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        Field::Time => e.time.format(TIME_FORMAT).to_string(),
        Field::Intensity => e.intensity.map(|v| v.to_string()).unwrap_or_default(),
        Field::Location => catalog::translate(&e.location, lang).to_string(),
        Field::Symptoms => catalog::translate_list(&e.symptoms, lang),
        Field::Triggers => catalog::translate_list(&e.triggers, lang),
        Field::Medication => e.medication.clone(),
        Field::Notes => e.notes.clone(),
    }
}

fn cell_at(cells: &[String], field: Field) -> &str {
    cells.get(field.index()).map(String::as_str).unwrap_or("")
}

// Parses one cell into `e`. Date, time and the 1-10 range are checked;
// location/symptoms/triggers are free-form and unknown terms are stored as typed.
fn set_field(e: &mut Episode, field: Field, raw: &str) -> Result<(), InputError> {
    let value = raw.trim();
    match field {
        Field::Date => {
            let d = form::parse_input_date(value)
                .ok_or_else(|| InputError::Date(value.to_string()))?;
            e.date = Some(d);
        }
        Field::Time => {
            e.time = store::parse_time(value)
                .ok_or_else(|| InputError::Time(value.to_string()))?;
        }
        Field::Intensity => {
            let v = store::parse_intensity(value)
                .map(i64::from)
                .ok_or_else(|| InputError::Intensity(value.to_string()))
                .and_then(form::check_intensity)?;
            e.intensity = Some(v);
        }
        Field::Location => e.location = catalog::canonicalize(value).to_string(),
        Field::Symptoms => e.symptoms = catalog::canonicalize_list(value),
        Field::Triggers => e.triggers = catalog::canonicalize_list(value),
        Field::Medication => e.medication = value.to_string(),
        Field::Notes => e.notes = raw.to_string(),
    }
    Ok(())
}

/// Cells in column order, any display vocabulary.
pub fn episode_from_cells(cells: &[String]) -> Result<Episode, InputError> {
    let mut e = Episode {
        date: None,
        time: NaiveTime::MIN,
        intensity: None,
        location: String::new(),
        symptoms: String::new(),
        triggers: String::new(),
        medication: String::new(),
        notes: String::new(),
    };
    for field in Field::ALL {
        set_field(&mut e, field, cell_at(cells, field))?;
    }
    Ok(e)
}

/// Applies an edited grid row on top of `current`. Cells that still read as the
/// stored value in either locale are kept as stored and not re-validated.
pub fn update_from_cells(current: &Episode, cells: &[String]) -> Result<Episode, InputError> {
    let mut e = current.clone();
    for field in Field::ALL {
        let raw = cell_at(cells, field);
        let unchanged = [Lang::Russian, Lang::Hebrew]
            .into_iter()
            .any(|lang| display_cell(current, field, lang).trim() == raw.trim());
        if !unchanged {
            set_field(&mut e, field, raw)?;
        }
    }
    Ok(e)
}

/// Maps uploaded headers onto store fields: by position when there are exactly
/// eight columns, otherwise by canonical or display name.
fn resolve_columns(columns: &[String]) -> Result<[Option<usize>; 8], InputError> {
    let mut index = [None; 8];
    if columns.len() == Field::ALL.len() {
        for f in Field::ALL {
            index[f.index()] = Some(f.index());
        }
        return Ok(index);
    }
    for f in Field::ALL {
        index[f.index()] = columns.iter().position(|c| {
            let c = c.trim();
            c == f.canonical_name() || c == f.column_name(Lang::Hebrew)
        });
    }
    if index[Field::Date.index()].is_none()
        || index[Field::Time.index()].is_none()
        || index[Field::Intensity.index()].is_none()
    {
        return Err(InputError::Columns);
    }
    Ok(index)
}

/// Converts an uploaded table back into canonical episodes for a full overwrite.
pub fn restore_canonical(upload: &TableUpload) -> Result<Vec<Episode>, EditError> {
    let index =
        resolve_columns(&upload.columns).map_err(|source| EditError::Input { row: 0, source })?;
    upload
        .rows
        .iter()
        .enumerate()
        .map(|(row, raw)| {
            let cells: Vec<String> = index
                .iter()
                .map(|i| i.and_then(|i| raw.get(i)).cloned().unwrap_or_default())
                .collect();
            episode_from_cells(&cells).map_err(|source| EditError::Input { row, source })
        })
        .collect()
}

/// Applies `changes` to `episodes`: updates in place, then deletions, then additions
/// appended at the end.
pub fn apply(mut episodes: Vec<Episode>, changes: &ChangeSet) -> Result<Vec<Episode>, EditError> {
    let actual = episodes.len();
    if let Some(expected) = changes.base_rows {
        if expected != actual {
            return Err(EditError::Stale { expected, actual });
        }
    }

    let deleted: BTreeSet<usize> = changes.deleted.iter().copied().collect();
    if let Some(&row) = deleted.iter().find(|&&r| r >= actual) {
        return Err(EditError::RowOutOfRange(row));
    }

    let mut replacements = Vec::with_capacity(changes.updated.len());
    for edit in &changes.updated {
        if edit.row >= actual {
            return Err(EditError::RowOutOfRange(edit.row));
        }
        if deleted.contains(&edit.row) {
            return Err(EditError::RowConflict(edit.row));
        }
        let e = update_from_cells(&episodes[edit.row], &edit.cells).map_err(|source| {
            EditError::Input {
                row: edit.row,
                source,
            }
        })?;
        replacements.push((edit.row, e));
    }

    let mut additions = Vec::with_capacity(changes.added.len());
    for (i, cells) in changes.added.iter().enumerate() {
        let e = episode_from_cells(cells).map_err(|source| EditError::Input {
            row: actual + i,
            source,
        })?;
        additions.push(e);
    }

    for (row, e) in replacements {
        episodes[row] = e;
    }
    for &row in deleted.iter().rev() {
        episodes.remove(row);
    }
    episodes.extend(additions);
    Ok(episodes)
}
