use crate::catalog::{Field, CANONICAL_COLUMNS};
use chrono::{Local, NaiveDate, NaiveTime};
use csv::{StringRecord, Terminator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
const SHORT_TIME_FORMAT: &str = "%H:%M";
// Older files carried a different intensity header (e.g. "Интенсивность (1-5)").
const LEGACY_INTENSITY_MARKER: &str = "Интенсивность";

/// One migraine episode, exactly as stored: vocabulary is always canonical.
/// A blank date or intensity cell reads as `None` and is written back blank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub date: Option<NaiveDate>,
    pub time: NaiveTime,
    pub intensity: Option<u8>,
    pub location: String,
    /// Comma-space joined canonical tokens.
    pub symptoms: String,
    /// Comma-space joined canonical tokens.
    pub triggers: String,
    pub medication: String,
    pub notes: String,
}

impl Episode {
    fn to_record(&self) -> [String; 8] {
        [
            self.date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            self.time.format(TIME_FORMAT).to_string(),
            self.intensity.map(|v| v.to_string()).unwrap_or_default(),
            self.location.clone(),
            self.symptoms.clone(),
            self.triggers.clone(),
            self.medication.clone(),
            self.notes.clone(),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on store file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: bad date '{value}'")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: bad intensity '{value}'")]
    InvalidIntensity { row: usize, value: String },
}

/// How a cell that is present but unreadable is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadMode {
    /// Shown blank, with a warning.
    View,
    /// Refused: writing the table back would drop the cell's content.
    Rewrite,
}

/// The single flat file holding every episode. Reads and writes are always whole-file.
#[derive(Clone, Debug)]
pub struct EpisodeStore {
    path: PathBuf,
}

impl EpisodeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All episodes for display. Unreadable dates and intensities show up blank;
    /// an unreadable file gives an empty table.
    pub fn load(&self) -> Vec<Episode> {
        self.load_at(Local::now().time())
    }

    /// Like [`load`](Self::load), with `now` substituted for unreadable times.
    pub fn load_at(&self, now: NaiveTime) -> Vec<Episode> {
        if !self.path.exists() {
            return Vec::new();
        }
        match self.read(now, ReadMode::View) {
            Ok(v) => v,
            Err(err) => {
                warn!("load {} failed, using empty table: {err}", self.path.display());
                Vec::new()
            }
        }
    }

    /// The table a write starts from. Fails instead of degrading, so a file that
    /// cannot be read back faithfully is never overwritten.
    pub fn try_load(&self, now: NaiveTime) -> Result<Vec<Episode>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        self.read(now, ReadMode::Rewrite)
    }

    fn read(&self, now: NaiveTime, mode: ReadMode) -> Result<Vec<Episode>, StoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let headers = rdr.headers()?.clone();
        let rows = rdr.records().collect::<Result<Vec<_>, _>>()?;

        let headers = match normalize_headers(&headers) {
            Some(fixed) => {
                info!("normalizing legacy headers in {}", self.path.display());
                replace_file(&self.path, &fixed, rows.iter())?;
                fixed
            }
            None => headers,
        };

        let index = column_index(&headers);
        rows.iter()
            .enumerate()
            .map(|(i, rec)| parse_row(i, rec, &index, now, mode))
            .collect()
    }

    /// Full overwrite with the canonical header.
    pub fn save(&self, episodes: &[Episode]) -> Result<(), StoreError> {
        let header = StringRecord::from(CANONICAL_COLUMNS.to_vec());
        let rows: Vec<StringRecord> = episodes
            .iter()
            .map(|e| StringRecord::from(e.to_record().to_vec()))
            .collect();
        replace_file(&self.path, &header, rows.iter())
    }

    /// Appends one episode and rewrites the file. Returns the new row count.
    pub fn append(&self, episode: Episode) -> Result<usize, StoreError> {
        let mut episodes = self.try_load(Local::now().time())?;
        episodes.push(episode);
        self.save(&episodes)?;
        Ok(episodes.len())
    }

    /// Raw file content; a header-only document when nothing has been written yet.
    pub fn export(&self) -> Result<String, StoreError> {
        if self.path.exists() {
            return Ok(std::fs::read_to_string(&self.path)?);
        }
        let mut w = writer_builder().from_writer(Vec::new());
        w.write_record(CANONICAL_COLUMNS)?;
        let bytes = w.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn writer_builder() -> csv::WriterBuilder {
    let mut b = csv::WriterBuilder::new();
    b.terminator(Terminator::Any(b'\n'));
    b
}

// Write to a temp file in the same directory, then rename over the target.
// The temp file is removed when it is dropped before `persist`.
fn replace_file<'a>(
    path: &Path,
    header: &StringRecord,
    rows: impl Iterator<Item = &'a StringRecord>,
) -> Result<(), StoreError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = writer_builder().from_writer(tmp.as_file_mut());
        w.write_record(header)?;
        for r in rows {
            w.write_record(r)?;
        }
        w.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Renames stale intensity headers. `None` when nothing needed fixing.
pub fn normalize_headers(headers: &StringRecord) -> Option<StringRecord> {
    let canonical = Field::Intensity.canonical_name();
    let mut changed = false;
    let fixed: Vec<String> = headers
        .iter()
        .map(|h| {
            let h = h.trim_start_matches('\u{feff}');
            if h.contains(LEGACY_INTENSITY_MARKER) && h != canonical {
                changed = true;
                canonical.to_string()
            } else {
                h.to_string()
            }
        })
        .collect();
    changed.then(|| StringRecord::from(fixed))
}

fn column_index(headers: &StringRecord) -> [Option<usize>; 8] {
    let mut index = [None; 8];
    for field in Field::ALL {
        index[field.index()] = headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == field.canonical_name());
    }
    index
}

fn parse_row(
    row: usize,
    rec: &StringRecord,
    index: &[Option<usize>; 8],
    now: NaiveTime,
    mode: ReadMode,
) -> Result<Episode, StoreError> {
    let cell = |f: Field| index[f.index()].and_then(|i| rec.get(i)).unwrap_or("");

    let raw_date = cell(Field::Date);
    let date = match optional_cell(raw_date, parse_date) {
        Ok(d) => d,
        Err(()) if mode == ReadMode::View => {
            warn!("row {row}: unreadable date '{raw_date}', shown blank");
            None
        }
        Err(()) => {
            return Err(StoreError::InvalidDate {
                row,
                value: raw_date.to_string(),
            });
        }
    };
    let raw_intensity = cell(Field::Intensity);
    let intensity = match optional_cell(raw_intensity, parse_intensity) {
        Ok(v) => v,
        Err(()) if mode == ReadMode::View => {
            warn!("row {row}: unreadable intensity '{raw_intensity}', shown blank");
            None
        }
        Err(()) => {
            return Err(StoreError::InvalidIntensity {
                row,
                value: raw_intensity.to_string(),
            });
        }
    };

    Ok(Episode {
        date,
        time: parse_time(cell(Field::Time)).unwrap_or(now),
        intensity,
        location: cell(Field::Location).to_string(),
        symptoms: cell(Field::Symptoms).to_string(),
        triggers: cell(Field::Triggers).to_string(),
        medication: cell(Field::Medication).to_string(),
        notes: cell(Field::Notes).to_string(),
    })
}

/// Blank is `Ok(None)`; text that does not parse is `Err`.
fn optional_cell<T>(raw: &str, parse: fn(&str) -> Option<T>) -> Result<Option<T>, ()> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse(raw).map(Some).ok_or(())
}

/// `YYYY-MM-DD`; a trailing time part (`2024-01-05 00:00:00`) is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Some(d);
    }
    let head = s.split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

/// `HH:MM:SS`, then `HH:MM`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, SHORT_TIME_FORMAT))
        .ok()
}

/// Integer text, or an integral float such as `5.0`.
pub fn parse_intensity(raw: &str) -> Option<u8> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<u8>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&f) {
        Some(f as u8)
    } else {
        None
    }
}
