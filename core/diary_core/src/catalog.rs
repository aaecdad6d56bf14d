//! Bilingual label catalog.
//!
//! Storage always uses the Russian vocabulary. Hebrew is a display locale:
//! values are translated on the way out and canonicalized on the way in.
//! Unknown values pass through unchanged in both directions.

use serde::Serialize;
use std::{collections::HashMap, fmt, str::FromStr, sync::OnceLock};

/// Separator used when multi-valued cells (symptoms, triggers) are stored.
pub const LIST_SEPARATOR: &str = ", ";

// canonical -> Hebrew display. Must stay injective, the reverse map is built from it.
const VALUE_PAIRS: &[(&str, &str)] = &[
    ("Виски", "רקות"),
    ("Затылок", "עורף"),
    ("Лоб", "מצח"),
    ("Правая сторона", "צד ימין"),
    ("Левая сторона", "צד שמאל"),
    ("Вся голова", "כל הראש"),
    ("Шея", "צוואר"),
    ("Глаза", "עיניים"),
    ("Мигрирующая", "נודד"),
    ("Тошнота", "בחילה"),
    ("Светобоязнь", "רגישות לאור"),
    ("Звукобоязнь", "רגישות לרעש"),
    ("Аура", "אורה"),
    ("Головокружение", "סחרחורת"),
    ("Слабость", "חולשה"),
    ("Рвота", "הקאה"),
    ("Стресс", "לחץ/סטרס"),
    ("Недосып", "חוסר שינה"),
    ("Перемена погоды", "מזג אוויר"),
    ("Алкоголь", "אלכוהול"),
    ("Кофеин", "קפאין"),
    ("Голод", "רעב"),
    ("Экран/Монитор", "מסכים"),
    ("Запахи", "ריחות"),
    ("Пропуск еды", "דילוג על ארוחה"),
    ("Яркий свет", "אור חזק"),
];

pub const LOCATIONS: [&str; 8] = [
    "Виски",
    "Затылок",
    "Лоб",
    "Правая сторона",
    "Левая сторона",
    "Вся голова",
    "Шея",
    "Глаза",
];

pub const SYMPTOMS: [&str; 7] = [
    "Тошнота",
    "Светобоязнь",
    "Звукобоязнь",
    "Аура",
    "Головокружение",
    "Слабость",
    "Рвота",
];

pub const TRIGGERS: [&str; 8] = [
    "Стресс",
    "Недосып",
    "Перемена погоды",
    "Алкоголь",
    "Кофеин",
    "Голод",
    "Экран/Монитор",
    "Запахи",
];

/// Header row of the store file.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "Дата",
    "Время",
    "Интенсивность (1-10)",
    "Локализация",
    "Симптомы",
    "Триггеры",
    "Лекарства",
    "Заметки",
];

const HEBREW_COLUMNS: [&str; 8] = [
    "תאריך",
    "שעה",
    "עוצמה (1-10)",
    "מיקום",
    "תסמינים",
    "טריגרים",
    "תרופות",
    "הערות",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Lang {
    #[serde(rename = "ru")]
    Russian,
    #[serde(rename = "he")]
    Hebrew,
}

impl Lang {
    pub const fn code(self) -> &'static str {
        match self {
            Lang::Russian => "ru",
            Lang::Hebrew => "he",
        }
    }

    pub const fn direction(self) -> Direction {
        match self {
            Lang::Russian => Direction::Ltr,
            Lang::Hebrew => Direction::Rtl,
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLang(pub String);

impl fmt::Display for UnknownLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown language '{}' (expected ru or he)", self.0)
    }
}

impl std::error::Error for UnknownLang {}

impl FromStr for Lang {
    type Err = UnknownLang;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ru" | "russian" => Ok(Lang::Russian),
            "he" | "iw" | "hebrew" => Ok(Lang::Hebrew),
            _ => Err(UnknownLang(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

/// The eight store columns, in file order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Time,
    Intensity,
    Location,
    Symptoms,
    Triggers,
    Medication,
    Notes,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Date,
        Field::Time,
        Field::Intensity,
        Field::Location,
        Field::Symptoms,
        Field::Triggers,
        Field::Medication,
        Field::Notes,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn canonical_name(self) -> &'static str {
        CANONICAL_COLUMNS[self.index()]
    }

    pub fn column_name(self, lang: Lang) -> &'static str {
        columns(lang)[self.index()]
    }
}

pub fn columns(lang: Lang) -> [&'static str; 8] {
    match lang {
        Lang::Russian => CANONICAL_COLUMNS,
        Lang::Hebrew => HEBREW_COLUMNS,
    }
}

fn forward() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| VALUE_PAIRS.iter().copied().collect())
}

fn reverse() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| VALUE_PAIRS.iter().map(|&(k, v)| (v, k)).collect())
}

/// Canonical value -> display form for `lang`. Untranslated values come back as-is.
pub fn translate(value: &str, lang: Lang) -> &str {
    match lang {
        Lang::Russian => value,
        Lang::Hebrew => forward().get(value).copied().unwrap_or(value),
    }
}

/// Display value (any locale) -> canonical value. Unknown values come back as-is.
pub fn canonicalize(value: &str) -> &str {
    reverse().get(value).copied().unwrap_or(value)
}

fn split_list(joined: &str) -> impl Iterator<Item = &str> {
    joined.split(',').map(str::trim).filter(|t| !t.is_empty())
}

pub fn translate_list(joined: &str, lang: Lang) -> String {
    split_list(joined)
        .map(|t| translate(t, lang))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

pub fn canonicalize_list(joined: &str) -> String {
    split_list(joined)
        .map(canonicalize)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Tokens of a stored multi-valued cell.
pub fn list_tokens(joined: &str) -> Vec<&str> {
    split_list(joined).collect()
}

pub fn is_location(canonical: &str) -> bool {
    LOCATIONS.iter().any(|&v| v == canonical)
}

pub fn is_symptom(canonical: &str) -> bool {
    SYMPTOMS.iter().any(|&v| v == canonical)
}

pub fn is_trigger(canonical: &str) -> bool {
    TRIGGERS.iter().any(|&v| v == canonical)
}

#[derive(Clone, Debug, Serialize)]
pub struct FormOptions {
    pub locations: Vec<&'static str>,
    pub symptoms: Vec<&'static str>,
    pub triggers: Vec<&'static str>,
}

pub fn options(lang: Lang) -> FormOptions {
    let tr = |values: &[&'static str]| -> Vec<&'static str> {
        values.iter().map(|&v| translate(v, lang)).collect()
    };
    FormOptions {
        locations: tr(&LOCATIONS),
        symptoms: tr(&SYMPTOMS),
        triggers: tr(&TRIGGERS),
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct UiStrings {
    pub menu_add: &'static str,
    pub menu_stats: &'static str,
    pub menu_edit: &'static str,
    pub add_title: &'static str,
    pub save_btn: &'static str,
    pub success: &'static str,
    pub stats_title: &'static str,
    pub total: &'static str,
    pub avg: &'static str,
    pub last: &'static str,
    pub c_cal: &'static str,
    pub c_loc: &'static str,
    pub c_trig: &'static str,
    pub edit_title: &'static str,
    pub edit_help: &'static str,
    pub update_btn: &'static str,
    pub empty: &'static str,
}

const RUSSIAN_UI: UiStrings = UiStrings {
    menu_add: "📝 Добавить запись",
    menu_stats: "📊 Статистика",
    menu_edit: "✏️ Редактор",
    add_title: "Новая запись",
    save_btn: "Сохранить",
    success: "Запись сохранена!",
    stats_title: "Аналитика",
    total: "Всего",
    avg: "Средняя боль",
    last: "Последний раз",
    c_cal: "Хронология",
    c_loc: "Локализация",
    c_trig: "Триггеры",
    edit_title: "Редактор",
    edit_help: "Для удаления укажите номер строки.",
    update_btn: "Обновить данные",
    empty: "Нет данных",
};

const HEBREW_UI: UiStrings = UiStrings {
    menu_add: "📝 הוספת רשומה",
    menu_stats: "📊 סטטיסטיקה",
    menu_edit: "✏️ עריכה",
    add_title: "רשומה חדשה",
    save_btn: "שמור רשומה",
    success: "נשמר בהצלחה!",
    stats_title: "ניתוח נתונים",
    total: "סה״כ התקפים",
    avg: "עוצמה ממוצעת",
    last: "התקף אחרון",
    c_cal: "לוח שנה של הכאב",
    c_loc: "מיקום הכאב",
    c_trig: "טריגרים נפוצים",
    edit_title: "ניהול רשומות",
    edit_help: "למחיקה: ציין את מספר השורה",
    update_btn: "עדכן נתונים",
    empty: "אין נתונים",
};

pub fn ui(lang: Lang) -> &'static UiStrings {
    match lang {
        Lang::Russian => &RUSSIAN_UI,
        Lang::Hebrew => &HEBREW_UI,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_then_canonicalize_is_identity_for_every_pair() {
        for &(canonical, display) in VALUE_PAIRS {
            assert_eq!(translate(canonical, Lang::Hebrew), display);
            assert_eq!(canonicalize(translate(canonical, Lang::Hebrew)), canonical);
            assert_eq!(translate(canonical, Lang::Russian), canonical);
        }
    }

    #[test]
    fn unknown_values_pass_through() {
        assert_eq!(translate("Ибупрофен", Lang::Hebrew), "Ибупрофен");
        assert_eq!(canonicalize("Ибупрофен"), "Ибупрофен");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn reverse_map_is_a_true_inverse() {
        assert_eq!(forward().len(), VALUE_PAIRS.len());
        assert_eq!(reverse().len(), VALUE_PAIRS.len());
    }

    #[test]
    fn every_option_canonicalizes_back_to_storage_vocabulary() {
        for lang in [Lang::Russian, Lang::Hebrew] {
            let opts = options(lang);
            assert!(opts.locations.iter().all(|v| is_location(canonicalize(v))));
            assert!(opts.symptoms.iter().all(|v| is_symptom(canonicalize(v))));
            assert!(opts.triggers.iter().all(|v| is_trigger(canonicalize(v))));
        }
    }

    #[test]
    fn lists_are_split_trimmed_and_rejoined() {
        assert_eq!(translate_list("Стресс, Голод", Lang::Hebrew), "לחץ/סטרס, רעב");
        assert_eq!(canonicalize_list("לחץ/סטרס,רעב, "), "Стресс, Голод");
        assert_eq!(canonicalize_list(""), "");
        assert_eq!(list_tokens(" Голод ,, Кофеин"), vec!["Голод", "Кофеин"]);
    }

    #[test]
    fn lang_parses_codes_and_names() {
        assert_eq!("ru".parse::<Lang>(), Ok(Lang::Russian));
        assert_eq!("Hebrew".parse::<Lang>(), Ok(Lang::Hebrew));
        assert_eq!(" HE ".parse::<Lang>(), Ok(Lang::Hebrew));
        assert!("fr".parse::<Lang>().is_err());
        assert_eq!(Lang::Hebrew.direction(), Direction::Rtl);
        assert_eq!(Field::Intensity.column_name(Lang::Hebrew), "עוצמה (1-10)");
    }
}
