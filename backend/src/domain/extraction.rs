//! Grades page extraction.
//!
//! Turns the portal's semester-sheet HTML into a [`ProgressTable`]. The page
//! format is fixed and not under our control, so extraction is strict: the
//! first malformed field aborts the whole run and no partial table escapes.
//!
//! Page contract:
//! - `div#div-Student_SemesterSheet__Mark` marks the grades page;
//! - every `tbody` is one discipline, in document order;
//! - inside a `tbody`, rows with exactly 2 or 4 `td` cells are control
//!   events (cell 0 is the name, the last cell is the grade); other row
//!   shapes are headers or decoration and are skipped;
//! - every `.my-2 div:first-child` block names one discipline. Only its own
//!   text nodes count; nested markup such as badges is ignored.
//!
//! Names pair with tables purely by position. Nothing in the page ties a
//! name block to its `tbody`, so a portal that reorders one list relative
//! to the other would mislabel disciplines without any error. A differing
//! count is detected and rejected.

use std::fmt;
use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};

use super::{ControlEvent, Discipline, ProgressTable, UserId, clean_text};

const GRADES_MARKER_SELECTOR: &str = "div#div-Student_SemesterSheet__Mark";
const TABLE_BODY_SELECTOR: &str = "tbody";
const ROW_SELECTOR: &str = "tr";
const CELL_SELECTOR: &str = "td";
const DISCIPLINE_NAME_SELECTOR: &str = ".my-2 div:first-child";

/// Where in the page an empty field was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    /// Name cell of a control event row.
    ControlEventName {
        /// Zero-based `tbody` index in document order.
        table: usize,
        /// Zero-based index among the table's kept (2- or 4-cell) rows.
        row: usize,
    },
    /// Discipline name block.
    DisciplineName {
        /// Zero-based name-block index in document order.
        discipline: usize,
    },
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlEventName { table, row } => {
                write!(f, "control event name (table {table}, row {row})")
            }
            Self::DisciplineName { discipline } => {
                write!(f, "discipline name (discipline {discipline})")
            }
        }
    }
}

/// Reasons a fetched page could not become a progress table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The page is not the grades page, e.g. the portal served a login form.
    #[error("page is not the grades page")]
    WrongGradesPage,
    /// A required text field was blank after cleaning.
    #[error("empty {location}")]
    EmptyField {
        /// Position of the offending field.
        location: FieldLocation,
    },
    /// The page or the assembled table is not clean UTF-8 text.
    #[error("page text is not valid UTF-8: {reason}")]
    NonUtf8 {
        /// What was wrong with the text.
        reason: String,
    },
    /// The page lists a different number of names than tables.
    #[error("page has {tables} discipline tables but {names} discipline names")]
    MisalignedDisciplines {
        /// Number of `tbody` blocks.
        tables: usize,
        /// Number of discipline name blocks.
        names: usize,
    },
}

fn selector(cell: &'static OnceLock<Selector>, css: &'static str) -> &'static Selector {
    cell.get_or_init(|| {
        Selector::parse(css)
            .unwrap_or_else(|error| panic!("selector `{css}` failed to compile: {error}"))
    })
}

fn grades_marker() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, GRADES_MARKER_SELECTOR)
}

fn table_body() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, TABLE_BODY_SELECTOR)
}

fn row() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, ROW_SELECTOR)
}

fn cell() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, CELL_SELECTOR)
}

fn discipline_name() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    selector(&CELL, DISCIPLINE_NAME_SELECTOR)
}

/// A fetched portal page, parsed and ready for inspection.
pub struct GradesPage {
    document: Html,
}

impl GradesPage {
    /// Decode `raw` strictly as UTF-8 and parse it as HTML.
    pub fn parse(raw: &[u8]) -> Result<Self, ExtractionError> {
        let text = std::str::from_utf8(raw).map_err(|error| ExtractionError::NonUtf8 {
            reason: error.to_string(),
        })?;
        Ok(Self::from_html(text))
    }

    /// Parse already-decoded HTML.
    pub fn from_html(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Whether the page carries the grade-sheet marker element.
    pub fn is_grades_page(&self) -> bool {
        self.document.select(grades_marker()).next().is_some()
    }

    /// Walk the page into a validated progress table for `user_id`.
    ///
    /// # Examples
    /// ```
    /// use tracking_bars::domain::{GradesPage, UserId};
    ///
    /// let page = GradesPage::from_html(
    ///     r#"<div id="div-Student_SemesterSheet__Mark">
    ///          <div class="my-2"><div> Math </div></div>
    ///          <table><tbody><tr><td>Exam</td><td>5</td></tr></tbody></table>
    ///        </div>"#,
    /// );
    /// let table = page.extract(UserId::new(1)).unwrap();
    /// assert_eq!(table.disciplines()[0].name(), "Math");
    /// ```
    pub fn extract(&self, user_id: UserId) -> Result<ProgressTable, ExtractionError> {
        if !self.is_grades_page() {
            return Err(ExtractionError::WrongGradesPage);
        }

        let event_blocks = self.control_event_blocks()?;
        let names = self.discipline_names()?;
        if names.len() != event_blocks.len() {
            return Err(ExtractionError::MisalignedDisciplines {
                tables: event_blocks.len(),
                names: names.len(),
            });
        }

        let disciplines = names
            .into_iter()
            .zip(event_blocks)
            .enumerate()
            .map(|(index, (name, events))| {
                Discipline::new(&name, events).map_err(|_| ExtractionError::EmptyField {
                    location: FieldLocation::DisciplineName { discipline: index },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let table = ProgressTable::new(user_id, disciplines);
        validate_text(&table)?;
        Ok(table)
    }

    fn control_event_blocks(&self) -> Result<Vec<Vec<ControlEvent>>, ExtractionError> {
        self.document
            .select(table_body())
            .enumerate()
            .map(|(table, tbody)| {
                tbody
                    .select(row())
                    .filter(|tr| is_control_event_row(*tr))
                    .enumerate()
                    .map(|(row, tr)| {
                        control_event(tr).ok_or(ExtractionError::EmptyField {
                            location: FieldLocation::ControlEventName { table, row },
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }

    fn discipline_names(&self) -> Result<Vec<String>, ExtractionError> {
        self.document
            .select(discipline_name())
            .enumerate()
            .map(|(discipline, block)| {
                let name = clean_text(&own_text(block));
                if name.is_empty() {
                    Err(ExtractionError::EmptyField {
                        location: FieldLocation::DisciplineName { discipline },
                    })
                } else {
                    Ok(name)
                }
            })
            .collect()
    }
}

/// Decode, parse and extract in one step.
///
/// Keeps the parsed document local to the call, so async callers never hold
/// it across an await point.
pub fn extract_progress_table(
    user_id: UserId,
    raw: &[u8],
) -> Result<ProgressTable, ExtractionError> {
    GradesPage::parse(raw)?.extract(user_id)
}

fn is_control_event_row(tr: ElementRef<'_>) -> bool {
    matches!(tr.select(cell()).count(), 2 | 4)
}

/// Returns `None` when the name cell is blank.
fn control_event(tr: ElementRef<'_>) -> Option<ControlEvent> {
    let cells = tr.select(cell()).collect::<Vec<_>>();
    let name = cells.first().map(|td| td.text().collect::<String>())?;
    let grade = cells
        .last()
        .map(|td| td.text().collect::<String>())
        .unwrap_or_default();
    ControlEvent::new(&name, &grade).ok()
}

/// Text of the element's direct text children, skipping nested elements.
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect()
}

/// Reject tables carrying traces of a lossy transcode or binary garbage.
fn validate_text(table: &ProgressTable) -> Result<(), ExtractionError> {
    let rendered = table.to_string();
    if rendered.contains(char::REPLACEMENT_CHARACTER) {
        return Err(ExtractionError::NonUtf8 {
            reason: "table contains U+FFFD replacement characters".to_owned(),
        });
    }
    if rendered
        .chars()
        .any(|c| c.is_control() && !c.is_whitespace())
    {
        return Err(ExtractionError::NonUtf8 {
            reason: "table contains control characters".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
