//! Progress table data model: disciplines and their control events.
//!
//! Values are immutable once constructed. Every text field is cleaned with
//! [`clean_text`] on the way in, so two snapshots of the same page compare
//! equal regardless of the markup's incidental whitespace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Grade recorded for a control event the portal has no mark for yet.
pub const ABSENT_GRADE: &str = "отсутствует";

/// Collapse every whitespace run to one space and trim both ends.
///
/// Cleaning is idempotent: `clean_text(&clean_text(s)) == clean_text(s)`.
///
/// # Examples
/// ```
/// use tracking_bars::domain::clean_text;
///
/// assert_eq!(clean_text("  Math \n "), "Math");
/// assert_eq!(clean_text("Lab\t\twork  1"), "Lab work 1");
/// ```
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Opaque key of the user a snapshot or credential row belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw user key.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw user key.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validation errors raised by the entity constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// A discipline name was blank after cleaning.
    EmptyDisciplineName,
    /// A control event name was blank after cleaning.
    EmptyControlEventName,
}

impl fmt::Display for EntityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDisciplineName => write!(f, "discipline name must not be empty"),
            Self::EmptyControlEventName => write!(f, "control event name must not be empty"),
        }
    }
}

impl std::error::Error for EntityValidationError {}

/// One graded assessment item inside a discipline.
///
/// ## Invariants
/// - `name` is cleaned and non-empty.
/// - `grade` is cleaned and never empty; a missing grade is stored as
///   [`ABSENT_GRADE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ControlEventDto")]
pub struct ControlEvent {
    name: String,
    grade: String,
}

impl ControlEvent {
    /// Build a control event from raw cell text.
    ///
    /// # Examples
    /// ```
    /// use tracking_bars::domain::{ControlEvent, ABSENT_GRADE};
    ///
    /// let quiz = ControlEvent::new(" Quiz ", "  ").unwrap();
    /// assert_eq!(quiz.name(), "Quiz");
    /// assert_eq!(quiz.grade(), ABSENT_GRADE);
    /// ```
    pub fn new(name: &str, grade: &str) -> Result<Self, EntityValidationError> {
        let name = clean_text(name);
        if name.is_empty() {
            return Err(EntityValidationError::EmptyControlEventName);
        }
        let grade = clean_text(grade);
        let grade = if grade.is_empty() {
            ABSENT_GRADE.to_owned()
        } else {
            grade
        };
        Ok(Self { name, grade })
    }

    /// Control event name, e.g. "Exam".
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Grade text as shown by the portal, or [`ABSENT_GRADE`].
    pub fn grade(&self) -> &str {
        self.grade.as_str()
    }

    /// Whether the portal has no grade for this event yet.
    pub fn is_absent(&self) -> bool {
        self.grade == ABSENT_GRADE
    }
}

#[derive(Deserialize)]
struct ControlEventDto {
    name: String,
    grade: String,
}

impl TryFrom<ControlEventDto> for ControlEvent {
    type Error = EntityValidationError;

    fn try_from(value: ControlEventDto) -> Result<Self, Self::Error> {
        Self::new(&value.name, &value.grade)
    }
}

/// One discipline and its control events in document order.
///
/// ## Invariants
/// - `name` is cleaned and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DisciplineDto")]
pub struct Discipline {
    name: String,
    control_events: Vec<ControlEvent>,
}

impl Discipline {
    /// Build a discipline from a raw name and already-validated events.
    pub fn new(
        name: &str,
        control_events: Vec<ControlEvent>,
    ) -> Result<Self, EntityValidationError> {
        let name = clean_text(name);
        if name.is_empty() {
            return Err(EntityValidationError::EmptyDisciplineName);
        }
        Ok(Self {
            name,
            control_events,
        })
    }

    /// Discipline name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Control events in document order.
    pub fn control_events(&self) -> &[ControlEvent] {
        &self.control_events
    }
}

#[derive(Deserialize)]
struct DisciplineDto {
    name: String,
    control_events: Vec<ControlEvent>,
}

impl TryFrom<DisciplineDto> for Discipline {
    type Error = EntityValidationError;

    fn try_from(value: DisciplineDto) -> Result<Self, Self::Error> {
        Self::new(&value.name, value.control_events)
    }
}

/// Full snapshot of one user's grades at fetch time.
///
/// A table with no disciplines means "not fetched yet". A failed fetch never
/// produces a table at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTable {
    user_id: UserId,
    disciplines: Vec<Discipline>,
}

impl ProgressTable {
    /// Build a snapshot for `user_id`.
    pub fn new(user_id: UserId, disciplines: Vec<Discipline>) -> Self {
        Self {
            user_id,
            disciplines,
        }
    }

    /// Placeholder snapshot for a user whose grades were never fetched.
    pub fn not_fetched(user_id: UserId) -> Self {
        Self::new(user_id, Vec::new())
    }

    /// Owner of the snapshot.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Disciplines in document order.
    pub fn disciplines(&self) -> &[Discipline] {
        &self.disciplines
    }

    /// Whether the snapshot holds fetched data.
    pub fn is_fetched(&self) -> bool {
        !self.disciplines.is_empty()
    }
}

/// Plain-text report: one block per discipline, one `name: grade` line per
/// control event.
impl fmt::Display for ProgressTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, discipline) in self.disciplines.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", discipline.name)?;
            for event in &discipline.control_events {
                writeln!(f, "  {}: {}", event.name, event.grade)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("  Math \n ", "Math")]
    #[case("Lab\t\twork \u{a0} 1", "Lab work 1")]
    #[case("", "")]
    #[case(" \n\t ", "")]
    fn clean_text_collapses_and_trims(#[case] raw: &str, #[case] expected: &str) {
        let cleaned = clean_text(raw);
        assert_eq!(cleaned, expected);
        assert_eq!(clean_text(&cleaned), cleaned, "cleaning must be idempotent");
    }

    #[rstest]
    #[case("Exam", "5", "5")]
    #[case("Quiz", "", ABSENT_GRADE)]
    #[case("Quiz", " \n ", ABSENT_GRADE)]
    #[case("Essay", " зачтено ", "зачтено")]
    fn control_event_normalises_grade(
        #[case] name: &str,
        #[case] grade: &str,
        #[case] expected: &str,
    ) {
        let event = ControlEvent::new(name, grade).expect("event name is present");
        assert_eq!(event.grade(), expected);
        assert_eq!(event.is_absent(), expected == ABSENT_GRADE);
    }

    #[test]
    fn control_event_rejects_blank_name() {
        let err = ControlEvent::new("  ", "5").expect_err("blank name must fail");
        assert_eq!(err, EntityValidationError::EmptyControlEventName);
    }

    #[test]
    fn discipline_rejects_blank_name() {
        let err = Discipline::new("\n", Vec::new()).expect_err("blank name must fail");
        assert_eq!(err, EntityValidationError::EmptyDisciplineName);
    }

    #[test]
    fn empty_table_reports_not_fetched() {
        let table = ProgressTable::not_fetched(UserId::new(7));
        assert!(!table.is_fetched());
        assert_eq!(table.to_string(), "");
    }

    #[test]
    fn display_renders_one_block_per_discipline() {
        let table = ProgressTable::new(
            UserId::new(1),
            vec![
                Discipline::new(
                    "Math",
                    vec![
                        ControlEvent::new("Exam", "5").expect("valid event"),
                        ControlEvent::new("Quiz", "").expect("valid event"),
                    ],
                )
                .expect("valid discipline"),
                Discipline::new("Physics", Vec::new()).expect("valid discipline"),
            ],
        );

        assert_eq!(
            table.to_string(),
            "Math\n  Exam: 5\n  Quiz: отсутствует\n\nPhysics\n"
        );
    }

    #[test]
    fn deserialisation_enforces_invariants() {
        let payload = r#"{"user_id":3,"disciplines":[{"name":"  ","control_events":[]}]}"#;
        let result = serde_json::from_str::<ProgressTable>(payload);
        assert!(result.is_err(), "blank discipline names must not deserialise");
    }

    #[test]
    fn serialisation_keeps_cleaned_values() {
        let table = ProgressTable::new(
            UserId::new(3),
            vec![
                Discipline::new(
                    "Math",
                    vec![ControlEvent::new("Exam", "").expect("valid event")],
                )
                .expect("valid discipline"),
            ],
        );
        let json = serde_json::to_string(&table).expect("table serialises");
        let decoded: ProgressTable = serde_json::from_str(&json).expect("table deserialises");
        assert_eq!(decoded, table);
    }
}
