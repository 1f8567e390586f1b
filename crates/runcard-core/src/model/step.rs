use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Sentinel stored in `startTime`/`endTime` for a deliberately bypassed step.
pub const SKIPPED: &str = "SKIPPED";

/// One of the two timestamp slots of a [`Step`].
///
/// Persisted as a plain string: `""` when unset, the literal `SKIPPED`, or a
/// formatted timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TimeMark {
    #[default]
    Unset,
    At(String),
    Skipped,
}

impl TimeMark {
    /// True for anything other than [`TimeMark::Unset`] (including `SKIPPED`).
    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unset => "",
            Self::At(ts) => ts,
            Self::Skipped => SKIPPED,
        }
    }

    /// The real timestamp, if any.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        match self {
            Self::At(ts) => Some(ts),
            Self::Unset | Self::Skipped => None,
        }
    }
}

impl From<String> for TimeMark {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Unset
        } else if trimmed == SKIPPED {
            Self::Skipped
        } else if trimmed.len() == raw.len() {
            Self::At(raw)
        } else {
            Self::At(trimmed.to_string())
        }
    }
}

impl From<&str> for TimeMark {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<TimeMark> for String {
    fn from(mark: TimeMark) -> Self {
        match mark {
            TimeMark::Unset => Self::new(),
            TimeMark::At(ts) => ts,
            TimeMark::Skipped => SKIPPED.to_string(),
        }
    }
}

impl fmt::Display for TimeMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single test operation row inside a stress group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Step {
    #[serde(rename = "_rid")]
    pub rid: String,
    pub stress: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub operation: String,
    pub condition: String,
    pub program_name: String,
    pub test_program: String,
    pub test_script: String,
    pub start_time: TimeMark,
    pub end_time: TimeMark,
    #[serde(alias = "sampleSize")]
    pub qty: String,
    pub hardware: String,
    pub note: String,
    /// Remark entered at check-in/out time.
    pub exec_note: String,
}

impl Step {
    /// An empty step with the given identity.
    #[must_use]
    pub fn empty(rid: impl Into<String>) -> Self {
        Self {
            rid: rid.into(),
            ..Self::default()
        }
    }

    /// Read a descriptive field.
    #[must_use]
    pub fn field(&self, field: StepField) -> &str {
        match field {
            StepField::Stress => &self.stress,
            StepField::Type => &self.step_type,
            StepField::Operation => &self.operation,
            StepField::Condition => &self.condition,
            StepField::ProgramName => &self.program_name,
            StepField::TestProgram => &self.test_program,
            StepField::TestScript => &self.test_script,
            StepField::Qty => &self.qty,
            StepField::Hardware => &self.hardware,
            StepField::Note => &self.note,
            StepField::ExecNote => &self.exec_note,
        }
    }

    /// Overwrite a descriptive field.
    pub fn set_field(&mut self, field: StepField, value: impl Into<String>) {
        let value = value.into();
        match field {
            StepField::Stress => self.stress = value,
            StepField::Type => self.step_type = value,
            StepField::Operation => self.operation = value,
            StepField::Condition => self.condition = value,
            StepField::ProgramName => self.program_name = value,
            StepField::TestProgram => self.test_program = value,
            StepField::TestScript => self.test_script = value,
            StepField::Qty => self.qty = value,
            StepField::Hardware => self.hardware = value,
            StepField::Note => self.note = value,
            StepField::ExecNote => self.exec_note = value,
        }
    }

    /// `endTime` set implies `startTime` set.
    #[must_use]
    pub const fn timestamps_consistent(&self) -> bool {
        !self.end_time.is_set() || self.start_time.is_set()
    }
}

/// The editable, non-timestamp fields of a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepField {
    Stress,
    Type,
    Operation,
    Condition,
    ProgramName,
    TestProgram,
    TestScript,
    Qty,
    Hardware,
    Note,
    ExecNote,
}

impl StepField {
    pub const ALL: [Self; 11] = [
        Self::Stress,
        Self::Type,
        Self::Operation,
        Self::Condition,
        Self::ProgramName,
        Self::TestProgram,
        Self::TestScript,
        Self::Qty,
        Self::Hardware,
        Self::Note,
        Self::ExecNote,
    ];

    /// Persisted (camelCase) key of the field.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Stress => "stress",
            Self::Type => "type",
            Self::Operation => "operation",
            Self::Condition => "condition",
            Self::ProgramName => "programName",
            Self::TestProgram => "testProgram",
            Self::TestScript => "testScript",
            Self::Qty => "qty",
            Self::Hardware => "hardware",
            Self::Note => "note",
            Self::ExecNote => "execNote",
        }
    }
}

impl fmt::Display for StepField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

pub(crate) fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for StepField {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "stress" => Ok(Self::Stress),
            "type" => Ok(Self::Type),
            "operation" | "op" => Ok(Self::Operation),
            "condition" | "cond" => Ok(Self::Condition),
            "programname" | "program" => Ok(Self::ProgramName),
            "testprogram" => Ok(Self::TestProgram),
            "testscript" => Ok(Self::TestScript),
            "qty" | "samplesize" => Ok(Self::Qty),
            "hardware" | "hw" => Ok(Self::Hardware),
            "note" => Ok(Self::Note),
            "execnote" | "remark" => Ok(Self::ExecNote),
            _ => Err(ParseEnumError {
                expected: "step field",
                got: s.to_string(),
            }),
        }
    }
}

/// A partial update of a step's descriptive fields.
///
/// Timestamps are deliberately absent: they only change through the ordered
/// start/finish/skip/unskip actions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepPatch {
    fields: Vec<(StepField, String)>,
}

impl StepPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one field assignment.
    #[must_use]
    pub fn set(mut self, field: StepField, value: impl Into<String>) -> Self {
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(f, _)| *f == field) {
            slot.1 = value;
        } else {
            self.fields.push((field, value));
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: StepField) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (StepField, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Merge the patch into `step`, in assignment order.
    pub fn apply_to(&self, step: &mut Step) {
        for (field, value) in &self.fields {
            step.set_field(*field, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_mark_roundtrips_through_plain_strings() {
        assert_eq!(serde_json::to_string(&TimeMark::Unset).unwrap(), "\"\"");
        assert_eq!(
            serde_json::to_string(&TimeMark::Skipped).unwrap(),
            "\"SKIPPED\""
        );
        assert_eq!(
            serde_json::from_str::<TimeMark>("\"2026-01-02 03:04:05\"").unwrap(),
            TimeMark::At("2026-01-02 03:04:05".into())
        );
        assert_eq!(
            serde_json::from_str::<TimeMark>("\"   \"").unwrap(),
            TimeMark::Unset
        );
    }

    #[test]
    fn step_uses_original_wire_keys() {
        let json = serde_json::json!({
            "_rid": "row_1",
            "stress": "HTOL",
            "type": "ALT",
            "sampleSize": "77",
            "startTime": "SKIPPED",
            "endTime": "SKIPPED",
            "unknownLegacy": true
        });
        let step: Step = serde_json::from_value(json).unwrap();
        assert_eq!(step.rid, "row_1");
        assert_eq!(step.step_type, "ALT");
        assert_eq!(step.qty, "77");
        assert!(step.start_time.is_skipped());
        assert_eq!(step.operation, "");

        let back = serde_json::to_value(&step).unwrap();
        assert_eq!(back["_rid"], "row_1");
        assert_eq!(back["type"], "ALT");
        assert_eq!(back["qty"], "77");
        assert_eq!(back["endTime"], "SKIPPED");
        assert_eq!(back["programName"], "");
    }

    #[test]
    fn step_field_parse_accepts_aliases() {
        assert_eq!("test_program".parse::<StepField>(), Ok(StepField::TestProgram));
        assert_eq!("Sample Size".parse::<StepField>(), Ok(StepField::Qty));
        assert_eq!("remark".parse::<StepField>(), Ok(StepField::ExecNote));
        assert!("startTime".parse::<StepField>().is_err());
        for field in StepField::ALL {
            assert_eq!(field.key().parse::<StepField>(), Ok(field));
        }
    }

    #[test]
    fn patch_replaces_duplicate_assignments() {
        let patch = StepPatch::new()
            .set(StepField::Note, "first")
            .set(StepField::Qty, "5")
            .set(StepField::Note, "second");
        assert_eq!(patch.get(StepField::Note), Some("second"));
        assert_eq!(patch.iter().count(), 2);

        let mut step = Step::empty("row_x");
        patch.apply_to(&mut step);
        assert_eq!(step.note, "second");
        assert_eq!(step.qty, "5");
        assert_eq!(step.rid, "row_x");
    }

    #[test]
    fn consistency_requires_start_for_end() {
        let mut step = Step::empty("r");
        assert!(step.timestamps_consistent());
        step.end_time = TimeMark::At("2026-01-01 00:00:00".into());
        assert!(!step.timestamps_consistent());
        step.start_time = TimeMark::Skipped;
        assert!(step.timestamps_consistent());
    }
}
