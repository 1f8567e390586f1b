use crate::catalog::CatalogError;
use crate::store::StoreError;
use crate::sync::StepAction;
use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for script- and agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ValidationFailed,
    StructuralRefusal,
    OrderingViolation,
    ProjectNotFound,
    LotNotFound,
    StressNotFound,
    StepNotFound,
    TemplateNotFound,
    InvalidRowId,
    StoreUnavailable,
    CatalogUnavailable,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ValidationFailed => "E2001",
            Self::StructuralRefusal => "E2002",
            Self::OrderingViolation => "E2003",
            Self::ProjectNotFound => "E3001",
            Self::LotNotFound => "E3002",
            Self::StressNotFound => "E3003",
            Self::StepNotFound => "E3004",
            Self::TemplateNotFound => "E3005",
            Self::InvalidRowId => "E3006",
            Self::StoreUnavailable => "E5001",
            Self::CatalogUnavailable => "E6001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Run card workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ValidationFailed => "Validation failed",
            Self::StructuralRefusal => "Structural change refused",
            Self::OrderingViolation => "Step action out of sequence",
            Self::ProjectNotFound => "Project not found",
            Self::LotNotFound => "Lot not found",
            Self::StressNotFound => "Stress group not found",
            Self::StepNotFound => "Step not found",
            Self::TemplateNotFound => "Template not found",
            Self::InvalidRowId => "Invalid row identifier",
            Self::StoreUnavailable => "Record store unavailable",
            Self::CatalogUnavailable => "Catalog service unavailable",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `rc init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .runcard/config.toml and retry."),
            Self::ValidationFailed => Some("Fill in the required header fields and retry."),
            Self::StructuralRefusal => {
                Some("A project keeps at least one lot and every lot keeps one stress group.")
            }
            Self::OrderingViolation => Some(
                "Steps run in order: finish (or skip) the previous step before starting the next.",
            ),
            Self::ProjectNotFound
            | Self::LotNotFound
            | Self::StressNotFound
            | Self::StepNotFound => Some("Run `rc show <project>` to list current identifiers."),
            Self::TemplateNotFound => Some("Run `rc template list` to see saved templates."),
            Self::InvalidRowId => Some(
                "Row ids look like `0-1-0-2`; re-run `rc list` after any structural change.",
            ),
            Self::StoreUnavailable => Some("Check disk space and write permissions, then retry."),
            Self::CatalogUnavailable => Some("Check .runcard/catalog.json; option lists are empty until it loads."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The container level an identifier failed to resolve at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Lot,
    Stress,
    Step,
    Template,
}

impl EntityKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Lot => "lot",
            Self::Stress => "stress group",
            Self::Step => "step",
            Self::Template => "template",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every recoverable failure the engines report. None is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum RunCardError {
    /// No `.runcard/` directory at or above the working directory.
    #[error("not a run card workspace: no .runcard directory above {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("config: {0}")]
    Config(String),

    /// A required header field is missing or a payload is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Attempt to remove the last container of its kind.
    #[error("refused: {0}")]
    StructuralRefusal(String),

    /// Start/finish/skip attempted out of sequence.
    #[error("cannot {action} step {rid}: {reason}")]
    OrderingViolation {
        action: StepAction,
        rid: String,
        reason: &'static str,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("invalid row id '{0}'")]
    InvalidRowId(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),
}

impl RunCardError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::Config(_) => ErrorCode::ConfigParseError,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::StructuralRefusal(_) => ErrorCode::StructuralRefusal,
            Self::OrderingViolation { .. } => ErrorCode::OrderingViolation,
            Self::NotFound { kind, .. } => match kind {
                EntityKind::Project => ErrorCode::ProjectNotFound,
                EntityKind::Lot => ErrorCode::LotNotFound,
                EntityKind::Stress => ErrorCode::StressNotFound,
                EntityKind::Step => ErrorCode::StepNotFound,
                EntityKind::Template => ErrorCode::TemplateNotFound,
            },
            Self::InvalidRowId(_) => ErrorCode::InvalidRowId,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::Catalog(_) => ErrorCode::CatalogUnavailable,
        }
    }

    /// Remediation text suitable for a `suggestion:` line.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.code()
            .hint()
            .unwrap_or_else(|| self.code().message())
            .to_string()
    }
}

pub type Result<T, E = RunCardError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{EntityKind, ErrorCode, RunCardError};
    use crate::sync::StepAction;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::ValidationFailed,
            ErrorCode::StructuralRefusal,
            ErrorCode::OrderingViolation,
            ErrorCode::ProjectNotFound,
            ErrorCode::LotNotFound,
            ErrorCode::StressNotFound,
            ErrorCode::StepNotFound,
            ErrorCode::TemplateNotFound,
            ErrorCode::InvalidRowId,
            ErrorCode::StoreUnavailable,
            ErrorCode::CatalogUnavailable,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::OrderingViolation.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn not_found_maps_to_kind_specific_code() {
        let err = RunCardError::not_found(EntityKind::Lot, "lot_1");
        assert_eq!(err.code(), ErrorCode::LotNotFound);
        assert_eq!(err.to_string(), "lot not found: lot_1");
    }

    #[test]
    fn ordering_violation_renders_action() {
        let err = RunCardError::OrderingViolation {
            action: StepAction::Start,
            rid: "row_1".into(),
            reason: "previous step is not finished",
        };
        assert_eq!(
            err.to_string(),
            "cannot start step row_1: previous step is not finished"
        );
        assert!(err.suggestion().contains("previous step"));
    }
}
