//! Capture and replay of a lot's stress/step shape.

use crate::error::{Result, RunCardError};
use crate::ids;
use crate::model::{Lot, Step, StressGroup, TimeMark};
use serde::{Deserialize, Serialize};

/// Step fields that survive capture: everything except identity, timestamps
/// and the check-in/out remark.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateStep {
    pub stress: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub operation: String,
    pub condition: String,
    pub program_name: String,
    pub test_program: String,
    pub test_script: String,
    #[serde(alias = "sampleSize")]
    pub qty: String,
    pub hardware: String,
    pub note: String,
}

impl From<&Step> for TemplateStep {
    fn from(step: &Step) -> Self {
        Self {
            stress: step.stress.clone(),
            step_type: step.step_type.clone(),
            operation: step.operation.clone(),
            condition: step.condition.clone(),
            program_name: step.program_name.clone(),
            test_program: step.test_program.clone(),
            test_script: step.test_script.clone(),
            qty: step.qty.clone(),
            hardware: step.hardware.clone(),
            note: step.note.clone(),
        }
    }
}

impl TemplateStep {
    /// A new Init step with a fresh `_rid` and these field values.
    #[must_use]
    pub fn instantiate(&self) -> Step {
        Step {
            rid: ids::step_rid(),
            stress: self.stress.clone(),
            step_type: self.step_type.clone(),
            operation: self.operation.clone(),
            condition: self.condition.clone(),
            program_name: self.program_name.clone(),
            test_program: self.test_program.clone(),
            test_script: self.test_script.clone(),
            start_time: TimeMark::Unset,
            end_time: TimeMark::Unset,
            qty: self.qty.clone(),
            hardware: self.hardware.clone(),
            note: self.note.clone(),
            exec_note: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateStress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress: Option<String>,
    pub row_data: Vec<TemplateStep>,
}

/// A named, identity-free lot shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub stresses: Vec<TemplateStress>,
}

impl Template {
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.stresses.iter().map(|g| g.row_data.len()).sum()
    }
}

/// Snapshot a lot's groups and steps, dropping `_rid` and both timestamps.
#[must_use]
pub fn capture(name: &str, lot: &Lot) -> Template {
    Template {
        name: name.to_string(),
        stresses: lot
            .stresses
            .iter()
            .map(|group| TemplateStress {
                stress: group.stress.clone(),
                row_data: group.row_data.iter().map(TemplateStep::from).collect(),
            })
            .collect(),
    }
}

/// Replace `lot.stresses` wholesale with fresh copies of the template shape.
///
/// Destructive: prior steps of the lot are discarded, timestamps included.
///
/// # Errors
///
/// [`RunCardError::Validation`] if the template has no groups or a group has
/// no steps; the lot is left untouched.
pub fn apply(lot: &mut Lot, template: &Template) -> Result<()> {
    if template.stresses.is_empty() {
        return Err(RunCardError::Validation(format!(
            "template '{}' has no stress groups",
            template.name
        )));
    }
    if template.stresses.iter().any(|g| g.row_data.is_empty()) {
        return Err(RunCardError::Validation(format!(
            "template '{}' has an empty stress group",
            template.name
        )));
    }
    lot.stresses = template
        .stresses
        .iter()
        .map(|group| StressGroup {
            id: ids::stress_id(),
            stress: group.stress.clone(),
            row_data: group.row_data.iter().map(TemplateStep::instantiate).collect(),
        })
        .collect();
    Ok(())
}

/// Insert or overwrite (by name) a template in the collection.
pub fn upsert(templates: &mut Vec<Template>, template: Template) {
    match templates.iter_mut().find(|t| t.name == template.name) {
        Some(existing) => *existing = template,
        None => templates.push(template),
    }
}
