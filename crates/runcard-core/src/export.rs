//! Spreadsheet report export.
//!
//! Reports are three-column CSV (`Category,Field,Value`) prefixed with a
//! UTF-8 byte-order mark so spreadsheet tools pick the right encoding.

use crate::model::{Lot, Project, TimeMark};
use std::io;

/// UTF-8 byte-order mark.
pub const BOM: &str = "\u{feff}";

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv flush: {0}")]
    Io(#[from] io::Error),
}

type Writer = csv::Writer<Vec<u8>>;

fn writer() -> Result<Writer, ExportError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(BOM.as_bytes());
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buf);
    wtr.write_record(["Category", "Field", "Value"])?;
    Ok(wtr)
}

fn finish(wtr: Writer) -> Result<Vec<u8>, ExportError> {
    wtr.into_inner().map_err(|err| ExportError::Io(err.into_error()))
}

fn write_header(wtr: &mut Writer, project: &Project) -> Result<(), ExportError> {
    for (field, value) in project.header.ordered() {
        wtr.write_record(["Project Info", field, value])?;
    }
    Ok(())
}

fn mark_or_na(mark: &TimeMark) -> &str {
    if mark.is_set() {
        mark.as_str()
    } else {
        NOT_AVAILABLE
    }
}

fn write_steps(wtr: &mut Writer, lot: &Lot) -> Result<(), ExportError> {
    for group in &lot.stresses {
        for (idx, step) in group.row_data.iter().enumerate() {
            let category = format!("Stress: {}", group.stress_label(step));
            let n = idx + 1;
            let start = format!("Step {n} Start");
            let end = format!("Step {n} End");
            wtr.write_record([category.as_str(), start.as_str(), mark_or_na(&step.start_time)])?;
            wtr.write_record([category.as_str(), end.as_str(), mark_or_na(&step.end_time)])?;
        }
    }
    Ok(())
}

/// Report for one lot: project header rows, then a start/end pair per step.
/// Step numbering restarts in each stress group.
///
/// # Errors
///
/// CSV encoding failures.
pub fn lot_csv(project: &Project, lot: &Lot) -> Result<Vec<u8>, ExportError> {
    let mut wtr = writer()?;
    write_header(&mut wtr, project)?;
    write_steps(&mut wtr, lot)?;
    finish(wtr)
}

/// Report for a whole project: header rows, then each lot introduced by a
/// `Lot,Lot ID,<label>` row.
///
/// # Errors
///
/// CSV encoding failures.
pub fn project_csv(project: &Project) -> Result<Vec<u8>, ExportError> {
    let mut wtr = writer()?;
    write_header(&mut wtr, project)?;
    for lot in &project.lots {
        wtr.write_record(["Lot", "Lot ID", lot.lot_id.as_str()])?;
        write_steps(&mut wtr, lot)?;
    }
    finish(wtr)
}

/// Suggested report file name, `Report_<lot>_<product id>.csv`.
#[must_use]
pub fn report_file_name(project: &Project, lot: Option<&Lot>) -> String {
    let lot_part = lot.map_or("all", |l| l.lot_id.as_str());
    let sanitize = |s: &str| {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect::<String>()
    };
    format!(
        "Report_{}_{}.csv",
        sanitize(lot_part),
        sanitize(project.product_id())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::{FIELD_OWNER, FIELD_PRODUCT_ID};
    use crate::model::{Header, Step, StressGroup};
    use crate::status::ProjectStatus;
    use chrono::NaiveDateTime;

    fn project() -> Project {
        let now = NaiveDateTime::parse_from_str("2026-05-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let mut header = Header::new();
        header.set(FIELD_OWNER, "Kim, R.");
        header.set(FIELD_PRODUCT_ID, "P-9");
        let mut lot = Lot::fresh("LOT A");
        lot.stresses[0].row_data[0].stress = "HTOL".into();
        lot.stresses[0].row_data[0].start_time = TimeMark::from("2026-05-01 09:00:00");
        let mut tc = StressGroup::fresh();
        tc.stress = Some("TC".into());
        tc.row_data.push(Step {
            start_time: TimeMark::Skipped,
            end_time: TimeMark::Skipped,
            ..Step::empty("row_x")
        });
        lot.stresses.push(tc);
        Project {
            id: "proj_1".into(),
            header,
            lots: vec![lot],
            status: ProjectStatus::InProcess,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn lot_report_layout() {
        let p = project();
        let bytes = lot_csv(&p, &p.lots[0]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(BOM));
        let lines: Vec<&str> = text.trim_start_matches(BOM).lines().collect();
        assert_eq!(
            lines,
            vec![
                "Category,Field,Value",
                "Project Info,Product ID,P-9",
                "Project Info,Owner,\"Kim, R.\"",
                "Stress: HTOL,Step 1 Start,2026-05-01 09:00:00",
                "Stress: HTOL,Step 1 End,N/A",
                "Stress: TC,Step 1 Start,N/A",
                "Stress: TC,Step 1 End,N/A",
                "Stress: TC,Step 2 Start,SKIPPED",
                "Stress: TC,Step 2 End,SKIPPED",
            ]
        );
    }

    #[test]
    fn project_report_introduces_each_lot() {
        let mut p = project();
        p.lots.push(Lot::fresh("LOT B"));
        let text = String::from_utf8(project_csv(&p).unwrap()).unwrap();
        let lot_rows: Vec<&str> = text.lines().filter(|l| l.starts_with("Lot,")).collect();
        assert_eq!(lot_rows, vec!["Lot,Lot ID,LOT A", "Lot,Lot ID,LOT B"]);
    }

    #[test]
    fn file_name_is_filesystem_safe() {
        let p = project();
        assert_eq!(
            report_file_name(&p, Some(&p.lots[0])),
            "Report_LOT_A_P-9.csv"
        );
        assert_eq!(report_file_name(&p, None), "Report_all_P-9.csv");
    }
}
