//! `rc queue`: the check-in work queue of unfinished projects.

use super::Workspace;
use crate::output::{OutputMode, pretty_rule, render_mode};
use anyhow::Result;
use clap::Args;
use runcard_core::flatten::{QueueMode, WorkQueue};
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Which unfinished projects to list: all, in-process, init.
    #[arg(short, long, default_value = "all")]
    pub mode: QueueMode,

    /// Substring the Product ID must contain (case-sensitive).
    #[arg(short, long, default_value = "")]
    pub product: String,
}

fn render_text(queue: &WorkQueue, w: &mut dyn Write) -> io::Result<()> {
    for e in &queue.entries {
        writeln!(w, "{}\t{}\t{}\t{}", e.project_id, e.product_id, e.status, e.progress)?;
    }
    Ok(())
}

fn render_pretty(queue: &WorkQueue, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "All {} · In process {} · Init {}",
        queue.all, queue.in_process, queue.init
    )?;
    pretty_rule(w)?;
    for e in &queue.entries {
        let progress = format!("{} {}%", e.progress, e.progress.percent());
        writeln!(
            w,
            "{:<16} {:<11} {:>12}  {}",
            e.product_id,
            e.status.to_string(),
            progress,
            e.project_id
        )?;
    }
    if queue.entries.is_empty() {
        writeln!(w, "  (nothing waiting)")?;
    }
    Ok(())
}

pub fn run_queue(args: &QueueArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(project_root)?;
    let queue = WorkQueue::build(&ws.engine.projects()?, args.mode, &args.product);
    render_mode(output, &queue, render_text, render_pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: QueueArgs,
    }

    #[test]
    fn mode_accepts_aliases() {
        let w = Wrapper::parse_from(["test", "--mode", "ongoing"]);
        assert_eq!(w.args.mode, QueueMode::InProcess);
        let w = Wrapper::parse_from(["test", "-m", "pending", "-p", "PX"]);
        assert_eq!(w.args.mode, QueueMode::Init);
        assert_eq!(w.args.product, "PX");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Wrapper::try_parse_from(["test", "--mode", "done"]).is_err());
    }
}
