#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode};
use runcard_core::StepAction;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rc: reliability-test run card tracker",
    long_about = None
)]
struct Cli {
    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a run card workspace",
        long_about = "Create .runcard/ in the current directory with config, store and catalog.",
        after_help = "EXAMPLES:\n    # Initialize with the JSON file store\n    rc init\n\n    # Use SQLite instead\n    rc init --backend sqlite"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Projects",
        about = "Create a project",
        long_about = "Create a project with header fields and one or more lots.",
        after_help = "EXAMPLES:\n    # One unlabelled lot\n    rc create --product-id P-100\n\n    # Two lots from a saved template\n    rc create --product-id P-100 -f Owner=kim -l L1 -l L2 -t htol-basic\n\n    # Emit machine-readable output\n    rc create --product-id P-100 --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Projects",
        about = "Show one project",
        long_about = "Show a project's header, lots, stress groups and steps with row ids.",
        after_help = "EXAMPLES:\n    # By Product ID\n    rc show P-100\n\n    # Emit machine-readable output\n    rc show P-100 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Projects",
        about = "Add, copy, rename or remove lots",
        after_help = "EXAMPLES:\n    # Add a lot\n    rc lot add P-100 --label L3\n\n    # Copy a lot with its steps\n    rc lot dup P-100 lot-abc"
    )]
    Lot(cmd::lot::LotArgs),

    #[command(
        next_help_heading = "Projects",
        about = "Add or remove stress groups",
        after_help = "EXAMPLES:\n    rc stress add P-100 lot-abc\n    rc stress rm P-100 lot-abc st-xyz"
    )]
    Stress(cmd::stress::StressArgs),

    #[command(
        next_help_heading = "Projects",
        about = "Add, remove, copy, move or edit steps",
        after_help = "EXAMPLES:\n    # Pick stress, type and operation; condition follows the catalog\n    rc step set 0-0-0-0 stress=HTOL type=ALT operation=168h\n\n    # Move a step to the top of its group\n    rc step move r-abc 0"
    )]
    Step(cmd::step::StepArgs),

    #[command(
        next_help_heading = "Projects",
        about = "Set or clear a header field",
        after_help = "EXAMPLES:\n    rc header set P-100 Owner kim\n    rc header set P-100 Remark"
    )]
    Header(cmd::header::HeaderArgs),

    #[command(
        next_help_heading = "Check-in",
        about = "Check a step in",
        long_about = "Stamp a step's start time. The previous step must have ended.",
        after_help = "EXAMPLES:\n    rc start 0-0-0-0\n    rc start r-abc --remark \"oven 3\""
    )]
    Start(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Check-in",
        about = "Check a step out",
        long_about = "Stamp a started step's end time.",
        after_help = "EXAMPLES:\n    rc finish 0-0-0-0"
    )]
    Finish(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Check-in",
        about = "Skip a step",
        long_about = "Mark an unstarted step SKIPPED. The previous step must have ended.",
        after_help = "EXAMPLES:\n    rc skip 0-0-0-1 --remark \"not required\""
    )]
    Skip(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Check-in",
        about = "Undo a skip",
        long_about = "Clear a skipped step's end time. The next step must not have started.",
        after_help = "EXAMPLES:\n    rc unskip 0-0-0-1"
    )]
    Unskip(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Views",
        about = "List step rows",
        long_about = "List every step as a flat row with search, date range, column filters and pages.",
        after_help = "EXAMPLES:\n    # Search everything\n    rc list -s htol\n\n    # Last three months, two operations in this order\n    rc list --preset 3m -f operation=168h -f operation=500h\n\n    # Distinct owners for building a filter\n    rc list --values Owner"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Views",
        about = "One line per lot",
        after_help = "EXAMPLES:\n    rc lots\n    rc lots --status in-process --json"
    )]
    Lots(cmd::lots::LotsArgs),

    #[command(
        next_help_heading = "Views",
        about = "Unfinished projects to check in",
        after_help = "EXAMPLES:\n    rc queue\n    rc queue --mode in-process --product P-1"
    )]
    Queue(cmd::queue::QueueArgs),

    #[command(
        next_help_heading = "Views",
        about = "Lot status counters",
        after_help = "EXAMPLES:\n    rc stats\n    rc stats --completed"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Bulk-delete step rows",
        long_about = "Delete selected rows. Emptied stress groups, lots and projects are removed with them.",
        after_help = "EXAMPLES:\n    rc delete 0-0-0-1 1-0-0-0 --yes\n    rc delete --rid r-abc --rid r-def --yes"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Save and apply lot templates",
        after_help = "EXAMPLES:\n    rc template save htol-basic P-100 lot-abc\n    rc template apply htol-basic P-200 lot-def --yes\n    rc template list"
    )]
    Template(cmd::template::TemplateArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Export a CSV report",
        after_help = "EXAMPLES:\n    rc export P-100 > report.csv\n    rc export P-100 --lot L1 --save"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Maintain product families, products and stresses",
        after_help = "EXAMPLES:\n    rc catalog add-family Automotive\n    rc catalog import-stresses stresses.csv\n    rc catalog options 0-0-0-0"
    )]
    Catalog(cmd::catalog::CatalogArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RUNCARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "runcard=debug,info"
        } else {
            "runcard=info,warn"
        })
    });

    let format = env::var("RUNCARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    debug!(command = ?cli.command, root = %project_root.display(), "dispatch");

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Create(ref args) => cmd::create::run_create(args, output, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root),
        Commands::Lot(ref args) => cmd::lot::run_lot(args, output, &project_root),
        Commands::Stress(ref args) => cmd::stress::run_stress(args, output, &project_root),
        Commands::Step(ref args) => cmd::step::run_step(args, output, &project_root),
        Commands::Header(ref args) => cmd::header::run_header(args, output, &project_root),
        Commands::Start(ref args) => {
            cmd::check::run_check(StepAction::Start, args, output, &project_root)
        }
        Commands::Finish(ref args) => {
            cmd::check::run_check(StepAction::Finish, args, output, &project_root)
        }
        Commands::Skip(ref args) => {
            cmd::check::run_check(StepAction::Skip, args, output, &project_root)
        }
        Commands::Unskip(ref args) => {
            cmd::check::run_check(StepAction::Unskip, args, output, &project_root)
        }
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Lots(ref args) => cmd::lots::run_lots(args, output, &project_root),
        Commands::Queue(ref args) => cmd::queue::run_queue(args, output, &project_root),
        Commands::Stats(ref args) => cmd::stats::run_stats(args, output, &project_root),
        Commands::Delete(ref args) => cmd::delete::run_delete(args, output, &project_root),
        Commands::Template(ref args) => cmd::template::run_template(args, output, &project_root),
        Commands::Export(ref args) => cmd::export::run_export(args, output, &project_root),
        Commands::Catalog(ref args) => cmd::catalog::run_catalog(args, output, &project_root),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    if let Err(err) = run(&cli, output) {
        debug!(error = ?err, "command failed");
        output::render_error(output, &CliError::from(&err))?;
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["rc", "--json", "list"]);
        assert!(cli.json);
        let cli = Cli::parse_from(["rc", "list", "--json"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn format_flag_overrides_json() {
        let cli = Cli::parse_from(["rc", "--json", "--format", "text", "lots"]);
        assert_eq!(cli.output_mode(), OutputMode::Text);
    }

    #[test]
    fn check_commands_share_args() {
        let cli = Cli::parse_from(["rc", "start", "0-0-0-0", "--remark", "oven 3"]);
        match cli.command {
            Commands::Start(args) => {
                assert_eq!(args.target, "0-0-0-0");
                assert_eq!(args.remark.as_deref(), Some("oven 3"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(matches!(
            Cli::parse_from(["rc", "unskip", "r-1"]).command,
            Commands::Unskip(_)
        ));
    }

    #[test]
    fn create_subcommand_parses() {
        let cli = Cli::parse_from([
            "rc", "create", "--product-id", "P-1", "-l", "L1", "-l", "L2", "-f", "Owner=kim",
        ]);
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.product_id.as_deref(), Some("P-1"));
                assert_eq!(args.lots, vec!["L1", "L2"]);
                assert_eq!(args.fields, vec!["Owner=kim"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn step_set_requires_an_assignment() {
        assert!(Cli::try_parse_from(["rc", "step", "set", "0-0-0-0"]).is_err());
        assert!(Cli::try_parse_from(["rc", "step", "set", "0-0-0-0", "op=168h"]).is_ok());
    }

    #[test]
    fn list_preset_conflicts_with_explicit_dates() {
        assert!(Cli::try_parse_from(["rc", "list", "--preset", "3m", "--from", "2026-01-01"]).is_err());
        assert!(Cli::try_parse_from(["rc", "list", "--preset", "bogus"]).is_err());
    }

    #[test]
    fn catalog_subcommands_parse() {
        let cli = Cli::parse_from(["rc", "catalog", "import-stresses", "-", "--replace"]);
        assert!(matches!(cli.command, Commands::Catalog(_)));
        let cli = Cli::parse_from([
            "rc", "catalog", "add-product", "--family", "fam-1", "--name", "Widget",
        ]);
        assert!(matches!(cli.command, Commands::Catalog(_)));
    }
}
