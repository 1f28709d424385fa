//! Tabula CLI - formula evaluation tool

mod workbook_file;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tabula::prelude::*;
use tabula::FUNCTION_REGISTRY;
use workbook_file::{json_value, report, WorkbookFile};

#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about = "Spreadsheet formula evaluation tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one formula, optionally against a few cells
    Eval {
        /// Formula to evaluate, with or without the leading '='
        formula: String,

        /// Cell content as ADDRESS=CONTENT, e.g. A1=42 (repeatable)
        #[arg(short, long = "set", value_name = "ADDRESS=CONTENT")]
        cells: Vec<String>,

        /// Print the raw value instead of the formatted one
        #[arg(short, long)]
        raw: bool,
    },

    /// Evaluate every cell of a JSON workbook file
    Run {
        /// Input workbook file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the available functions
    Functions {
        /// Only list functions of this category
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval { formula, cells, raw } => eval(&formula, &cells, raw),
        Commands::Run { input, output, format } => run(&input, output.as_deref(), format),
        Commands::Functions { category } => list_functions(category.as_deref()),
    }
}

fn eval(formula: &str, cells: &[String], raw: bool) -> Result<()> {
    let mut model = Model::default();
    let sheet = model.get_sheet_ids()[0];

    for assignment in cells {
        let Some((address, content)) = assignment.split_once('=') else {
            bail!("Expected ADDRESS=CONTENT, got '{}'", assignment);
        };
        model
            .update_cell_at(sheet, address.trim(), content)
            .into_result()
            .with_context(|| format!("Cannot set {}", address))?;
    }

    // The formula goes in a cell no assignment uses
    let target = CellAddress::new(0, next_free_column(&model, sheet));
    let formula = if formula.starts_with('=') {
        formula.to_string()
    } else {
        format!("={}", formula)
    };
    model
        .update_cell_at(sheet, &target.to_a1_string(), &formula)
        .into_result()
        .context("Cannot evaluate the formula")?;

    let evaluated = model
        .evaluated_at(sheet, &target.to_a1_string())
        .context("Formula cell is missing")?;
    match (&evaluated.value, raw) {
        (Value::Error(e), _) => {
            println!("{}", e.kind.as_str());
            eprintln!("{}", e.message);
        }
        (value, true) => println!("{}", json_value(value)),
        (_, false) => println!("{}", evaluated.formatted_value),
    }
    Ok(())
}

fn next_free_column(model: &Model, sheet: SheetId) -> u16 {
    model
        .cell_positions(sheet)
        .iter()
        .map(|p| p.col + 1)
        .max()
        .unwrap_or(0)
}

fn run(input: &Path, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    let json = std::fs::read_to_string(input).with_context(|| format!("Failed to open '{}'", input.display()))?;
    let model = WorkbookFile::parse(&json)?.into_model()?;
    let reports = report(&model);

    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&reports).context("Failed to serialize the result")? + "\n",
        OutputFormat::Text => reports
            .iter()
            .map(|r| format!("{}!{}\t{}\n", r.sheet, r.address, r.text))
            .collect(),
    };

    let stats = model.calculation_stats();
    eprintln!(
        "Evaluated {} formulas ({} errors, {} in cycles)",
        model.evaluation_count(),
        stats.errors,
        stats.cycles
    );

    if let Some(output_path) = output {
        std::fs::write(output_path, &text).with_context(|| format!("Failed to write '{}'", output_path.display()))?;
        eprintln!("Wrote {} cells to '{}'", reports.len(), output_path.display());
    } else {
        io::stdout()
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn list_functions(category: Option<&str>) -> Result<()> {
    let mut stdout = io::stdout().lock();
    let mut count = 0;
    for descriptor in FUNCTION_REGISTRY.iter() {
        if category.map_or(false, |c| !descriptor.category.eq_ignore_ascii_case(c)) {
            continue;
        }
        writeln!(stdout, "{}\t{}", descriptor.name, descriptor.description).context("Failed to write to stdout")?;
        count += 1;
    }
    if count == 0 {
        bail!("No function matches");
    }
    Ok(())
}
