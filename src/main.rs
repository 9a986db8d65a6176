use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

mod expr;
mod idset;
mod model;
mod reader;
mod sinks;
mod utils;

use expr::{render_caret, FilterError, ObjectFilter};
use idset::IdSet;
use model::{EntitySet, Kind, OsmObject};
use sinks::{ObjectSink, OutputFormat};
use utils::ProgressCounter;

macro_rules! vprintln {
    ($verbose:expr, $($arg:tt)*) => {
        if $verbose {
            eprintln!($($arg)*);
        }
    };
}

#[derive(Parser)]
#[command(author, version, about = "Filter objects from an OSM file by expression", long_about = None)]
#[command(group = ArgGroup::new("expr_source").required(true).args(["expression", "expression_file"]))]
struct Cli {
    /// Input OSM PBF file ('-' for stdin)
    #[arg(value_name = "INPUT-FILE", default_value = "-", env = "OFILTER_INPUT")]
    input: String,

    /// Output file ('-' for stdout)
    #[arg(short, long, default_value = "-", env = "OFILTER_OUTPUT")]
    output: String,

    /// Output format: opl or jsonl (default: by output extension)
    #[arg(short = 'f', long = "output-format", env = "OFILTER_FORMAT")]
    output_format: Option<OutputFormat>,

    /// Filter expression
    #[arg(short, long, env = "OFILTER_EXPRESSION")]
    expression: Option<String>,

    /// Read the filter expression from a file
    #[arg(short = 'E', long, env = "OFILTER_EXPRESSION_FILE")]
    expression_file: Option<PathBuf>,

    /// Only parse the expression, do not process any data
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Also write all nodes referenced by matching ways
    #[arg(short = 'w', long)]
    complete_ways: bool,

    /// Print the parsed tree and entity mask to stderr
    #[arg(short, long, env = "OFILTER_VERBOSE")]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let expression = load_expression(cli)?;

    let mut filter = match ObjectFilter::new(&expression) {
        Ok(filter) => filter,
        Err(err) => {
            print_expression_error(&expression, &err);
            return Ok(ExitCode::from(1));
        }
    };

    if filter.entities().is_empty() {
        eprintln!("Filter expression can never match. Stopping.");
        return Ok(ExitCode::from(1));
    }

    if cli.verbose {
        eprint!("{}", filter.tree());
        let mut line = String::from("entities:");
        for kind in filter.entities().kinds() {
            line.push(' ');
            line.push_str(kind.name());
        }
        eprintln!("{line}");
    }

    if cli.dry_run {
        return Ok(ExitCode::SUCCESS);
    }

    if let Err(err) = filter.prepare() {
        eprintln!("Error: {err}");
        return Ok(ExitCode::from(1));
    }

    let format = sinks::select_format(cli.output_format, &cli.output);
    let mut sink = sinks::open_sink(format, &cli.output)
        .with_context(|| format!("failed to open output '{}'", cli.output))?;

    let written = if cli.complete_ways {
        run_complete_ways(cli, &filter, sink.as_mut())?
    } else {
        run_filter_pass(cli, &filter, sink.as_mut())?
    };
    sink.finish()?;

    vprintln!(cli.verbose, "Done. Wrote {written} matching objects.");
    Ok(ExitCode::SUCCESS)
}

fn load_expression(cli: &Cli) -> Result<String> {
    match (&cli.expression, &cli.expression_file) {
        (Some(expression), _) => Ok(expression.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read expression file '{}'", path.display())),
        (None, None) => {
            unreachable!("clap group requires an expression source")
        }
    }
}

fn print_expression_error(expression: &str, err: &FilterError) {
    eprintln!("Error parsing filter expression:");
    match err.offset() {
        Some(offset) => {
            eprintln!("{}", render_caret(expression, offset));
            match err {
                FilterError::Parse { expected, .. } => eprintln!("Expecting {expected}"),
                FilterError::Context { message, .. } => eprintln!("{message}"),
                _ => eprintln!("{err}"),
            }
        }
        None => eprintln!("{err}"),
    }
}

/// Single pass: evaluate every object whose kind is in the entity mask and
/// write the matches.
fn run_filter_pass(cli: &Cli, filter: &ObjectFilter, sink: &mut dyn ObjectSink) -> Result<u64> {
    let mut progress = ProgressCounter::new("objects", 100_000);
    let mut written = 0u64;
    reader::read_objects(&cli.input, filter.entities(), |object| {
        progress.inc(1);
        if filter.matches(&object) {
            sink.write(&object)?;
            written += 1;
        }
        Ok(())
    })?;
    progress.finish();
    Ok(written)
}

/// Two passes: collect the ids of matching objects (plus the nodes of
/// matching ways), then replay the input and write every collected id.
fn run_complete_ways(cli: &Cli, filter: &ObjectFilter, sink: &mut dyn ObjectSink) -> Result<u64> {
    if cli.input == "-" {
        anyhow::bail!("--complete-ways re-reads the input and cannot work with stdin");
    }

    let mut ids: [IdSet; 3] = Default::default();

    vprintln!(cli.verbose, "Pass 1: matching objects in '{}'...", cli.input);
    let mut progress = ProgressCounter::new("pass 1/2: objects", 100_000);
    reader::read_objects(&cli.input, filter.entities(), |object| {
        progress.inc(1);
        if filter.matches(&object) {
            ids[object.kind.index()].set(object.id as u64);
            if object.kind == Kind::Way {
                for node_ref in &object.nodes {
                    ids[Kind::Node.index()].set(node_ref.id as u64);
                }
            }
        }
        Ok(())
    })?;
    progress.finish();
    vprintln!(
        cli.verbose,
        "Pass 1 collected {} nodes, {} ways, {} relations.",
        ids[Kind::Node.index()].len(),
        ids[Kind::Way.index()].len(),
        ids[Kind::Relation.index()].len()
    );

    vprintln!(cli.verbose, "Pass 2: writing objects...");
    let mut progress = ProgressCounter::new("pass 2/2: objects", 100_000);
    let mut written = 0u64;
    reader::read_objects(&cli.input, EntitySet::ALL, |object: OsmObject| {
        progress.inc(1);
        if ids[object.kind.index()].get(object.id as u64) {
            sink.write(&object)?;
            written += 1;
        }
        Ok(())
    })?;
    progress.finish();

    Ok(written)
}
