use anyhow::{Context, Result};
use byte_splice::config::{apply_plan, check_plan, load_from_path, ApplicationError, PlanResult};
use byte_splice::{FileStream, RandomAccessStream, Splice, SpliceResult};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "byte-splice")]
#[command(about = "In-place byte-range editing for large files", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete a byte range, shifting the rest of the file left
    Delete {
        file: PathBuf,

        #[arg(short, long)]
        offset: u64,

        #[arg(short, long)]
        count: u64,

        /// Only delete if the range currently holds this text
        #[arg(long)]
        expect: Option<String>,
    },

    /// Insert bytes at an offset, shifting the rest of the file right
    Insert {
        file: PathBuf,

        #[arg(short, long)]
        offset: u64,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Replace a byte range with new bytes of any length
    Update {
        file: PathBuf,

        #[arg(short, long)]
        offset: u64,

        #[arg(short, long)]
        count: u64,

        #[command(flatten)]
        payload: PayloadArgs,

        /// Only update if the range currently holds this text
        #[arg(long)]
        expect: Option<String>,
    },

    /// Apply a TOML splice plan
    Apply {
        plan: PathBuf,

        /// Check the plan without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify a splice plan applies cleanly without modifying files
    Check {
        plan: PathBuf,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PayloadArgs {
    /// Bytes to write, given as UTF-8 text
    #[arg(short, long)]
    text: Option<String>,

    /// Read the bytes to write from a file
    #[arg(long)]
    from: Option<PathBuf>,
}

impl PayloadArgs {
    fn load(&self) -> Result<Vec<u8>> {
        match (&self.text, &self.from) {
            (Some(text), _) => Ok(text.as_bytes().to_vec()),
            (None, Some(path)) => {
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))
            }
            (None, None) => anyhow::bail!("either --text or --from is required"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Delete {
            file,
            offset,
            count,
            expect,
        } => cmd_splice(&file, Splice::delete(offset, count), expect),

        Commands::Insert {
            file,
            offset,
            payload,
        } => cmd_splice(&file, Splice::insert(offset, payload.load()?), None),

        Commands::Update {
            file,
            offset,
            count,
            payload,
            expect,
        } => cmd_splice(&file, Splice::update(offset, count, payload.load()?), expect),

        Commands::Apply {
            plan,
            dry_run,
            json,
        } => cmd_plan(&plan, dry_run, json),

        Commands::Check { plan, json } => cmd_plan(&plan, true, json),
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// parseable for `--json`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("byte_splice={default_level}")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_splice(file: &Path, splice: Splice, expect: Option<String>) -> Result<()> {
    let splice = match expect {
        Some(text) => splice.with_verification(byte_splice::SpliceVerification::ExactMatch(
            text.into_bytes(),
        )),
        None => splice,
    };

    let mut stream = FileStream::open(file)
        .with_context(|| format!("failed to open {} for writing", file.display()))?;

    match splice.apply(&mut stream) {
        Ok(SpliceResult::Applied {
            offset,
            bytes_removed,
            bytes_inserted,
        }) => {
            stream.sync()?;
            let new_len = stream.len()?;
            println!(
                "{} {}: -{} +{} bytes at offset {} (length now {})",
                "✓".green(),
                file.display(),
                bytes_removed,
                bytes_inserted,
                offset,
                new_len
            );
            Ok(())
        }
        Ok(SpliceResult::AlreadyApplied { offset }) => {
            println!(
                "{} {}: already applied at offset {}",
                "⊙".yellow(),
                file.display(),
                offset
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}: {}", "✗".red(), file.display(), e);
            Err(e.into())
        }
    }
}

fn cmd_plan(plan_path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let config = load_from_path(plan_path)?;
    let base_dir = plan_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    if !json {
        println!("Loading splices from {}...", plan_path.display());
        if dry_run {
            println!("{}", "  [DRY RUN - checking without writing]".cyan());
        }
    }

    let results = if dry_run {
        check_plan(&config, base_dir)
    } else {
        apply_plan(&config, base_dir)
    };

    if json {
        print_json(&results)?;
    } else {
        print_report(&results, dry_run);
    }

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{failed} splice(s) failed");
    }
    Ok(())
}

fn print_report(results: &[(String, Result<PlanResult, ApplicationError>)], dry_run: bool) {
    let mut applied = 0;
    let mut already_applied = 0;
    let mut failed = 0;

    for (splice_id, result) in results {
        match result {
            Ok(PlanResult::Applied { file, length_delta }) => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                println!(
                    "{} {}: {} to {} ({:+} bytes)",
                    "✓".green(),
                    splice_id,
                    verb,
                    file.display(),
                    length_delta
                );
                applied += 1;
            }
            Ok(PlanResult::AlreadyApplied { file }) => {
                println!(
                    "{} {}: Already applied to {}",
                    "⊙".yellow(),
                    splice_id,
                    file.display()
                );
                already_applied += 1;
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), splice_id, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("Summary:");
    println!("  {} applied", applied.to_string().green());
    println!("  {} already applied", already_applied.to_string().yellow());
    if failed > 0 {
        println!("  {} failed", failed.to_string().red());
    }
}

fn print_json(results: &[(String, Result<PlanResult, ApplicationError>)]) -> Result<()> {
    let entries: Vec<serde_json::Value> = results
        .iter()
        .map(|(splice_id, result)| match result {
            Ok(PlanResult::Applied { file, length_delta }) => serde_json::json!({
                "id": splice_id,
                "status": "applied",
                "file": file,
                "length_delta": length_delta,
            }),
            Ok(PlanResult::AlreadyApplied { file }) => serde_json::json!({
                "id": splice_id,
                "status": "already_applied",
                "file": file,
            }),
            Err(e) => serde_json::json!({
                "id": splice_id,
                "status": "failed",
                "error": e.to_string(),
            }),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
