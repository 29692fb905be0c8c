use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, error::ErrorKind};

use crate::config::{SampleOrder, SubsetConfig, VerifyConfig};
use crate::constants::dataset::DEFAULT_MAX_SHARD_ROWS;
use crate::constants::env::{
    SUBSET_INPUT, SUBSET_ORIGINAL, SUBSET_OUTPUT, SUBSET_PATH, SUBSET_PERCENTAGE, SUBSET_SAMPLES,
    SUBSET_SEED, SUBSET_SIZE,
};
use crate::constants::subset::DEFAULT_SEED;
use crate::constants::verify::DEFAULT_SAMPLES;
use crate::creator::{SubsetReport, create_subset};
use crate::errors::SubsetError;
use crate::sampling::{SampleTarget, SamplingSpec};
use crate::utils::{format_count, format_percentage};
use crate::verifier::verify_subset;

#[derive(Debug, Parser)]
#[command(
    name = "create_subset",
    disable_help_subcommand = true,
    about = "Create a seeded random subset of a sharded JSONL dataset",
    long_about = "Select a fraction (--percentage) or a fixed number (--size) of records from a dataset directory without replacement, and write them in source order to a new dataset directory.",
    after_help = "Examples:\n  create_subset --input ./tokenized/WMT22_Train --output ./tokenized/WMT22_Train_1M --size 1000000\n  create_subset --input ./tokenized/WMT22_Train --output ./tokenized/WMT22_Train_5pct --percentage 0.05\n\nEvery option can also come from its environment variable; explicit args win."
)]
/// CLI for `create_subset`.
struct CreateSubsetCli {
    #[arg(long, env = SUBSET_INPUT, value_name = "PATH", help = "Path to the input dataset directory")]
    input: PathBuf,
    #[arg(long, env = SUBSET_OUTPUT, value_name = "PATH", help = "Path where the subset will be saved")]
    output: PathBuf,
    #[arg(
        long,
        env = SUBSET_PERCENTAGE,
        value_name = "FRACTION",
        help = "Fraction of the dataset to keep, in (0, 1] (e.g. 0.1 for 10%)"
    )]
    percentage: Option<f64>,
    #[arg(long, env = SUBSET_SIZE, value_name = "N", help = "Number of records in the subset")]
    size: Option<usize>,
    #[arg(
        long,
        env = SUBSET_SEED,
        default_value_t = DEFAULT_SEED,
        help = "Deterministic seed used for record selection"
    )]
    seed: u64,
    #[arg(
        long = "max-shard-rows",
        default_value_t = DEFAULT_MAX_SHARD_ROWS,
        value_parser = parse_positive_usize,
        help = "Maximum records per written shard"
    )]
    max_shard_rows: usize,
    #[arg(long, help = "Replace a non-empty output directory")]
    overwrite: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "verify_subset",
    disable_help_subcommand = true,
    about = "Verify that a dataset subset was created correctly",
    long_about = "Check size, schema, and record membership of a subset against its original dataset and print sample records for inspection. Exits non-zero if any check fails.",
    after_help = "Examples:\n  verify_subset --original ./tokenized/WMT22_Train --subset ./tokenized/WMT22_Train_5pct\n  verify_subset --original ./tokenized/WMT22_Train --subset ./tokenized/WMT22_Train_5pct --samples 5"
)]
/// CLI for `verify_subset`.
struct VerifySubsetCli {
    #[arg(long, env = SUBSET_ORIGINAL, value_name = "PATH", help = "Path to the original dataset")]
    original: PathBuf,
    #[arg(long, env = SUBSET_PATH, value_name = "PATH", help = "Path to the subset dataset")]
    subset: PathBuf,
    #[arg(
        long,
        env = SUBSET_SAMPLES,
        default_value_t = DEFAULT_SAMPLES,
        help = "Number of sample records to display"
    )]
    samples: usize,
    #[arg(
        long = "random-samples",
        help = "Display randomly chosen records instead of the first ones"
    )]
    random_samples: bool,
    #[arg(
        long,
        default_value_t = DEFAULT_SEED,
        help = "Seed for --random-samples"
    )]
    seed: u64,
}

/// Run `create_subset` with the given arguments (program name excluded).
pub fn run_create_subset<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();
    let Some(cli) = parse_cli::<CreateSubsetCli, _>(
        std::iter::once("create_subset".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    ensure_input_exists(&cli.input)?;
    let sampling = SamplingSpec::from_options(cli.percentage, cli.size, cli.seed)?;
    let config = SubsetConfig {
        input: cli.input,
        output: cli.output,
        sampling,
        max_shard_rows: cli.max_shard_rows,
        overwrite: cli.overwrite,
    };

    let report = create_subset(&config)?;
    print_subset_report(&report);
    Ok(())
}

/// Run `verify_subset` with the given arguments (program name excluded).
///
/// A failed verification is returned as `SubsetError::VerificationMismatch`
/// after the full report has been printed.
pub fn run_verify_subset<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();
    let Some(cli) = parse_cli::<VerifySubsetCli, _>(
        std::iter::once("verify_subset".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let config = VerifyConfig {
        original: cli.original,
        subset: cli.subset,
        samples: cli.samples,
        sample_order: if cli.random_samples {
            SampleOrder::Random { seed: cli.seed }
        } else {
            SampleOrder::Sequential
        },
    };

    let report = verify_subset(&config)?;
    println!("{}", report.render());
    report.ensure_passed()?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Fail fast before any work when the input directory is missing.
fn ensure_input_exists(input: &Path) -> Result<(), SubsetError> {
    if input.is_dir() {
        return Ok(());
    }
    Err(SubsetError::InputNotFound {
        path: input.to_path_buf(),
        reason: "input directory not found".to_string(),
    })
}

fn print_subset_report(report: &SubsetReport) {
    let target = match report.target {
        SampleTarget::Fraction(fraction) => format!("percentage {fraction}"),
        SampleTarget::Size(size) => format!("size {}", format_count(size)),
    };
    println!("Subset saved successfully");
    println!("  - Source:   {}", report.input.display());
    println!(
        "  - Original: {} records",
        format_count(report.source_rows)
    );
    println!(
        "  - Samples:  {} ({})",
        format_count(report.rows),
        format_percentage(report.rows, report.source_rows)
    );
    println!("  - Target:   {target}, seed {}", report.seed);
    println!("  - Shards:   {}", report.shards);
    println!("  - Location: {}", report.output.display());
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataRecord;
    use crate::dataset::write_dataset;
    use serde_json::json;
    use tempfile::tempdir;

    fn args(raw: &[&str]) -> std::vec::IntoIter<String> {
        raw.iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn write_fixture(root: &Path, count: usize) {
        let records: Vec<DataRecord> = (0..count)
            .map(|idx| DataRecord::from_json_line(&json!({"id": idx}).to_string()).unwrap())
            .collect();
        write_dataset(root, &records, 64).unwrap();
    }

    #[test]
    fn help_exits_cleanly() {
        assert!(run_create_subset(args(&["--help"])).is_ok());
        assert!(run_verify_subset(args(&["--help"])).is_ok());
    }

    #[test]
    fn create_then_verify_round_trip() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("full");
        let output = temp.path().join("subset");
        write_fixture(&input, 200);
        let input_arg = input.to_string_lossy().to_string();
        let output_arg = output.to_string_lossy().to_string();

        run_create_subset(args(&[
            "--input",
            &input_arg,
            "--output",
            &output_arg,
            "--percentage",
            "0.1",
            "--seed",
            "5",
        ]))
        .unwrap();
        run_verify_subset(args(&[
            "--original",
            &input_arg,
            "--subset",
            &output_arg,
            "--samples",
            "2",
            "--random-samples",
        ]))
        .unwrap();
    }

    #[test]
    fn missing_input_is_rejected_before_any_work() {
        let temp = tempdir().unwrap();
        let output = temp.path().join("subset");
        let input_arg = temp.path().join("absent").to_string_lossy().to_string();
        let output_arg = output.to_string_lossy().to_string();

        let err = run_create_subset(args(&[
            "--input",
            &input_arg,
            "--output",
            &output_arg,
            "--size",
            "3",
        ]))
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubsetError>(),
            Some(SubsetError::InputNotFound { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn percentage_and_size_together_are_invalid() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("full");
        write_fixture(&input, 10);
        let input_arg = input.to_string_lossy().to_string();
        let output_arg = temp.path().join("subset").to_string_lossy().to_string();

        let err = run_create_subset(args(&[
            "--input",
            &input_arg,
            "--output",
            &output_arg,
            "--size",
            "3",
            "--percentage",
            "0.5",
        ]))
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubsetError>(),
            Some(SubsetError::InvalidSpecification(_))
        ));
    }

    #[test]
    fn zero_shard_rows_is_a_parse_error() {
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_usize("x").is_err());
        assert_eq!(parse_positive_usize("12").unwrap(), 12);
    }
}
