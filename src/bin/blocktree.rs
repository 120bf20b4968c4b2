//! Command-line front end for blocktree index files.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blocktree::{BTreeIndex, BulkLoadReport, IndexOptions, Key, Value};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "blocktree",
    version,
    about = "Create, query and load B-tree index files",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(long, global = true, help = "Skip fsync after each block write")]
    no_sync: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new, empty index file.
    Create {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long, default_value_t = blocktree::common::config::DEFAULT_ORDER)]
        order: usize,
    },
    /// Insert one key-value pair.
    Insert {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        key: Key,
        value: String,
    },
    /// Look up a key.
    Search {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        key: Key,
    },
    /// Print every pair as `key,value` in key order.
    Dump {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Insert `key,value` lines from a file; existing keys are skipped.
    Load {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(value_name = "CSV")]
        input: PathBuf,
    },
    /// Verify the tree and print its shape.
    Stats {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let options = IndexOptions::new().sync_writes(!cli.open.no_sync);

    match run(cli.command, options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, options: IndexOptions) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Create { path, order } => {
            BTreeIndex::create_with(&path, options.order(order))?.close()?;
            println!("Index file '{}' created.", path.display());
        }
        Command::Insert { path, key, value } => {
            let mut index = BTreeIndex::open_with(&path, options)?;
            index.insert(key, Value::try_from(value.as_str())?)?;
            index.close()?;
            println!("Inserted key {key}.");
        }
        Command::Search { path, key } => {
            let mut index = BTreeIndex::open_with(&path, options)?;
            match index.search(key)? {
                Some(value) => println!("{key},{value}"),
                None => println!("Key {key} not found."),
            }
        }
        Command::Dump { path } => {
            let mut index = BTreeIndex::open_with(&path, options)?;
            for pair in index.traverse() {
                let (key, value) = pair?;
                println!("{key},{value}");
            }
        }
        Command::Load { path, input } => {
            let report = load(&path, &input, options)?;
            println!("Loaded {} pairs.", report.inserted);
            for key in report.duplicates {
                println!("Skipped duplicate key {key}.");
            }
        }
        Command::Stats { path } => {
            let mut index = BTreeIndex::open_with(&path, options)?;
            let stats = index.verify()?;
            println!(
                "order: {}, {stats}, bytes: {}",
                index.order(),
                index.file_size()
            );
        }
    }
    Ok(())
}

/// Bulk load the pairs in `input` into the index at `path`.
fn load(
    path: &Path,
    input: &Path,
    options: IndexOptions,
) -> Result<BulkLoadReport, Box<dyn Error>> {
    let pairs = read_pairs(input)?;
    let mut index = BTreeIndex::open_with(path, options)?;
    let report = index.bulk_load(pairs)?;
    index.close()?;
    Ok(report)
}

fn read_pairs(path: &Path) -> Result<Vec<(Key, Value)>, Box<dyn Error>> {
    parse_pairs(&fs::read_to_string(path)?)
}

/// Parse `key,value` lines, ignoring blank lines and `#` comments.
fn parse_pairs(text: &str) -> Result<Vec<(Key, Value)>, Box<dyn Error>> {
    let mut pairs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once(',')
            .ok_or_else(|| format!("line {}: expected key,value", lineno + 1))?;
        let key: Key = key
            .trim()
            .parse()
            .map_err(|e| format!("line {}: bad key: {e}", lineno + 1))?;
        let value = Value::try_from(value.trim())
            .map_err(|e| format!("line {}: {e}", lineno + 1))?;
        pairs.push((key, value));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn val(s: &str) -> Value {
        Value::try_from(s).unwrap()
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let text = "# header\n\n  1, one \n   \n# 2,two\n3,three\n";
        let pairs = parse_pairs(text).unwrap();
        assert_eq!(pairs, vec![(1, val("one")), (3, val("three"))]);
    }

    #[test]
    fn test_parse_value_may_contain_commas() {
        let pairs = parse_pairs("7,a,b").unwrap();
        assert_eq!(pairs, vec![(7, val("a,b"))]);
    }

    #[test]
    fn test_parse_rejects_bad_key() {
        let err = parse_pairs("1,ok\nx,1").unwrap_err();
        assert!(err.to_string().starts_with("line 2: bad key"), "{err}");
    }

    #[test]
    fn test_parse_rejects_missing_comma() {
        let err = parse_pairs("42").unwrap_err();
        assert_eq!(err.to_string(), "line 1: expected key,value");
    }

    #[test]
    fn test_parse_rejects_long_value() {
        let err = parse_pairs("1,0123456789abcdef").unwrap_err();
        assert!(err.to_string().starts_with("line 1: "), "{err}");
        assert!(err.to_string().contains("16"), "{err}");
    }

    #[test]
    fn test_load_reports_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");
        let input = dir.path().join("pairs.csv");
        let options = IndexOptions::new().sync_writes(false);

        let mut index = BTreeIndex::create_with(&path, options).unwrap();
        index.insert(2, val("old")).unwrap();
        index.close().unwrap();

        fs::write(&input, "1,a\n2,b\n3,c\n1,again\n").unwrap();
        let report = load(&path, &input, options).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, vec![2, 1]);

        let mut index = BTreeIndex::open_with(&path, options).unwrap();
        assert_eq!(index.search(2).unwrap(), Some(val("old")));
        assert_eq!(index.search(1).unwrap(), Some(val("a")));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_load_leaves_index_untouched_on_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");
        let input = dir.path().join("pairs.csv");
        let options = IndexOptions::new().sync_writes(false);
        BTreeIndex::create_with(&path, options).unwrap().close().unwrap();

        fs::write(&input, "1,a\nbroken\n").unwrap();
        assert!(load(&path, &input, options).is_err());

        let index = BTreeIndex::open_with(&path, options).unwrap();
        assert!(index.is_empty());
    }
}
