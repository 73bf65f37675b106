//! Command-line interface: condense a file or stdin to stdout.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::condense::{condense_value, encode_toon, heuristics, HeuristicsOverride, Profile};
use crate::parser::parse_input;
use crate::shaper::truncate_to_token_limit;
use crate::stats;
use crate::tokens::BpeCounter;

/// Condense JSON/YAML/CSV/XML tool output into compact TOON text.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-condenser")]
#[command(about = "Condense verbose tool responses into compact TOON text")]
#[command(version)]
pub struct Args {
    /// Input file, or '-' for stdin (default: stdin)
    #[arg()]
    pub input: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Suppress compression stats on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Format hint: json, yaml, csv, tsv, or xml
    #[arg(long)]
    pub format: Option<String>,

    /// Heuristic profile: balanced, compact, or precise
    #[arg(long)]
    pub profile: Option<String>,

    /// Heuristic overrides as a comma list of key:value pairs
    #[arg(long)]
    pub heuristics: Option<String>,

    /// Encode directly to TOON without semantic preprocessing
    #[arg(long)]
    pub raw: bool,

    /// Hard token cap on the output (0 = off)
    #[arg(long, default_value_t = 0)]
    pub max_tokens: usize,
}

pub fn run(args: Args) -> Result<()> {
    let raw_input = read_input(args.input.as_deref())?;

    let profile = match args.profile.as_deref() {
        Some(name) => Profile::parse(name)?,
        None => Profile::Balanced,
    };
    let overrides = match args.heuristics.as_deref() {
        Some(spec) => HeuristicsOverride::from_pairs(spec)?,
        None => HeuristicsOverride::default(),
    };

    let (tree, input_format) = parse_input(&raw_input, args.format.as_deref())
        .context("could not parse input in any supported format")?;

    let condensed = if args.raw {
        encode_toon(&tree)
    } else {
        let effective = heuristics::resolve(profile, &overrides, None);
        condense_value(&tree, &effective)
    };

    let condensed = if args.max_tokens > 0 {
        truncate_to_token_limit(&condensed, args.max_tokens, &BpeCounter)
    } else {
        condensed
    };

    if !args.quiet {
        let s = stats::compute(&raw_input, &condensed, &BpeCounter);
        eprintln!("=== Compression Stats ({}) ===", s.method);
        eprintln!(
            "Original:  {:>8} chars  ({} tokens)  [{}]",
            s.original_chars, s.original_tokens, input_format
        );
        eprintln!(
            "Condensed: {:>8} chars  ({} tokens)",
            s.condensed_chars, s.condensed_tokens
        );
        eprintln!(
            "Reduction: {:.1}% chars, {:.1}% tokens",
            s.char_reduction_pct(),
            s.token_reduction_pct()
        );
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &condensed)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if !args.quiet {
                eprintln!("→ {}", path.display());
            }
        }
        None => println!("{condensed}"),
    }
    Ok(())
}

fn read_input(input: Option<&str>) -> Result<String> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {path}")),
    }
}
