use anyhow::{bail, Context, Result};
use sigterms::codec;
use sigterms::{PartialResult, Term, TermKey};
use std::fs;
use std::path::Path;

/// Buckets listed without `--verbose`
const DEFAULT_BUCKET_ROWS: usize = 20;

/// Run inspect command on an encoded partial
pub fn run_inspect(path: &Path, verbose: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let stream_type = codec::peek_stream_type(&bytes)
        .with_context(|| format!("{:?} is not an encoded partial", path))?;

    if stream_type == Term::STREAM_TYPE {
        let partial: PartialResult<Term> = codec::decode_named(&bytes)
            .with_context(|| format!("Failed to decode {:?}", path))?;
        print_partial(&partial, bytes.len(), verbose);
    } else if stream_type == i64::STREAM_TYPE {
        let partial: PartialResult<i64> = codec::decode_named(&bytes)
            .with_context(|| format!("Failed to decode {:?}", path))?;
        print_partial(&partial, bytes.len(), verbose);
    } else {
        bail!("Unknown stream type '{}' in {:?}", stream_type, path);
    }
    Ok(())
}

fn print_partial<K: TermKey>(partial: &PartialResult<K>, size: usize, verbose: bool) {
    let visible = partial.visible_buckets().count();

    println!();
    println!("================================================================================");
    println!(
        "Aggregation: {} ({}, {} buckets, {} bytes)",
        partial.name(),
        K::STREAM_TYPE,
        partial.len(),
        size
    );
    println!("================================================================================");
    println!();
    println!("Settings");
    println!("--------------------------------------------------------------------------------");
    println!("  Heuristic:          {}", partial.heuristic());
    println!("  Format:             {}", partial.format());
    println!("  Required size:      {}", partial.required_size());
    println!("  Min doc count:      {}", partial.min_doc_count());
    println!();
    println!("Totals");
    println!("--------------------------------------------------------------------------------");
    println!("  Subset size:        {}", partial.subset_size());
    println!("  Superset size:      {}", partial.superset_size());
    println!(
        "  Renderable buckets: {} of {}",
        visible,
        partial.len()
    );
    println!();

    if partial.is_empty() {
        return;
    }

    let rows = if verbose {
        partial.len()
    } else {
        partial.len().min(DEFAULT_BUCKET_ROWS)
    };
    println!(
        "  {:<32} {:>12} {:>12} {:>14}",
        "Key", "Doc count", "Bg count", "Score"
    );
    println!("  {}", "-".repeat(73));
    for bucket in &partial.buckets()[..rows] {
        let marker = if bucket.subset_df < partial.min_doc_count() {
            " *"
        } else {
            ""
        };
        println!(
            "  {:<32} {:>12} {:>12} {:>14.6}{}",
            truncate(&bucket.key.key_as_string(partial.format()), 32),
            bucket.subset_df,
            bucket.superset_df,
            bucket.score,
            marker
        );
    }
    if rows < partial.len() {
        println!("  ... {} more (use --verbose)", partial.len() - rows);
    }
    if visible < partial.len() {
        println!();
        println!("  * below min_doc_count, not rendered");
    }
    println!();
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars - 3).collect();
        out.push_str("...");
        out
    }
}
