use anyhow::{bail, Context, Result};
use serde_json::Value;
use sigterms::codec;
use sigterms::{reduce_tree, render_named, PartialResult, SignificantTermsConfig, Term, TermKey};
use std::fs;
use std::path::{Path, PathBuf};

/// Run reduce command over encoded partials
pub fn run_reduce(
    files: &[PathBuf],
    output: Option<&Path>,
    pretty: bool,
    config: &SignificantTermsConfig,
) -> Result<()> {
    let rendered = reduce_files(files, output, config)?;
    let json = if pretty {
        serde_json::to_string_pretty(&rendered)?
    } else {
        serde_json::to_string(&rendered)?
    };
    println!("{}", json);
    Ok(())
}

/// Decodes, reduces and renders. The key type is taken from the first file.
fn reduce_files(
    files: &[PathBuf],
    output: Option<&Path>,
    config: &SignificantTermsConfig,
) -> Result<Value> {
    let Some(first) = files.first() else {
        bail!("No partials to reduce");
    };
    let bytes = fs::read(first).with_context(|| format!("Failed to read {:?}", first))?;
    let stream_type = codec::peek_stream_type(&bytes)
        .with_context(|| format!("{:?} is not an encoded partial", first))?;

    if stream_type == Term::STREAM_TYPE {
        reduce_as::<Term>(files, output, config)
    } else if stream_type == i64::STREAM_TYPE {
        reduce_as::<i64>(files, output, config)
    } else {
        bail!("Unknown stream type '{}' in {:?}", stream_type, first)
    }
}

fn reduce_as<K: TermKey>(
    files: &[PathBuf],
    output: Option<&Path>,
    config: &SignificantTermsConfig,
) -> Result<Value> {
    let partials = files
        .iter()
        .map(|path| {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
            let partial: PartialResult<K> = codec::decode_named(&bytes)
                .with_context(|| format!("Failed to decode {:?}", path))?;
            Ok(partial)
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        "Reducing {} partials (fan_in={}, intermediate_size={})",
        partials.len(),
        config.reduce.fan_in,
        config.reduce.intermediate_size
    );
    let merged = reduce_tree(partials, &config.reduce).context("Reduce failed")?;

    if let Some(output) = output {
        let bytes = codec::encode_named(&merged).context("Failed to encode reduced partial")?;
        fs::write(output, bytes)
            .with_context(|| format!("Failed to write {:?}", output))?;
        tracing::info!("Wrote reduced partial to {:?}", output);
    }

    Ok(render_named(&merged)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigterms::{AggregationSettings, Bucket};
    use tempfile::TempDir;

    fn write_shard(dir: &Path, file: &str, partial: &PartialResult) -> PathBuf {
        let path = dir.join(file);
        fs::write(&path, codec::encode_named(partial).unwrap()).unwrap();
        path
    }

    fn shard(subset_size: u64, superset_size: u64, buckets: Vec<Bucket>) -> PartialResult {
        let settings = AggregationSettings {
            min_doc_count: 2,
            ..AggregationSettings::default()
        };
        PartialResult::new("tags", settings, subset_size, superset_size, buckets)
    }

    #[test]
    fn test_reduce_two_shards() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_shard(
                dir.path(),
                "a.bin",
                &shard(10, 100, vec![Bucket::leaf("foo", 3, 5)]),
            ),
            write_shard(
                dir.path(),
                "b.bin",
                &shard(
                    20,
                    200,
                    vec![Bucket::leaf("foo", 2, 4), Bucket::leaf("bar", 1, 1)],
                ),
            ),
        ];
        let merged_path = dir.path().join("merged.bin");

        let config = SignificantTermsConfig::default();
        let rendered = reduce_files(&files, Some(merged_path.as_path()), &config).unwrap();
        assert_eq!(rendered["tags"]["doc_count"], 30);
        assert_eq!(rendered["tags"]["bg_count"], 300);
        let buckets = rendered["tags"]["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0]["key"], "foo");
        assert_eq!(buckets[0]["doc_count"], 5);

        let bytes = fs::read(&merged_path).unwrap();
        let merged: PartialResult = codec::decode_named(&bytes).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_mismatched_shards_fail() {
        let dir = TempDir::new().unwrap();
        let settings = AggregationSettings {
            required_size: 50,
            min_doc_count: 2,
            ..AggregationSettings::default()
        };
        let other: PartialResult =
            PartialResult::new("tags", settings, 20, 200, vec![Bucket::leaf("foo", 2, 4)]);
        let files = vec![
            write_shard(dir.path(), "a.bin", &shard(10, 100, vec![])),
            write_shard(dir.path(), "b.bin", &other),
        ];

        let err = reduce_files(&files, None, &SignificantTermsConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("required_size"));
    }
}
