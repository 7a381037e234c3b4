use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use sigterms::codec;
use sigterms::{
    AggregationSettings, Bucket, DocValueFormat, PartialResult, SignificanceHeuristic,
    SignificantTermsConfig, Term, TermKey,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Hand-written shard result. Unset settings come from the config.
///
/// ```json
/// {
///   "name": "tags",
///   "subset_size": 10,
///   "superset_size": 100,
///   "buckets": [{ "key": "foo", "doc_count": 3, "bg_count": 5 }]
/// }
/// ```
///
/// String keys produce a byte-string partial, integer keys a numeric one.
#[derive(Debug, Deserialize)]
pub struct ShardFixture {
    #[serde(default = "default_name")]
    pub name: String,
    pub subset_size: u64,
    pub superset_size: u64,
    #[serde(default)]
    pub required_size: Option<usize>,
    #[serde(default)]
    pub min_doc_count: Option<u64>,
    #[serde(default)]
    pub heuristic: Option<SignificanceHeuristic>,
    #[serde(default)]
    pub format: Option<DocValueFormat>,
    #[serde(default)]
    pub buckets: Vec<FixtureBucket>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureBucket {
    pub key: Value,
    pub doc_count: u64,
    pub bg_count: u64,
}

fn default_name() -> String {
    "significant_terms".to_string()
}

impl ShardFixture {
    fn settings(&self, config: &SignificantTermsConfig) -> AggregationSettings {
        let defaults = config.settings();
        AggregationSettings {
            required_size: self.required_size.unwrap_or(defaults.required_size),
            min_doc_count: self.min_doc_count.unwrap_or(defaults.min_doc_count),
            heuristic: self.heuristic.unwrap_or(defaults.heuristic),
            format: self.format.unwrap_or(defaults.format),
        }
    }

    /// Builds the partial with scores computed from the fixture's own totals.
    fn build<K: TermKey>(
        &self,
        config: &SignificantTermsConfig,
        keys: Vec<K>,
    ) -> Result<PartialResult<K>> {
        let mut seen = HashSet::new();
        let mut buckets = Vec::with_capacity(keys.len());
        for (key, bucket) in keys.into_iter().zip(&self.buckets) {
            if !seen.insert(key.clone()) {
                bail!("Duplicate bucket key {:?} in shard '{}'", key, self.name);
            }
            buckets.push(Bucket::leaf(key, bucket.doc_count, bucket.bg_count));
        }

        let mut partial = PartialResult::new(
            self.name.clone(),
            self.settings(config),
            self.subset_size,
            self.superset_size,
            buckets,
        );
        partial.rescore();
        Ok(partial)
    }

    /// Encodes as a named partial, picking the key type from the JSON keys.
    pub fn encode(&self, config: &SignificantTermsConfig) -> Result<Vec<u8>> {
        if let Some(keys) = self.keys(|key| key.as_str().map(Term::from)) {
            return Ok(codec::encode_named(&self.build(config, keys)?)?.to_vec());
        }
        if let Some(keys) = self.keys(Value::as_i64) {
            return Ok(codec::encode_named(&self.build(config, keys)?)?.to_vec());
        }
        bail!(
            "Bucket keys of shard '{}' must be all strings or all integers",
            self.name
        )
    }

    fn keys<K>(&self, convert: impl Fn(&Value) -> Option<K>) -> Option<Vec<K>> {
        self.buckets.iter().map(|bucket| convert(&bucket.key)).collect()
    }
}

/// Run encode command on a JSON fixture
pub fn run_encode(input: &Path, output: &Path, config: &SignificantTermsConfig) -> Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read fixture {:?}", input))?;
    let fixture: ShardFixture = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fixture {:?}", input))?;

    let bytes = fixture.encode(config)?;
    fs::write(output, &bytes).with_context(|| format!("Failed to write {:?}", output))?;

    tracing::info!(
        "Encoded '{}' ({} buckets, {} bytes) -> {:?}",
        fixture.name,
        fixture.buckets.len(),
        bytes.len(),
        output
    );
    Ok(())
}
