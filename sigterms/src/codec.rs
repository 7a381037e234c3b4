//! Binary encoding of partial results
//!
//! Body layout, in order:
//!
//! ```text
//! format name | required_size | min_doc_count | subset_size | superset_size
//! heuristic name + params | bucket count | buckets...
//!
//! bucket: key | subset_df | superset_df | score (f64 BE) | sub-aggregations
//! ```
//!
//! Integers are varints, names and terms are length-prefixed. A named record
//! ([`encode_named`]) prefixes the body with the key type's stream identifier
//! and the aggregation name so a receiver can pick the right decoder.
//!
//! Decoding is strict: unknown names, oversized length prefixes, bucket
//! counts that cannot fit in the remaining bytes, truncated buffers and
//! trailing garbage all fail with a [`DecodeError`] naming the field.
//! Encoding applies the same limits up front and fails with an
//! [`EncodeError`], so anything that encodes also decodes.

use crate::error::{DecodeError, EncodeError};
use crate::format::DocValueFormat;
use crate::heuristic::SignificanceHeuristic;
use crate::key::TermKey;
use crate::metrics;
use crate::model::{AggregationSettings, Bucket, PartialResult, SubAggregations};
use crate::stream::{WireReader, WireWriter, MAX_NAME_LEN};
use bytes::Bytes;
use tracing::{trace, warn};

type DecodeResult<T> = std::result::Result<T, DecodeError>;
type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// Fixed-size part of a bucket: two one-byte varints and the score.
const MIN_BUCKET_BODY_LEN: usize = 1 + 1 + 8;

pub fn write_partial<K, A>(
    partial: &PartialResult<K, A>,
    out: &mut WireWriter,
) -> EncodeResult<()>
where
    K: TermKey,
    A: SubAggregations,
{
    let count = bucket_count(partial.len())?;

    partial.format().write(out);
    out.write_vlong(partial.required_size() as u64);
    out.write_vlong(partial.min_doc_count());
    out.write_vlong(partial.subset_size());
    out.write_vlong(partial.superset_size());
    partial.heuristic().write(out);

    out.write_vint(count);
    for bucket in partial.buckets() {
        bucket.key.write(out)?;
        out.write_vlong(bucket.subset_df);
        out.write_vlong(bucket.superset_df);
        out.write_f64(bucket.score);
        bucket.aggregations.write(out)?;
    }
    Ok(())
}

/// Reads one body from the cursor. The term index of the result starts empty.
pub fn read_partial<K, A>(
    input: &mut WireReader<'_>,
    name: impl Into<String>,
) -> DecodeResult<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    let format = DocValueFormat::read(input)?;
    let required_size = input.read_vlong("required_size")?;
    let required_size = usize::try_from(required_size).map_err(|_| {
        DecodeError::new(
            "required_size",
            format!("{} does not fit in usize", required_size),
        )
    })?;
    let min_doc_count = input.read_vlong("min_doc_count")?;
    let subset_size = input.read_vlong("subset_size")?;
    let superset_size = input.read_vlong("superset_size")?;
    let heuristic = SignificanceHeuristic::read(input)?;

    let min_bucket_len = K::MIN_ENCODED_LEN + MIN_BUCKET_BODY_LEN + A::MIN_ENCODED_LEN;
    let count = input.read_count("bucket_count", min_bucket_len)?;
    let mut buckets = Vec::with_capacity(count);
    for _ in 0..count {
        let key = K::read(input)?;
        let subset_df = input.read_vlong("bucket.subset_df")?;
        let superset_df = input.read_vlong("bucket.superset_df")?;
        let score = input.read_f64("bucket.score")?;
        let aggregations = A::read(input)?;
        buckets.push(Bucket {
            key,
            subset_df,
            superset_df,
            score,
            aggregations,
        });
    }

    let settings = AggregationSettings {
        required_size,
        min_doc_count,
        heuristic,
        format,
    };
    Ok(PartialResult::new(
        name,
        settings,
        subset_size,
        superset_size,
        buckets,
    ))
}

/// Encodes the body of a partial result.
pub fn encode<K, A>(partial: &PartialResult<K, A>) -> EncodeResult<Bytes>
where
    K: TermKey,
    A: SubAggregations,
{
    let mut out = WireWriter::with_capacity(64 + partial.len() * 24);
    write_partial(partial, &mut out).map_err(observe_encode)?;
    metrics::record_encode(out.len());
    Ok(out.freeze())
}

/// Decodes a body that must span the whole buffer. The name is not part of
/// the body and is supplied by the caller.
pub fn decode<K, A>(name: impl Into<String>, bytes: &[u8]) -> DecodeResult<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    let mut input = WireReader::new(bytes);
    let result = read_partial(&mut input, name).and_then(|partial| {
        input.finish("partial")?;
        Ok(partial)
    });
    observe(result)
}

pub fn write_named<K, A>(
    partial: &PartialResult<K, A>,
    out: &mut WireWriter,
) -> EncodeResult<()>
where
    K: TermKey,
    A: SubAggregations,
{
    out.write_str(K::STREAM_TYPE);
    out.write_bounded_str("name", partial.name(), MAX_NAME_LEN)?;
    write_partial(partial, out)
}

pub fn read_named<K, A>(input: &mut WireReader<'_>) -> DecodeResult<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    let stream_type = input.read_str("stream_type")?;
    if stream_type != K::STREAM_TYPE {
        return Err(DecodeError::new(
            "stream_type",
            format!("expected '{}', found '{}'", K::STREAM_TYPE, stream_type),
        ));
    }
    let name = input.read_bounded_str("name", MAX_NAME_LEN)?.to_string();
    read_partial(input, name)
}

/// Encodes stream identifier, aggregation name and body.
pub fn encode_named<K, A>(partial: &PartialResult<K, A>) -> EncodeResult<Bytes>
where
    K: TermKey,
    A: SubAggregations,
{
    let mut out = WireWriter::with_capacity(80 + partial.name().len() + partial.len() * 24);
    write_named(partial, &mut out).map_err(observe_encode)?;
    metrics::record_encode(out.len());
    Ok(out.freeze())
}

pub fn decode_named<K, A>(bytes: &[u8]) -> DecodeResult<PartialResult<K, A>>
where
    K: TermKey,
    A: SubAggregations,
{
    let mut input = WireReader::new(bytes);
    let result = read_named(&mut input).and_then(|partial| {
        input.finish("partial")?;
        Ok(partial)
    });
    observe(result)
}

/// Stream identifier of a named record, for choosing a key type before decoding.
pub fn peek_stream_type(bytes: &[u8]) -> DecodeResult<&str> {
    WireReader::new(bytes).read_str("stream_type")
}

fn bucket_count(len: usize) -> EncodeResult<u32> {
    u32::try_from(len).map_err(|_| {
        EncodeError::new("bucket_count", format!("{} buckets do not fit in 32 bits", len))
    })
}

fn observe_encode(err: EncodeError) -> EncodeError {
    warn!("Refused to encode partial result: {}", err);
    metrics::record_encode_error(err.field);
    err
}

fn observe<T>(result: DecodeResult<T>) -> DecodeResult<T> {
    match &result {
        Ok(_) => trace!("Decoded partial result"),
        Err(e) => {
            warn!("Rejected partial result: {}", e);
            metrics::record_decode_error(e.field);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::{Gnd, MutualInformation};
    use crate::key::Term;
    use crate::model::NoSubAggregations;

    fn sample() -> PartialResult {
        let mut partial = PartialResult::new(
            "tags",
            AggregationSettings {
                required_size: 5,
                min_doc_count: 2,
                heuristic: SignificanceHeuristic::MutualInformation(MutualInformation {
                    include_negatives: true,
                    background_is_superset: false,
                }),
                format: DocValueFormat::Binary,
            },
            30,
            300,
            vec![
                Bucket::leaf("foo", 5, 9),
                Bucket::leaf("bar", 1, 1),
                Bucket::leaf(&[0u8, 0xFF][..], 0, 200),
            ],
        );
        partial.rescore();
        partial
    }

    #[test]
    fn test_body_roundtrip() {
        let partial = sample();
        let bytes = encode(&partial).unwrap();
        let decoded: PartialResult = decode("tags", &bytes).unwrap();
        assert_eq!(decoded, partial);
        assert!(!decoded.is_indexed());
    }

    #[test]
    fn test_named_roundtrip() {
        let partial = sample();
        let bytes = encode_named(&partial).unwrap();
        assert_eq!(peek_stream_type(&bytes).unwrap(), "sigsterms");
        let decoded: PartialResult = decode_named(&bytes).unwrap();
        assert_eq!(decoded.name(), "tags");
        assert_eq!(decoded, partial);
    }

    #[test]
    fn test_numeric_keys_roundtrip() {
        let partial: PartialResult<i64> = PartialResult::new(
            "status_codes",
            AggregationSettings {
                heuristic: SignificanceHeuristic::Gnd(Gnd::default()),
                ..AggregationSettings::default()
            },
            40,
            4000,
            vec![Bucket::leaf(404i64, 12, 30), Bucket::leaf(-1i64, 3, 3)],
        );
        let bytes = encode_named(&partial).unwrap();
        assert_eq!(peek_stream_type(&bytes).unwrap(), "siglterms");
        let decoded: PartialResult<i64> = decode_named(&bytes).unwrap();
        assert_eq!(decoded, partial);
    }

    #[test]
    fn test_layout_prefix() {
        let partial: PartialResult = PartialResult::new(
            "k",
            AggregationSettings::default(),
            10,
            100,
            vec![],
        );
        let bytes = encode(&partial).unwrap();
        let mut expected = vec![3, b'r', b'a', b'w', 10, 3, 10, 100, 3, b'j', b'l', b'h'];
        expected.push(0); // bucket count
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_score_is_big_endian_double() {
        let partial: PartialResult = PartialResult::new(
            "k",
            AggregationSettings::default(),
            10,
            100,
            vec![Bucket::leaf("a", 1, 1).with_score(1.5)],
        );
        let bytes = encode(&partial).unwrap();
        // ... bucket count, term "a", subset_df, superset_df, then the score
        let score_at = bytes.len() - 1 - 8;
        assert_eq!(&bytes[score_at..score_at + 8], &1.5f64.to_be_bytes());
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let bytes = encode(&sample()).unwrap();
        for len in 0..bytes.len() {
            let result: DecodeResult<PartialResult> = decode("tags", &bytes[..len]);
            assert!(result.is_err(), "prefix of {} bytes decoded", len);
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode(&sample()).unwrap().to_vec();
        bytes.push(0);
        let err = decode::<Term, NoSubAggregations>("tags", &bytes).unwrap_err();
        assert_eq!(err.field, "partial");
    }

    #[test]
    fn test_wrong_stream_type_rejected() {
        let bytes = encode_named(&sample()).unwrap();
        let err = decode_named::<i64, NoSubAggregations>(&bytes).unwrap_err();
        assert_eq!(err.field, "stream_type");
    }

    #[test]
    fn test_absurd_bucket_count_rejected() {
        let mut out = WireWriter::new();
        DocValueFormat::Raw.write(&mut out);
        out.write_vlong(10);
        out.write_vlong(1);
        out.write_vlong(10);
        out.write_vlong(100);
        SignificanceHeuristic::default().write(&mut out);
        out.write_vint(u32::MAX);
        let bytes = out.freeze();

        let err = decode::<Term, NoSubAggregations>("k", &bytes).unwrap_err();
        assert_eq!(err.field, "bucket_count");
    }

    #[test]
    fn test_unknown_names_rejected() {
        let mut out = WireWriter::new();
        out.write_str("date_time");
        let bytes = out.freeze();
        let err = decode::<Term, NoSubAggregations>("k", &bytes).unwrap_err();
        assert_eq!(err.field, "format");

        let mut out = WireWriter::new();
        DocValueFormat::Raw.write(&mut out);
        for v in [10, 1, 10, 100] {
            out.write_vlong(v);
        }
        out.write_str("script_heuristic");
        let bytes = out.freeze();
        let err = decode::<Term, NoSubAggregations>("k", &bytes).unwrap_err();
        assert_eq!(err.field, "heuristic");
    }

    fn named(name: String) -> PartialResult {
        PartialResult::new(
            name,
            AggregationSettings::default(),
            10,
            100,
            vec![Bucket::leaf("foo", 3, 5)],
        )
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_bucket_count_beyond_u32_refused() {
        assert_eq!(bucket_count(u32::MAX as usize).unwrap(), u32::MAX);
        let err = bucket_count(u32::MAX as usize + 1).unwrap_err();
        assert_eq!(err.field, "bucket_count");
    }

    #[test]
    fn test_long_aggregation_name_roundtrip() {
        let partial: PartialResult = named("n".repeat(300));
        let bytes = encode_named(&partial).unwrap();
        let decoded: PartialResult = decode_named(&bytes).unwrap();
        assert_eq!(decoded.name().len(), 300);
        assert_eq!(decoded, partial);
    }

    #[test]
    fn test_oversized_name_not_encoded() {
        let partial: PartialResult = named("n".repeat(MAX_NAME_LEN + 1));
        let err = encode_named(&partial).unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn test_oversized_term_not_encoded() {
        let partial: PartialResult = PartialResult::new(
            "tags",
            AggregationSettings::default(),
            10,
            100,
            vec![Bucket::leaf(vec![b'x'; 40_000], 1, 1)],
        );
        let err = encode(&partial).unwrap_err();
        assert_eq!(err.field, "bucket.term");
        let err = encode_named(&partial).unwrap_err();
        assert_eq!(err.field, "bucket.term");
    }
}
