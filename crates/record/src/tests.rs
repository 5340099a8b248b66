use super::*;
use compress::Compression;

// -------------------- Helpers --------------------

fn kv(key: &[u8], value: &[u8]) -> KvPair {
    KvPair::new(key.to_vec(), value.to_vec())
}

fn roundtrip(pair: &KvPair, prev: &[u8], compression: Compression) -> KvPair {
    let bytes = pair.encode(prev, compression.compressor());
    KvPair::decode(&bytes, prev, compression.decompressor()).unwrap()
}

// -------------------- Prefix length --------------------

#[test]
fn common_prefix_empty_inputs() {
    assert_eq!(common_prefix_len(b"", b""), 0);
    assert_eq!(common_prefix_len(b"abcde", b""), 0);
    assert_eq!(common_prefix_len(b"", b"abcde"), 0);
}

#[test]
fn common_prefix_when_one_is_prefix_of_other() {
    assert_eq!(common_prefix_len(b"abcde", b"abcdefg"), 5);
    assert_eq!(common_prefix_len(b"abcdefg", b"abcde"), 5);
}

#[test]
fn common_prefix_stops_at_first_difference() {
    assert_eq!(common_prefix_len(b"abcxyz", b"abcdef"), 3);
    assert_eq!(common_prefix_len(b"xbc", b"abc"), 0);
}

#[test]
fn common_prefix_saturates_at_255() {
    let a = vec![7u8; 300];
    let b = vec![7u8; 400];
    assert_eq!(common_prefix_len(&a, &b), 255);
    assert_eq!(common_prefix_len(&a[..255], &b), 255);
    assert_eq!(common_prefix_len(&a[..254], &b), 254);
}

// -------------------- Ordering --------------------

#[test]
fn compare_keys_is_bytewise_with_shorter_first() {
    assert_eq!(compare_keys(b"a", b"b"), Ordering::Less);
    assert_eq!(compare_keys(b"ab", b"a"), Ordering::Greater);
    assert_eq!(compare_keys(b"a", b"ab"), Ordering::Less);
    assert_eq!(compare_keys(b"\xff", b"\x01\x02"), Ordering::Greater);
    assert_eq!(compare_keys(b"same", b"same"), Ordering::Equal);
    assert_eq!(compare_keys(b"", b""), Ordering::Equal);
}

// -------------------- Encoding layout --------------------

#[test]
fn plain_record_layout() {
    let bytes = kv(b"key", b"value").encode(b"", None);
    assert_eq!(bytes, b"\x00\x03key\x05value".to_vec());
}

#[test]
fn prefixed_record_stores_only_suffix() {
    let bytes = kv(b"abcdef", b"v1").encode(b"abcxyz", None);
    assert_eq!(bytes, b"\x01\x03\x03def\x02v1".to_vec());
}

#[test]
fn compression_is_only_adopted_when_smaller() {
    let bytes = kv(b"k", b"v").encode(b"", Compression::Snappy.compressor());
    assert_eq!(bytes[0], 0);

    let long_value = vec![b'x'; 200];
    let bytes = kv(b"k", &long_value).encode(b"", Compression::Snappy.compressor());
    let flags = RecordFlags::from_bits(bytes[0]);
    assert!(flags.contains(RecordFlags::VALUE_COMPRESSED));
    assert!(!flags.contains(RecordFlags::KEY_COMPRESSED));
    assert!(bytes.len() < long_value.len());
}

#[test]
fn long_common_prefix_is_capped_in_format() {
    let prev = vec![b'a'; 300];
    let mut key = vec![b'a'; 300];
    key.push(b'b');
    let pair = KvPair::new(key, b"val".to_vec());
    let bytes = pair.encode(&prev, None);
    assert_eq!(bytes[0], RecordFlags::KEY_PREFIXED);
    assert_eq!(bytes[1], 255);
    assert_eq!(roundtrip(&pair, &prev, Compression::None), pair);
}

// -------------------- Round trips --------------------

#[test]
fn roundtrip_across_backends_and_contexts() {
    let pairs = [
        kv(b"apple", b"red"),
        kv(b"applesauce", b"jar jar jar jar jar jar jar jar jar"),
        kv(b"banana", &[0u8; 64]),
        kv(b"\x00\x01\x02", b"\xff\xfe\xfd\xfc"),
        kv(b"", b"empty key"),
    ];
    let prevs: [&[u8]; 4] = [b"", b"app", b"applesauce", b"zzz"];
    for compression in Compression::ALL {
        for pair in &pairs {
            for prev in prevs {
                assert_eq!(
                    roundtrip(pair, prev, compression),
                    *pair,
                    "compression={} prev={:?}",
                    compression,
                    prev
                );
            }
        }
    }
}

#[test]
fn scenario_keykey_with_prev_key() {
    let pair = kv(b"keykeykeykey", b"valuevaluevaluevaluevaluevalue");
    for compression in [Compression::Snappy, Compression::Lz4] {
        let bytes = pair.encode(b"key", compression.compressor());
        let back = KvPair::decode(&bytes, b"key", compression.decompressor()).unwrap();
        assert_eq!(back.key, pair.key);
        assert_eq!(back.value, pair.value);
    }
}

#[test]
fn decode_prefix_reports_consumed_bytes() {
    let mut buf = kv(b"a", b"one").encode(b"", None);
    let first_len = buf.len();
    buf.extend_from_slice(b"trailing");
    let (pair, used) = KvPair::decode_prefix(&buf, b"", None).unwrap();
    assert_eq!(pair, kv(b"a", b"one"));
    assert_eq!(used, first_len);
}

// -------------------- Decode errors --------------------

#[test]
fn empty_input_is_rejected() {
    assert!(matches!(KvPair::decode(&[], b"", None), Err(RecordError::Empty)));
}

#[test]
fn short_input_is_truncated() {
    for len in 1..MIN_RECORD_SIZE {
        let data = vec![0u8; len];
        assert!(matches!(
            KvPair::decode(&data, b"", None),
            Err(RecordError::Truncated { len: l }) if l == len
        ));
    }
}

#[test]
fn prefix_longer_than_prev_key_is_rejected() {
    let data = [RecordFlags::KEY_PREFIXED, 10, 1, b'a', 1, b'b'];
    let err = KvPair::decode(&data, b"abc", None).unwrap_err();
    assert!(matches!(
        err,
        RecordError::BadPrefix {
            prefix_len: 10,
            prev_len: 3
        }
    ));
}

#[test]
fn compressed_record_needs_decompressor() {
    let bytes = kv(b"k", &[b'x'; 200]).encode(b"", Compression::Lz4.compressor());
    assert!(RecordFlags::from_bits(bytes[0]).any_compressed());
    let err = KvPair::decode(&bytes, b"", None).unwrap_err();
    assert!(matches!(err, RecordError::MissingDecompressor));
}

#[test]
fn declared_length_beyond_input_is_rejected() {
    let data = [0u8, 5, b'a', b'b', 1];
    let err = KvPair::decode(&data, b"", None).unwrap_err();
    assert!(matches!(
        err,
        RecordError::ShortField {
            field: "key",
            expected: 5,
            available: 3
        }
    ));
}

#[test]
fn unterminated_length_varint_is_rejected() {
    let data = [0u8, 0x80, 0x80, 0x80, 0x80];
    let err = KvPair::decode(&data, b"", None).unwrap_err();
    assert!(matches!(
        err,
        RecordError::Varint {
            field: "key",
            source: varint::VarintError::Eof
        }
    ));
}

#[test]
fn backend_failure_is_propagated() {
    let data = [RecordFlags::VALUE_COMPRESSED, 1, b'k', 3, 0xff, 0xff, 0xff];
    let err = KvPair::decode(&data, b"", Compression::Snappy.decompressor()).unwrap_err();
    assert!(matches!(err, RecordError::Decompress { field: "value", .. }));
}

// -------------------- Builder / iterator --------------------

#[test]
fn builder_and_iter_roundtrip_sorted_run() {
    let pairs: Vec<KvPair> = (0..50)
        .map(|i| kv(format!("user:{:04}", i).as_bytes(), format!("profile-{}", i).as_bytes()))
        .collect();

    let mut builder = RecordBuilder::new(Compression::Snappy.compressor());
    for p in &pairs {
        builder.push(p).unwrap();
    }
    assert_eq!(builder.count(), 50);
    assert_eq!(builder.last_key(), Some(&b"user:0049"[..]));
    let offsets = builder.offsets().to_vec();
    let run = builder.finish();

    // Later records share the "user:00" prefix, so the run is smaller than
    // the plain concatenation.
    let plain: usize = pairs.iter().map(|p| p.key.len() + p.value.len()).sum();
    assert!(run.len() < plain);

    let decoded: Vec<KvPair> = RecordIter::new(&run, offsets.len(), Compression::Snappy.decompressor())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(decoded, pairs);
}

#[test]
fn builder_rejects_out_of_order_keys() {
    let mut builder = RecordBuilder::new(None);
    builder.push(&kv(b"b", b"two")).unwrap();
    let before = builder.len();
    assert!(matches!(builder.push(&kv(b"a", b"one")), Err(RecordError::OutOfOrder)));
    assert_eq!(builder.len(), before);
    builder.push(&kv(b"b", b"dup")).unwrap();
}

#[test]
fn builder_rejects_records_below_minimum() {
    let mut builder = RecordBuilder::new(None);
    let err = builder.push(&kv(b"k", b"")).unwrap_err();
    assert!(matches!(err, RecordError::BelowMinimum { len: 4 }));
    assert!(builder.is_empty());
    assert_eq!(builder.len(), 0);
}

#[test]
fn iter_stops_after_first_error() {
    let mut builder = RecordBuilder::new(None);
    builder.push(&kv(b"a", b"one")).unwrap();
    let mut run = builder.finish();
    run.extend_from_slice(&[0, 9, 9]);

    let mut it = RecordIter::new(&run, 3, None);
    assert!(it.next().unwrap().is_ok());
    assert!(it.next().unwrap().is_err());
    assert!(it.next().is_none());
}
