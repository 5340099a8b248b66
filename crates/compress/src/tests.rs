use super::*;

const SAMPLE: &[u8] = b"valuevaluevaluevaluevaluevaluevaluevaluevaluevalue";

#[test]
fn ids_are_stable() {
    assert_eq!(Compression::None.id(), 0);
    assert_eq!(Compression::Snappy.id(), 1);
    assert_eq!(Compression::Lz4.id(), 2);
    for c in Compression::ALL {
        assert_eq!(Compression::from_id(c.id()), Some(c));
    }
    assert_eq!(Compression::from_id(3), None);
    assert_eq!(Compression::from_id(u16::MAX), None);
}

#[test]
fn default_is_snappy() {
    assert_eq!(Compression::default(), Compression::Snappy);
}

#[test]
fn names_parse_case_insensitively() {
    assert_eq!(Compression::from_name("LZ4"), Some(Compression::Lz4));
    assert_eq!(Compression::from_name(" snappy "), Some(Compression::Snappy));
    assert_eq!(Compression::from_name("None"), Some(Compression::None));
    assert_eq!(Compression::from_name("zstd"), None);
    assert_eq!(Compression::Lz4.to_string(), "lz4");
}

#[test]
fn none_has_no_backend() {
    assert!(Compression::None.backend().is_none());
    assert!(Compression::None.compressor().is_none());
    assert!(Compression::None.decompressor().is_none());
}

#[test]
fn snappy_roundtrip_and_shrinks_repetitive_input() {
    let b = Compression::Snappy.backend().unwrap();
    let packed = (b.compress)(SAMPLE);
    assert!(packed.len() < SAMPLE.len());
    assert_eq!((b.decompress)(&packed).unwrap(), SAMPLE);
}

#[test]
fn lz4_roundtrip_and_shrinks_repetitive_input() {
    let b = Compression::Lz4.backend().unwrap();
    let packed = (b.compress)(SAMPLE);
    assert!(packed.len() < SAMPLE.len());
    assert_eq!((b.decompress)(&packed).unwrap(), SAMPLE);
}

#[test]
fn compression_is_deterministic() {
    for c in [Compression::Snappy, Compression::Lz4] {
        let f = c.compressor().unwrap();
        assert_eq!(f(SAMPLE), f(SAMPLE));
    }
}

#[test]
fn empty_input_roundtrips() {
    for c in [Compression::Snappy, Compression::Lz4] {
        let b = c.backend().unwrap();
        let packed = (b.compress)(b"");
        assert_eq!((b.decompress)(&packed).unwrap(), Vec::<u8>::new());
    }
}

#[test]
fn snappy_rejects_garbage() {
    // Varint length header claims 0x7f bytes but there is no body.
    let err = snappy_decompress(&[0x7f]).unwrap_err();
    assert!(matches!(err, CompressError::Snappy(_)));
}

#[test]
fn lz4_rejects_short_header() {
    let err = lz4_decompress(&[1, 2]).unwrap_err();
    assert!(matches!(err, CompressError::Lz4Header(2)));
}

#[test]
fn lz4_rejects_oversized_length() {
    let mut input = (u32::MAX).to_le_bytes().to_vec();
    input.push(0);
    let err = lz4_decompress(&input).unwrap_err();
    assert!(matches!(err, CompressError::TooLarge(_)));
}

#[test]
fn lz4_rejects_corrupt_block() {
    // Token announces an extended literal length that never arrives.
    let mut input = 16u32.to_le_bytes().to_vec();
    input.push(0xF0);
    let err = lz4_decompress(&input).unwrap_err();
    assert!(matches!(err, CompressError::Lz4(_)));
}
