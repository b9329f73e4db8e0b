//! Key-space model: how a flat object-store key namespace maps onto a virtual
//! folder hierarchy.
//!
//! Object stores have no directories. A "folder" is the set of keys sharing a
//! prefix up to the last [`DELIMITER`], and a key that ends in the delimiter is
//! an explicit (empty) folder marker object. Everything here is pure string
//! logic so the enumeration and transfer engines can be tested without a store.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// The character used to simulate hierarchy over flat keys.
pub const DELIMITER: char = '/';

/// Scheme prefix used by the data platform when referring to a bucket location.
pub const BUCKET_URI_SCHEME: &str = "s3a://";

// Unreserved characters plus the delimiter stay literal in a copy source.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Split a key into `(folder, leaf)` at the last delimiter.
///
/// A key without a delimiter belongs to the root folder (`""`). A folder marker
/// (`"a/b/"`) yields an empty leaf.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rfind(DELIMITER) {
        Some(idx) => (&key[..idx], &key[idx + 1..]),
        None => ("", key),
    }
}

/// The substring after the last delimiter, or the whole key when there is none.
pub fn leaf_name(key: &str) -> &str {
    split_key(key).1
}

/// The folder a key lives in, without trailing delimiter.
pub fn parent_folder(key: &str) -> &str {
    split_key(key).0
}

pub fn is_folder_marker(key: &str) -> bool {
    key.ends_with(DELIMITER)
}

/// Normalise a folder name into a listing prefix ending in the delimiter.
/// The root folder stays empty.
pub fn folder_prefix(prefix: &str) -> String {
    if prefix.is_empty() || is_folder_marker(prefix) {
        prefix.to_string()
    } else {
        format!("{prefix}{DELIMITER}")
    }
}

/// Build `prefix/leaf`. Trailing delimiters on the prefix are collapsed so a
/// destination given as `"dest/"` does not produce `"dest//leaf"`.
pub fn join_key(prefix: &str, leaf: &str) -> String {
    let prefix = prefix.trim_end_matches(DELIMITER);
    if prefix.is_empty() {
        leaf.to_string()
    } else {
        format!("{prefix}{DELIMITER}{leaf}")
    }
}

/// The base URI form of a bucket, e.g. `s3a://my-bucket/`.
pub fn bucket_base_uri(bucket: &str) -> String {
    format!("{BUCKET_URI_SCHEME}{bucket}/")
}

/// Strip a bucket base URI from a full path, yielding the bucket-relative key.
/// Paths that do not start with the base are returned unchanged.
pub fn trim_bucket_base<'a>(path: &'a str, base_uri: &str) -> &'a str {
    path.strip_prefix(base_uri).unwrap_or(path)
}

/// Decode one key returned by a URL-encoded listing back to its literal form.
///
/// Listings use form encoding: a space arrives as `+` and a literal `+` as
/// `%2B`, so `+` is turned back into a space before percent-decoding. `%3D` is
/// normalised to `=` afterwards in case the store double-encoded partition
/// separators.
pub fn decode_listed_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let decoded = percent_decode_str(&spaced).decode_utf8_lossy();
    normalize_key(&decoded)
}

/// Decode a batch of listed keys, see [`decode_listed_key`].
pub fn decode_listed_keys<I, K>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    raw.into_iter()
        .map(|key| decode_listed_key(key.as_ref()))
        .collect()
}

/// Replace a leftover encoded `=` in a key.
pub fn normalize_key(key: &str) -> String {
    key.replace("%3D", "=")
}

/// The `bucket/key` copy-source form with the key percent-encoded.
pub fn encode_copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE))
}

/// The tail of `key` starting at the last occurrence of `marker`, e.g. the
/// `date_partition=2024-01-01/part-0.csv` part of a partitioned table key.
/// Keys without the marker fall back to their leaf name.
pub fn partition_tail<'a>(key: &'a str, marker: &str) -> &'a str {
    match key.rfind(marker) {
        Some(idx) if !marker.is_empty() => &key[idx..],
        _ => leaf_name(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_name_is_text_after_last_delimiter() {
        assert_eq!(leaf_name("a/b/c.txt"), "c.txt");
        assert_eq!(leaf_name("a/b.txt"), "b.txt");
        assert_eq!(leaf_name("plain.txt"), "plain.txt");
        assert_eq!(leaf_name(""), "");
    }

    #[test]
    fn key_without_delimiter_lives_in_root_folder() {
        assert_eq!(split_key("report.csv"), ("", "report.csv"));
        assert_eq!(parent_folder("report.csv"), "");
    }

    #[test]
    fn folder_marker_has_empty_leaf() {
        assert!(is_folder_marker("logs/2024/"));
        assert_eq!(split_key("logs/2024/"), ("logs/2024", ""));
        assert!(!is_folder_marker("logs/2024"));
    }

    #[test]
    fn folder_prefix_appends_single_delimiter() {
        assert_eq!(folder_prefix("logs"), "logs/");
        assert_eq!(folder_prefix("logs/"), "logs/");
        assert_eq!(folder_prefix(""), "");
    }

    #[test]
    fn join_key_collapses_trailing_delimiters() {
        assert_eq!(join_key("dest", "b.txt"), "dest/b.txt");
        assert_eq!(join_key("dest/", "b.txt"), "dest/b.txt");
        assert_eq!(join_key("", "b.txt"), "b.txt");
    }

    #[test]
    fn trims_bucket_base_uri() {
        let base = bucket_base_uri("eda-sbx");
        assert_eq!(base, "s3a://eda-sbx/");
        assert_eq!(
            trim_bucket_base("s3a://eda-sbx/prod/integrated/objects/", &base),
            "prod/integrated/objects/"
        );
        assert_eq!(trim_bucket_base("prod/raw/", &base), "prod/raw/");
    }

    #[test]
    fn decodes_url_encoded_listing() {
        assert_eq!(
            decode_listed_key("raw/date_partition%3D2024-01-01/a%20b.csv"),
            "raw/date_partition=2024-01-01/a b.csv"
        );
        assert_eq!(decode_listed_key("%253D"), "=");
    }

    #[test]
    fn plus_in_listing_is_a_space() {
        assert_eq!(decode_listed_key("raw/a+b.csv"), "raw/a b.csv");
        assert_eq!(decode_listed_key("raw/c%2Bd.csv"), "raw/c+d.csv");
    }

    #[test]
    fn decoding_an_encoded_listing_is_idempotent() {
        let keys = [
            "logs/2024/a.csv",
            "raw/date_partition=2024-01-01/part 0.csv",
            "unicode/é/ß.json",
            "folder/",
        ];
        for key in keys {
            let encoded = utf8_percent_encode(key, NON_ALPHANUMERIC).to_string();
            let once = decode_listed_key(&encoded);
            assert_eq!(once, key);
            assert_eq!(decode_listed_key(&once), once);
        }
    }

    #[test]
    fn copy_source_keeps_delimiters_literal() {
        assert_eq!(
            encode_copy_source("bucket", "raw/date=1/a b.csv"),
            "bucket/raw/date%3D1/a%20b.csv"
        );
    }

    #[test]
    fn partition_tail_falls_back_to_leaf() {
        assert_eq!(
            partition_tail("raw/t/date_partition=1/p.csv", "date_partition"),
            "date_partition=1/p.csv"
        );
        assert_eq!(partition_tail("raw/t/p.csv", "date_partition"), "p.csv");
    }
}
