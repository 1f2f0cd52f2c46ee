//! Listing request validation

use crate::error::RequestError;
use crate::walker::SLASH_SEPARATOR;
use regex::Regex;
use std::sync::LazyLock;

/// Longest accepted object name or prefix, in bytes
pub const MAX_OBJECT_NAME_LEN: usize = 1024;

static BUCKET_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").expect("Invalid bucket name regex")
});

static IP_ADDRESS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("Invalid IP address regex")
});

/// Check a bucket name against S3 naming rules
pub fn is_valid_bucket_name(bucket: &str) -> bool {
    BUCKET_NAME_REGEX.is_match(bucket)
        && !IP_ADDRESS_REGEX.is_match(bucket)
        && !bucket.contains("..")
        && !bucket.contains(".-")
        && !bucket.contains("-.")
}

/// Whether any complete segment of `name` is `.` or `..`
///
/// The trailing segment only counts when `partial` is false; a prefix such
/// as `a/.` may still match `a/.hidden`.
fn has_dot_segment(name: &str, partial: bool) -> bool {
    let mut segments: Vec<&str> = name.split(SLASH_SEPARATOR).collect();
    if partial && !name.ends_with(SLASH_SEPARATOR) {
        segments.pop();
    }
    segments.iter().any(|s| *s == "." || *s == "..")
}

/// Why an object name (or partial name) cannot be used under a bucket
fn object_name_fault(name: &str, partial: bool) -> Option<String> {
    if name.len() > MAX_OBJECT_NAME_LEN {
        Some(format!("longer than {} bytes", MAX_OBJECT_NAME_LEN))
    } else if name.starts_with(SLASH_SEPARATOR) {
        Some("starts with '/'".to_string())
    } else if name.contains("//") {
        Some("contains an empty path segment".to_string())
    } else if name.contains('\0') {
        Some("contains a NUL byte".to_string())
    } else if has_dot_segment(name, partial) {
        Some("contains a '.' or '..' path segment".to_string())
    } else {
        None
    }
}

/// Check an object prefix, returning why it is rejected
///
/// A bare `/` is accepted; it never matches a key.
pub fn check_object_prefix(prefix: &str) -> Result<(), RequestError> {
    if prefix == SLASH_SEPARATOR {
        return Ok(());
    }
    match object_name_fault(prefix, true) {
        None => Ok(()),
        Some(reason) => Err(RequestError::InvalidObjectPrefix {
            prefix: prefix.to_string(),
            reason,
        }),
    }
}

/// Check a listing marker, returning why it is rejected
pub fn check_marker(marker: &str) -> Result<(), RequestError> {
    match object_name_fault(marker, false) {
        None => Ok(()),
        Some(reason) => Err(RequestError::InvalidMarker {
            marker: marker.to_string(),
            reason,
        }),
    }
}

/// Validate the shape of a listing request
pub fn check_list_objs_args(
    bucket: &str,
    prefix: &str,
    marker: &str,
    delimiter: &str,
) -> Result<(), RequestError> {
    if !is_valid_bucket_name(bucket) {
        return Err(RequestError::InvalidBucketName {
            bucket: bucket.to_string(),
        });
    }

    check_object_prefix(prefix)?;
    check_marker(marker)?;

    if !delimiter.is_empty() && delimiter != SLASH_SEPARATOR {
        return Err(RequestError::UnsupportedDelimiter {
            delimiter: delimiter.to_string(),
        });
    }

    if !marker.is_empty() && !marker.starts_with(prefix) {
        return Err(RequestError::InvalidMarkerPrefixCombination {
            marker: marker.to_string(),
            prefix: prefix.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        for good in ["abc", "my-bucket", "logs.2017", "a1b2c3"] {
            assert!(is_valid_bucket_name(good), "{}", good);
        }
        let long = "a".repeat(64);
        for bad in [
            "ab",
            "Bucket",
            "-bucket",
            "bucket-",
            "my..bucket",
            "my.-bucket",
            "my-.bucket",
            "192.168.1.1",
            "under_score",
            long.as_str(),
        ] {
            assert!(!is_valid_bucket_name(bad), "{}", bad);
        }
    }

    #[test]
    fn test_object_prefixes() {
        assert!(check_object_prefix("").is_ok());
        assert!(check_object_prefix("/").is_ok());
        assert!(check_object_prefix("photos/2017/").is_ok());
        assert!(check_object_prefix("a//b").is_err());
        assert!(check_object_prefix("nul\0").is_err());
        assert!(check_object_prefix(&"p".repeat(MAX_OBJECT_NAME_LEN)).is_ok());
        assert!(check_object_prefix(&"p".repeat(MAX_OBJECT_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_prefixes_cannot_leave_bucket() {
        for bad in ["../", "..", "a/../b", "a/..", "./a", "a/./", "/abs/", "/tmp/", "/a"] {
            assert!(
                matches!(check_object_prefix(bad), Err(RequestError::InvalidObjectPrefix { .. })),
                "{}",
                bad
            );
        }
        // An unterminated last segment is still a partial name
        for good in ["a/.", "a/.hid", ".config/", "a/..b/", "..x"] {
            assert!(check_object_prefix(good).is_ok(), "{}", good);
        }
    }

    #[test]
    fn test_markers() {
        assert!(check_marker("").is_ok());
        assert!(check_marker("a/b.txt").is_ok());
        assert!(check_marker("a/.hid").is_ok());
        for bad in ["/a", "../b", "a/..", "a/.", "a//b", "nul\0"] {
            assert!(
                matches!(check_marker(bad), Err(RequestError::InvalidMarker { .. })),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_list_args() {
        assert!(check_list_objs_args("bucket", "", "", "").is_ok());
        assert!(check_list_objs_args("bucket", "a/", "a/b", "/").is_ok());

        assert!(matches!(
            check_list_objs_args("BAD", "", "", ""),
            Err(RequestError::InvalidBucketName { .. })
        ));
        assert!(matches!(
            check_list_objs_args("bucket", "", "", ","),
            Err(RequestError::UnsupportedDelimiter { .. })
        ));
        assert!(matches!(
            check_list_objs_args("bucket", "../", "", "/"),
            Err(RequestError::InvalidObjectPrefix { .. })
        ));
        assert!(matches!(
            check_list_objs_args("bucket", "a/", "a/../../etc", ""),
            Err(RequestError::InvalidMarker { .. })
        ));
        assert!(matches!(
            check_list_objs_args("bucket", "a/", "b", ""),
            Err(RequestError::InvalidMarkerPrefixCombination { .. })
        ));
    }
}
