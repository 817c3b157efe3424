//! Enabling managed resource kinds by pattern.

use crate::error::{Error, Result};
use crate::resource::GroupVersionKind;
use regex::Regex;

/// Whether `gvk` is enabled by `enabled_apis`.
///
/// An empty list enables everything. Otherwise the kind, formatted as
/// `group/version.Kind`, must match at least one pattern. Patterns are not
/// anchored.
pub fn is_api_enabled<S: AsRef<str>>(gvk: &GroupVersionKind, enabled_apis: &[S]) -> Result<bool> {
    if enabled_apis.is_empty() {
        return Ok(true);
    }

    let subject = gvk.to_string();
    for pattern in enabled_apis {
        let pattern = pattern.as_ref();
        let re = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        if re.is_match(&subject) {
            log::trace!("{subject} enabled by {pattern:?}");
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> GroupVersionKind {
        GroupVersionKind::new("s3.aws.tfjet.io", "v1alpha1", "Bucket")
    }

    #[test]
    fn test_empty_list_enables_everything() {
        let none: [&str; 0] = [];
        assert!(is_api_enabled(&bucket(), &none).unwrap());
    }

    #[test]
    fn test_matching() {
        assert!(is_api_enabled(&bucket(), &[r"s3\.aws\.tfjet\.io/v1alpha1\.Bucket"]).unwrap());
        assert!(is_api_enabled(&bucket(), &["ec2", "s3"]).unwrap());
        assert!(is_api_enabled(&bucket(), &[r"\.Bucket$"]).unwrap());
        assert!(!is_api_enabled(&bucket(), &["^ec2", r"v1beta1"]).unwrap());
    }

    #[test]
    fn test_owned_patterns() {
        let patterns = vec![".*".to_string()];
        assert!(is_api_enabled(&bucket(), &patterns).unwrap());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = is_api_enabled(&bucket(), &["("]).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "("));
    }

    #[test]
    fn test_invalid_pattern_after_match_is_not_reached() {
        assert!(is_api_enabled(&bucket(), &["Bucket", "("]).unwrap());
    }
}
