//! Stored version codec
//!
//! History rows key versions by a string that sorts correctly: non-semantic
//! versions carry a `0000.0000.0000-` prefix, semantic versions are padded to
//! four digits per component and carry a suffix so the same displayed version
//! can be stored twice.

use crate::constants::migration::{MAX_VERSION_COMPONENT, NON_SEMANTIC_PREFIX};

use super::MigrationError;

/// Displayed form of a stored version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVersion {
    pub use_semantic_version: bool,
    pub version: String,
    pub semantic_version_suffix: String,
}

/// Encode a displayed version into its stored key
pub fn to_stored_version(
    use_semantic_version: bool,
    version: &str,
    semantic_version_suffix: &str,
) -> Result<String, MigrationError> {
    if !use_semantic_version {
        return Ok(format!("{NON_SEMANTIC_PREFIX}{version}"));
    }

    let [major, minor, patch] = parse_semantic_version(version)?;
    Ok(format!("{major:04}.{minor:04}.{patch:04}-{semantic_version_suffix}"))
}

/// Decode a stored key back into its displayed version
pub fn from_stored_version(stored_version: &str) -> Result<DecodedVersion, MigrationError> {
    if let Some(version) = stored_version.strip_prefix(NON_SEMANTIC_PREFIX) {
        return Ok(DecodedVersion {
            use_semantic_version: false,
            version: version.to_string(),
            semantic_version_suffix: String::new(),
        });
    }

    let invalid = |reason: String| MigrationError::InvalidStoredVersion {
        stored_version: stored_version.to_string(),
        reason,
    };

    let (prefix, suffix) = stored_version
        .split_once('-')
        .ok_or_else(|| invalid("version should contain '-'".to_string()))?;

    let parts: Vec<&str> = prefix.split('.').collect();
    let components = match parts.as_slice() {
        [major, minor, patch] => [major, minor, patch].map(|p| p.parse::<u64>().ok()),
        _ => [None, None, None],
    };
    let [Some(major), Some(minor), Some(patch)] = components else {
        return Err(invalid(format!(
            "version prefix {prefix:?} should be in semantic version format"
        )));
    };
    if [major, minor, patch].iter().any(|c| *c >= MAX_VERSION_COMPONENT) {
        return Err(invalid(format!(
            "major, minor, patch version of {prefix:?} should be < {MAX_VERSION_COMPONENT}"
        )));
    }

    Ok(DecodedVersion {
        use_semantic_version: true,
        version: format!("{major}.{minor}.{patch}"),
        semantic_version_suffix: suffix.to_string(),
    })
}

/// Parse `MAJOR.MINOR.PATCH[-pre][+build]`, keeping the numeric triple
fn parse_semantic_version(version: &str) -> Result<[u64; 3], MigrationError> {
    let parsed = semver::Version::parse(version).map_err(|e| MigrationError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })?;

    let triple = [parsed.major, parsed.minor, parsed.patch];
    if triple.iter().any(|c| *c >= MAX_VERSION_COMPONENT) {
        return Err(MigrationError::InvalidVersion {
            version: version.to_string(),
            reason: format!("major, minor, patch version should be < {MAX_VERSION_COMPONENT}"),
        });
    }
    Ok(triple)
}
