use semver::Version;

mod metadata;
mod outcome;

pub use metadata::{DependencySpec, MetadataError, PluginMetadata};
pub use outcome::Outcome;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid plugin metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error("'{0}' is not a valid plugin identifier")]
    InvalidIdentifier(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Two plug-ins/hosts are compatible iff they share a major version and `have`'s
/// minor.patch is at least `want`'s minor.patch within that major.
pub fn version_compatible(have: &Version, want: &Version) -> bool {
    have.major == want.major && (have.minor, have.patch) >= (want.minor, want.patch)
}

/// ASCII identifier: letters, digits, underscore; must not start with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_same_major_higher_minor_patch() {
        let have = Version::new(1, 2, 3);
        assert!(version_compatible(&have, &Version::new(1, 0, 0)));
        assert!(version_compatible(&have, &Version::new(1, 2, 3)));
        assert!(!version_compatible(&have, &Version::new(1, 3, 0)));
        assert!(!version_compatible(&have, &Version::new(2, 0, 0)));
    }

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("plug_in"));
        assert!(is_valid_identifier("_private"));
        assert!(!is_valid_identifier("1plugin"));
        assert!(!is_valid_identifier("plug-in"));
        assert!(!is_valid_identifier(""));
    }
}
