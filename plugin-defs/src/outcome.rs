/// The closed set of stable outcome codes returned by the public manager API (spec.md §6).
///
/// Values are part of the ABI contract and must never be renumbered.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success = 0,
    UnknownError = 1,

    NothingFound = 100,
    NameAlreadyExists = 101,
    CannotParseMetadata = 102,
    ListFilesError = 103,

    DependencyBadVersion = 200,
    DependencyNotFound = 201,
    DependencyCycle = 202,

    UnloadNotAll = 300,
}

impl Outcome {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Outcome::Success => "Success",
            Outcome::UnknownError => "UnknownError",
            Outcome::NothingFound => "NothingFound",
            Outcome::NameAlreadyExists => "NameAlreadyExists",
            Outcome::CannotParseMetadata => "CannotParseMetadata",
            Outcome::ListFilesError => "ListFilesError",
            Outcome::DependencyBadVersion => "DependencyBadVersion",
            Outcome::DependencyNotFound => "DependencyNotFound",
            Outcome::DependencyCycle => "DependencyCycle",
            Outcome::UnloadNotAll => "UnloadNotAll",
        };
        write!(f, "{name} ({})", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec() {
        assert_eq!(Outcome::Success.code(), 0);
        assert_eq!(Outcome::DependencyCycle.code(), 202);
        assert_eq!(Outcome::UnloadNotAll.code(), 300);
    }
}
