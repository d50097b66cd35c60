use std::collections::BTreeSet;

/// Exit code the Termux package manager uses for "nothing to do".
pub const PACKAGE_MANAGER_NOOP: i32 = 100;

/// Conventional exit code reported for a timed out operation.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code used when the real one is unavailable (e.g. killed by a signal).
pub const UNKNOWN_EXIT_CODE: i32 = 1;

/// Set of non-zero exit codes that count as success for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitPolicy {
    accepted: BTreeSet<i32>,
}

impl ExitPolicy {
    /// Only `0` is success.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Also accepts the package manager's "already satisfied" code.
    pub fn package_manager() -> Self {
        Self::accepting([PACKAGE_MANAGER_NOOP])
    }

    pub fn accepting<I: IntoIterator<Item = i32>>(codes: I) -> Self {
        Self {
            accepted: codes.into_iter().collect(),
        }
    }

    pub fn accepts(&self, code: i32) -> bool {
        code == 0 || self.accepted.contains(&code)
    }

    /// Maps accepted codes to `0` and leaves every other code untouched.
    pub fn normalize(&self, code: i32) -> i32 {
        if self.accepts(code) {
            0
        } else {
            code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_manager_remaps_100() {
        let policy = ExitPolicy::package_manager();
        assert_eq!(policy.normalize(100), 0);
        assert_eq!(policy.normalize(0), 0);
        assert_eq!(policy.normalize(1), 1);
    }

    #[test]
    fn test_strict_keeps_100() {
        let policy = ExitPolicy::strict();
        assert_eq!(policy.normalize(100), 100);
        assert!(policy.accepts(0));
    }

    #[test]
    fn test_custom_codes() {
        let policy = ExitPolicy::accepting([3, 7]);
        assert_eq!(policy.normalize(3), 0);
        assert_eq!(policy.normalize(7), 0);
        assert_eq!(policy.normalize(100), 100);
    }
}
