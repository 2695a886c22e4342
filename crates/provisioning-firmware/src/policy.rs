use config::FirmwarePriority;

/// Which priority tiers a firmware run is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwarePolicy {
    CriticalOnly,
    Recommended,
    Latest,
}

impl FirmwarePolicy {
    pub fn allows(self, priority: FirmwarePriority) -> bool {
        match self {
            FirmwarePolicy::CriticalOnly => priority == FirmwarePriority::Critical,
            FirmwarePolicy::Recommended => {
                matches!(priority, FirmwarePriority::Critical | FirmwarePriority::High)
            }
            FirmwarePolicy::Latest => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_only_excludes_high() {
        assert!(FirmwarePolicy::CriticalOnly.allows(FirmwarePriority::Critical));
        assert!(!FirmwarePolicy::CriticalOnly.allows(FirmwarePriority::High));
    }

    #[test]
    fn recommended_includes_critical_and_high_only() {
        assert!(FirmwarePolicy::Recommended.allows(FirmwarePriority::High));
        assert!(!FirmwarePolicy::Recommended.allows(FirmwarePriority::Normal));
    }

    #[test]
    fn latest_allows_everything() {
        assert!(FirmwarePolicy::Latest.allows(FirmwarePriority::Low));
    }
}
