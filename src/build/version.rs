//! Monotonic artifact versions per build target.

use dashmap::DashMap;
use semver::Version;

use crate::intent::ChangeAction;

/// Next version for `action`: remove is breaking, add and enhance are
/// features, fix and update are patches. Pre-release and build tags drop.
pub fn bump_version(base: &Version, action: ChangeAction) -> Version {
    match action {
        ChangeAction::Remove => Version::new(base.major + 1, 0, 0),
        ChangeAction::Add | ChangeAction::Enhance => Version::new(base.major, base.minor + 1, 0),
        ChangeAction::Fix | ChangeAction::Update => {
            if base.pre.is_empty() {
                Version::new(base.major, base.minor, base.patch + 1)
            } else {
                // 1.2.3-rc.1 < 1.2.3, so the release itself is the next version.
                Version::new(base.major, base.minor, base.patch)
            }
        }
    }
}

/// Issues versions that never go backwards for a given target.
#[derive(Debug, Default)]
pub struct VersionSequencer {
    issued: DashMap<String, Version>,
}

impl VersionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next version for `target`, starting from the later of `base` and
    /// the last version issued for it.
    pub fn next(&self, target: &str, base: Option<&Version>, action: ChangeAction) -> Version {
        let mut last = self
            .issued
            .entry(target.to_string())
            .or_insert_with(|| Version::new(0, 0, 0));
        let start = match base {
            Some(base) if *base > *last => base.clone(),
            _ => last.clone(),
        };
        let next = bump_version(&start, action);
        *last = next.clone();
        next
    }

    pub fn last_issued(&self, target: &str) -> Option<Version> {
        self.issued.get(target).map(|v| v.clone())
    }
}
