use std::collections::HashSet;
use std::time::Duration;

/// Trust policy, fixed for the lifetime of the process.
///
/// Entries are stored lowercased; membership checks lowercase the probe, so the comparison is
/// case-insensitive. An empty set admits nothing.
#[derive(Clone, Debug)]
pub struct Policy {
    allowed_digests: HashSet<String>,
    allowed_measurements: HashSet<String>,
    poll_interval: Duration,
}

impl Policy {
    pub fn new<D, M>(digests: D, measurements: M, poll_interval: Duration) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        Self {
            allowed_digests: normalize_set(digests),
            allowed_measurements: normalize_set(measurements),
            poll_interval,
        }
    }

    pub fn allows_digest(&self, digest: &str) -> bool {
        self.allowed_digests.contains(&digest.to_lowercase())
    }

    pub fn allows_measurement(&self, measurement: &str) -> bool {
        self.allowed_measurements.contains(&measurement.to_lowercase())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn digest_count(&self) -> usize {
        self.allowed_digests.len()
    }

    pub fn measurement_count(&self) -> usize {
        self.allowed_measurements.len()
    }
}

fn normalize_set<I>(items: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_case_insensitive() {
        let policy = Policy::new(["AB12cd"], [" 0xFEED "], Duration::from_secs(5));
        assert!(policy.allows_digest("ab12CD"));
        assert!(policy.allows_digest("AB12CD"));
        assert!(policy.allows_measurement("0xfeed"));
        assert!(!policy.allows_measurement("feed"));
    }

    #[test]
    fn empty_sets_admit_nothing() {
        let policy = Policy::new(Vec::<String>::new(), ["", "  "], Duration::from_secs(1));
        assert_eq!(policy.digest_count(), 0);
        assert_eq!(policy.measurement_count(), 0);
        assert!(!policy.allows_digest(""));
        assert!(!policy.allows_measurement(""));
    }
}
