use std::fmt;

/// Classification category for a script line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Winget,
    Choco,
    Pip,
    Other,
}

impl Bucket {
    /// Display order.
    pub const ALL: [Bucket; 4] = [Bucket::Winget, Bucket::Choco, Bucket::Pip, Bucket::Other];

    pub fn key(self) -> &'static str {
        match self {
            Bucket::Winget => "winget",
            Bucket::Choco => "choco",
            Bucket::Pip => "pip",
            Bucket::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Winget => "Winget Packages",
            Bucket::Choco => "Chocolatey Packages",
            Bucket::Pip => "Pip / Python Packages",
            Bucket::Other => "Other Commands",
        }
    }

    fn index(self) -> usize {
        match self {
            Bucket::Winget => 0,
            Bucket::Choco => 1,
            Bucket::Pip => 2,
            Bucket::Other => 3,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Result of scanning one script: the trimmed lines of each bucket in file
/// order, and whether the script existed at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    found: bool,
    buckets: [Vec<String>; 4],
}

impl InstallPlan {
    /// Empty plan for a script that does not exist.
    pub fn missing() -> Self {
        Self::default()
    }

    pub(crate) fn found_empty() -> Self {
        Self {
            found: true,
            ..Self::default()
        }
    }

    pub(crate) fn push(&mut self, bucket: Bucket, line: String) {
        self.buckets[bucket.index()].push(line);
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn lines(&self, bucket: Bucket) -> &[String] {
        &self.buckets[bucket.index()]
    }

    /// Buckets in display order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &[String])> {
        Bucket::ALL.into_iter().map(|b| (b, self.lines(b)))
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_plan_is_empty_and_not_found() {
        let plan = InstallPlan::missing();
        assert!(!plan.is_found());
        assert!(plan.is_empty());
        assert!(plan.iter().all(|(_, lines)| lines.is_empty()));
    }

    #[test]
    fn push_keeps_order_and_duplicates() {
        let mut plan = InstallPlan::found_empty();
        plan.push(Bucket::Pip, "pip install a".to_string());
        plan.push(Bucket::Other, "x".to_string());
        plan.push(Bucket::Pip, "pip install a".to_string());

        assert_eq!(plan.lines(Bucket::Pip), ["pip install a", "pip install a"]);
        assert_eq!(plan.total(), 3);
    }

    #[test]
    fn iter_follows_display_order() {
        let order: Vec<&str> = InstallPlan::missing().iter().map(|(b, _)| b.key()).collect();
        assert_eq!(order, ["winget", "choco", "pip", "other"]);
    }
}
