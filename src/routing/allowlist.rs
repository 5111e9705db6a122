//! Upstream host allowlist.
//!
//! # Design Decisions
//! - Compiled in, immutable at runtime (thread-safe without locks)
//! - Exact, case-sensitive comparison against the path segment
//! - `trusted` is informational; it does not change forwarding

/// A permitted upstream host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowlistEntry {
    pub host: &'static str,
    /// Official game origin as opposed to a community site.
    pub trusted: bool,
}

const BUILTIN: &[AllowlistEntry] = &[
    AllowlistEntry { host: "www.pathofexile2.com", trusted: true },
    AllowlistEntry { host: "ru.pathofexile2.com", trusted: true },
    AllowlistEntry { host: "pathofexile2.tw", trusted: true },
    AllowlistEntry { host: "poe2.game.daum.net", trusted: true },
    AllowlistEntry { host: "poe.ninja", trusted: false },
    AllowlistEntry { host: "www.poeprices.info", trusted: false },
];

/// The set of hosts the proxy is willing to forward to.
#[derive(Debug, Clone, Copy)]
pub struct Allowlist {
    entries: &'static [AllowlistEntry],
}

impl Allowlist {
    /// The compiled-in allowlist.
    pub fn builtin() -> Self {
        Self { entries: BUILTIN }
    }

    pub fn lookup(&self, host: &str) -> Option<&AllowlistEntry> {
        self.entries.iter().find(|entry| entry.host == host)
    }

    pub fn entries(&self) -> &[AllowlistEntry] {
        self.entries
    }
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hosts_are_found_with_their_tag() {
        let allowlist = Allowlist::builtin();
        assert!(allowlist.lookup("www.pathofexile2.com").unwrap().trusted);
        assert!(!allowlist.lookup("poe.ninja").unwrap().trusted);
    }

    #[test]
    fn comparison_is_exact_and_case_sensitive() {
        let allowlist = Allowlist::builtin();
        assert!(allowlist.lookup("POE.NINJA").is_none());
        assert!(allowlist.lookup("poe.ninja.").is_none());
        assert!(allowlist.lookup("pathofexile2.com").is_none());
        assert!(allowlist.lookup("poe.ninja:443").is_none());
        assert!(allowlist.lookup("").is_none());
    }

    #[test]
    fn unknown_hosts_are_rejected() {
        assert!(Allowlist::builtin().lookup("evil.example").is_none());
    }
}
