//! Rule store: the deduplicated exception and exclusion rule sets.

use ahash::AHashSet;

use crate::rule::{Rule, RuleKind};

/// The in-memory set of active filter rules, split by kind.
///
/// A store is built mutably while loading (via [`add`](RuleStore::add) and
/// [`add_all`](RuleStore::add_all)) and then published as an immutable
/// snapshot behind an atomic pointer swap, so concurrent readers always see
/// a complete store. The two sets are disjoint by construction: a rule's
/// kind decides the set it lands in.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    exceptions: AHashSet<Rule>,
    exclusions: AHashSet<Rule>,
}

impl RuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule into the set matching its kind.
    ///
    /// Idempotent: duplicate rules (same effective line and kind) collapse.
    /// Empty rules are discarded.
    pub fn add(&mut self, rule: Rule) {
        match rule.kind() {
            RuleKind::Exception => {
                log::debug!("exception added {}", rule);
                self.exceptions.insert(rule);
            }
            RuleKind::Exclusion => {
                log::debug!("exclusion added {}", rule);
                self.exclusions.insert(rule);
            }
            RuleKind::Empty => {}
        }
    }

    /// Union-merge another store into this one.
    ///
    /// Used to accumulate rules while scanning multiple subscription
    /// sources before they are all ready.
    pub fn add_all(&mut self, other: &RuleStore) {
        self.exceptions.extend(other.exceptions.iter().cloned());
        self.exclusions.extend(other.exclusions.iter().cloned());
    }

    /// Clear this store and refill it from another.
    pub fn replace_all(&mut self, other: &RuleStore) {
        self.exceptions.clear();
        self.exclusions.clear();
        self.add_all(other);
    }

    /// Total number of rules across both sets.
    pub fn rule_count(&self) -> usize {
        self.exceptions.len() + self.exclusions.len()
    }

    /// Number of exception rules.
    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    /// Number of exclusion rules.
    pub fn exclusion_count(&self) -> usize {
        self.exclusions.len()
    }

    /// Check if the store holds no rules at all.
    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }

    /// Iterate the exception rules.
    pub fn exceptions(&self) -> impl Iterator<Item = &Rule> {
        self.exceptions.iter()
    }

    /// Iterate the exclusion rules.
    pub fn exclusions(&self) -> impl Iterator<Item = &Rule> {
        self.exclusions.iter()
    }

    /// Check whether any exception rule matches the URL.
    pub fn matches_exception(&self, url: &str) -> bool {
        scan(&self.exceptions, url)
    }

    /// Check whether any exclusion rule matches the URL.
    pub fn matches_exclusion(&self, url: &str) -> bool {
        scan(&self.exclusions, url)
    }
}

/// First-match scan over a rule set.
///
/// Order among rules is insignificant for the yes/no verdict; the first
/// hit short-circuits the scan.
fn scan(rules: &AHashSet<Rule>, url: &str) -> bool {
    for rule in rules {
        if rule.applies(url) {
            log::debug!(
                "{} {:?} matches {:?} (regex={}) (original line={:?})",
                rule.kind(),
                rule.effective_line(),
                url,
                rule.regex_str(),
                rule.original_line()
            );
            return true;
        }
    }
    false
}
