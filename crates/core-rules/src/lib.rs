//! Business rules over a card collection.
//!
//! Schema validation (in `core-model`) decides whether a single record is a
//! card at all. The rules here judge cards *in context*: naming convention,
//! delimiter balance, whether dependency ids resolve, whether a card can
//! reach a dependency cycle, and whether the denormalised `dependents` field
//! agrees with the `dependencies` edges.
//!
//! Nothing here rejects or repairs data. Every check produces zero or more
//! [`RuleViolation`]s which are accumulated and handed back together; no check
//! short-circuits another. Whether any of them blocks an operation is the
//! caller's decision, expressed through [`RulePolicy`].
//!
//! Validation is available per card ([`RuleValidator::validate_card`], one
//! fresh traversal per call) and per collection
//! ([`RuleValidator::validate_collection`], one shared traversal for all
//! cards). Both produce identical violations for a card that belongs to the
//! collection.

use core_model::{Card, CardCollection};
use thiserror::Error;
use tracing::debug;

pub mod graph;
pub mod integrity;

pub use graph::{CardMetrics, DependencyIndex};
pub use integrity::{DelimiterFault, check_delimiters, validate_card_name, validate_code_integrity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Worth surfacing; never blocks unless a policy escalates it.
    Advisory,
    /// The collection is inconsistent (dangling reference or cycle).
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("card `{card_id}`: name `{name}` is not a valid identifier")]
    InvalidName { card_id: String, name: String },
    #[error("card `{card_id}`: unbalanced delimiters ({fault})")]
    Integrity {
        card_id: String,
        fault: DelimiterFault,
    },
    #[error("Dependency {missing} not found")]
    MissingDependency { card_id: String, missing: String },
    #[error("card `{card_id}`: circular dependency detected")]
    Cycle { card_id: String },
    #[error("card `{card_id}`: dependency `{dependency}` does not list it as a dependent")]
    UnlistedDependent { card_id: String, dependency: String },
    #[error("card `{card_id}`: `{dependent}` is listed as a dependent but does not depend on it")]
    StaleDependent { card_id: String, dependent: String },
    #[error("card `{card_id}`: dependent `{missing}` not found")]
    MissingDependent { card_id: String, missing: String },
}

impl RuleViolation {
    pub fn card_id(&self) -> &str {
        match self {
            RuleViolation::InvalidName { card_id, .. }
            | RuleViolation::Integrity { card_id, .. }
            | RuleViolation::MissingDependency { card_id, .. }
            | RuleViolation::Cycle { card_id }
            | RuleViolation::UnlistedDependent { card_id, .. }
            | RuleViolation::StaleDependent { card_id, .. }
            | RuleViolation::MissingDependent { card_id, .. } => card_id,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RuleViolation::MissingDependency { .. } | RuleViolation::Cycle { .. } => {
                Severity::Error
            }
            _ => Severity::Advisory,
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, RuleViolation::Cycle { .. })
    }

    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, RuleViolation::MissingDependency { .. })
    }
}

/// Which violations the caller wants to treat as blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RulePolicy {
    pub enforce_names: bool,
    pub enforce_integrity: bool,
    pub enforce_references: bool,
}

impl RulePolicy {
    /// Surface everything, block nothing.
    pub fn advisory() -> Self {
        Self::default()
    }

    pub fn blocks(&self, violation: &RuleViolation) -> bool {
        match violation {
            RuleViolation::InvalidName { .. } => self.enforce_names,
            RuleViolation::Integrity { .. } => self.enforce_integrity,
            RuleViolation::MissingDependency { .. } | RuleViolation::Cycle { .. } => {
                self.enforce_references
            }
            RuleViolation::UnlistedDependent { .. }
            | RuleViolation::StaleDependent { .. }
            | RuleViolation::MissingDependent { .. } => false,
        }
    }
}

/// Violations for a whole collection, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleReport {
    pub violations: Vec<RuleViolation>,
}

impl RuleReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn for_card<'s>(&'s self, id: &'s str) -> impl Iterator<Item = &'s RuleViolation> {
        self.violations.iter().filter(move |v| v.card_id() == id)
    }

    pub fn errors(&self) -> impl Iterator<Item = &RuleViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity() == Severity::Error)
    }

    pub fn advisories(&self) -> impl Iterator<Item = &RuleViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity() == Severity::Advisory)
    }

    pub fn cyclic_card_ids(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter(|v| v.is_cycle())
            .map(RuleViolation::card_id)
            .collect()
    }

    pub fn blocking(&self, policy: &RulePolicy) -> Vec<&RuleViolation> {
        self.violations.iter().filter(|v| policy.blocks(v)).collect()
    }
}

/// Stateless rule checker borrowing one collection.
#[derive(Debug)]
pub struct RuleValidator<'a> {
    index: DependencyIndex<'a>,
}

impl<'a> RuleValidator<'a> {
    pub fn new(cards: &'a CardCollection) -> Self {
        Self {
            index: DependencyIndex::new(cards),
        }
    }

    pub fn validate_name(card: &Card) -> Option<RuleViolation> {
        (!validate_card_name(&card.name)).then(|| RuleViolation::InvalidName {
            card_id: card.id.clone(),
            name: card.name.clone(),
        })
    }

    pub fn validate_integrity(card: &Card) -> Option<RuleViolation> {
        check_delimiters(&card.code)
            .err()
            .map(|fault| RuleViolation::Integrity {
                card_id: card.id.clone(),
                fault,
            })
    }

    fn missing_references(&self, card: &Card) -> Vec<RuleViolation> {
        self.index
            .missing_dependencies(card)
            .map(|missing| RuleViolation::MissingDependency {
                card_id: card.id.clone(),
                missing: missing.to_string(),
            })
            .collect()
    }

    fn cycle(card: &Card) -> RuleViolation {
        RuleViolation::Cycle {
            card_id: card.id.clone(),
        }
    }

    /// Existence of every dependency id, then acyclicity, for `card` against
    /// the collection. `card` may be a candidate not yet in the collection.
    pub fn validate_dependencies(&self, card: &Card) -> Vec<RuleViolation> {
        let mut out = self.missing_references(card);
        if self.index.reaches_cycle(card) {
            out.push(Self::cycle(card));
        }
        out
    }

    /// Does the stored `dependents` field agree with the actual edges?
    pub fn validate_dependents(&self, card: &Card) -> Vec<RuleViolation> {
        let mut out = Vec::new();
        for dependency in self.index.resolved_dependencies(card) {
            if !dependency.dependents.iter().any(|d| *d == card.id) {
                out.push(RuleViolation::UnlistedDependent {
                    card_id: card.id.clone(),
                    dependency: dependency.id.clone(),
                });
            }
        }
        for listed in &card.dependents {
            match self.index.card(listed) {
                None => out.push(RuleViolation::MissingDependent {
                    card_id: card.id.clone(),
                    missing: listed.clone(),
                }),
                Some(user) if !user.dependencies.iter().any(|d| *d == card.id) => {
                    out.push(RuleViolation::StaleDependent {
                        card_id: card.id.clone(),
                        dependent: listed.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        out
    }

    fn collect(&self, card: &Card, reaches_cycle: bool, out: &mut Vec<RuleViolation>) {
        out.extend(Self::validate_name(card));
        out.extend(Self::validate_integrity(card));
        out.extend(self.missing_references(card));
        if reaches_cycle {
            out.push(Self::cycle(card));
        }
        out.extend(self.validate_dependents(card));
    }

    /// Every rule for one card, using a fresh traversal.
    pub fn validate_card(&self, card: &Card) -> Vec<RuleViolation> {
        let mut out = Vec::new();
        self.collect(card, self.index.reaches_cycle(card), &mut out);
        out
    }

    /// Every rule for every card, sharing one cycle traversal.
    pub fn validate_collection(&self) -> RuleReport {
        let cards = self.index.cards();
        let reaches = self.index.cycle_scan();
        let mut violations = Vec::new();
        for (card, &cyclic) in cards.iter().zip(&reaches) {
            self.collect(card, cyclic, &mut violations);
        }
        let report = RuleReport { violations };
        debug!(
            target: "rules",
            cards = cards.len(),
            violations = report.len(),
            errors = report.errors().count(),
            cycles = report.cyclic_card_ids().len(),
            "collection_validated"
        );
        report
    }
}
