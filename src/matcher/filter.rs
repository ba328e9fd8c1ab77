//! Event qualification and protocol-violation checks.

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::chain::types::ChainEvent;

/// The `(pallet, methods)` a session waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWatch {
    /// Watched pallet.
    pub section: String,
    /// Methods that count as a match.
    pub methods: BTreeSet<String>,
    /// Methods of the watched pallet that are neither matches nor violations.
    pub informational: BTreeSet<String>,
}

impl EventWatch {
    /// Watch a pallet for a set of methods.
    pub fn new<I, S>(section: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            section: section.into(),
            methods: methods.into_iter().map(Into::into).collect(),
            informational: BTreeSet::new(),
        }
    }

    /// Tolerate additional informational methods of the watched pallet.
    pub fn with_informational<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.informational.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Applied during an extrinsic, in the watched pallet, with a watched method.
    pub fn qualifies(&self, event: &ChainEvent) -> bool {
        event.extrinsic_index().is_some()
            && event.section == self.section
            && self.methods.contains(&event.method)
    }

    /// Applied during an extrinsic, in the watched pallet, with a method nobody expects.
    pub fn is_violation(&self, event: &ChainEvent) -> bool {
        event.extrinsic_index().is_some()
            && event.section == self.section
            && !self.methods.contains(&event.method)
            && !self.informational.contains(&event.method)
    }
}

impl fmt::Display for EventWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
        write!(f, "{}.[{}]", self.section, methods.join(", "))
    }
}

/// An event in the watched pallet outside the expected method set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected event {section}.{method} at block #{block_height} extrinsic {extrinsic_index}, expected one of {expected}")]
pub struct UnexpectedEvent {
    /// Pallet of the offending event.
    pub section: String,
    /// Method of the offending event.
    pub method: String,
    /// Block it was found in.
    pub block_height: u64,
    /// Extrinsic that emitted it.
    pub extrinsic_index: u32,
    /// What the session was waiting for.
    pub expected: String,
}
