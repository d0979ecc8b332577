/*
 * This file is part of edeploy-hook.
 *
 * Copyright (C) 2025 edeploy-hook contributors
 *
 * edeploy-hook is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * edeploy-hook is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with edeploy-hook. If not, see <https://www.gnu.org/licenses/>.
 */

//! Hardware facts reported by the inspection ramdisk
//!
//! Holds the immutable per-request snapshot and the consumable working copies
//! handed to the extraction phase.

use serde::{Deserialize, Serialize};

/// One hierarchical hardware observation, e.g. `(network, eth0, serial, <mac>)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fact(Vec<String>);

impl Fact {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<String>> for Fact {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

/// Immutable snapshot of the facts of one discovery event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactStore {
    facts: Vec<Fact>,
}

impl FactStore {
    pub fn new(facts: Vec<Fact>) -> Self {
        Self { facts }
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Fresh consumable copy; the snapshot itself is never consumed
    pub fn working_set(&self) -> WorkingSet {
        WorkingSet {
            facts: self.facts.clone(),
        }
    }
}

/// Consumable copy of a FactStore
///
/// Facts removed by a successful extraction are gone for good, so repeated
/// extraction with the same pattern walks through distinct facts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    facts: Vec<Fact>,
}

impl WorkingSet {
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub(crate) fn consume(&mut self, index: usize) -> Fact {
        self.facts.remove(index)
    }
}

impl From<Vec<Fact>> for WorkingSet {
    fn from(facts: Vec<Fact>) -> Self {
        Self { facts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_deserializes_from_json_array() {
        let fact: Fact = serde_json::from_str(r#"["cpu", "logical", "number", "8"]"#).unwrap();
        assert_eq!(fact.arity(), 4);
        assert_eq!(fact.tokens()[3], "8");
    }

    #[test]
    fn test_working_set_does_not_touch_snapshot() {
        let store = FactStore::new(vec![
            Fact::new(["a", "b"]),
            Fact::new(["c", "d"]),
        ]);
        let mut working = store.working_set();
        let removed = working.consume(0);

        assert_eq!(removed, Fact::new(["a", "b"]));
        assert_eq!(working.len(), 1);
        assert_eq!(store.len(), 2);
    }
}
