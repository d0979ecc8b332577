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

//! Fact extraction and template matching
//!
//! `match_spec` pulls one fact out of a working set; `match_all` decides
//! whether a whole fact set satisfies a profile template.

use tracing::trace;

use crate::facts::{Fact, WorkingSet};
use crate::pattern::{Bindings, Pattern};

/// Extract the first fact matching `pattern`.
///
/// On success the captures are written into `bindings` (overwriting names
/// already present) and the fact is removed from `facts`. On failure neither
/// is touched.
pub fn match_spec(pattern: &Pattern, facts: &mut WorkingSet, bindings: &mut Bindings) -> bool {
    let hit = facts
        .facts()
        .iter()
        .enumerate()
        .find_map(|(index, fact)| pattern.matches(fact).map(|captured| (index, captured)));

    match hit {
        Some((index, captured)) => {
            let fact = facts.consume(index);
            trace!(pattern = %pattern, fact = ?fact.tokens(), "Fact consumed");
            bindings.extend(captured);
            true
        }
        None => false,
    }
}

/// Satisfy every pattern with a distinct fact.
///
/// A capture bound by an earlier pattern only accepts the same value in later
/// patterns. Fact choices are backtracked, so the first consistent assignment
/// in fact order wins. `facts` is left as is.
pub fn match_all(patterns: &[Pattern], facts: &[Fact]) -> Option<Bindings> {
    let mut used = vec![false; facts.len()];
    let mut bindings = Bindings::new();
    if search(patterns, facts, &mut used, &mut bindings) {
        Some(bindings)
    } else {
        None
    }
}

fn search(patterns: &[Pattern], facts: &[Fact], used: &mut [bool], bindings: &mut Bindings) -> bool {
    let Some((pattern, rest)) = patterns.split_first() else {
        return true;
    };

    for (index, fact) in facts.iter().enumerate() {
        if used[index] {
            continue;
        }
        let Some(captured) = pattern.matches_with(fact, bindings) else {
            continue;
        };

        let added: Vec<String> = captured
            .keys()
            .filter(|name| !bindings.contains_key(*name))
            .cloned()
            .collect();
        bindings.extend(captured);
        used[index] = true;

        if search(rest, facts, used, bindings) {
            return true;
        }

        used[index] = false;
        for name in added {
            bindings.remove(&name);
        }
    }
    false
}
