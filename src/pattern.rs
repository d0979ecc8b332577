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

//! Typed fact patterns
//!
//! A pattern is a tuple of tokens matched position by position against a
//! fact of the same arity. The textual `*` / `$name` syntax only exists at
//! the boundary (catalog files, command line); inside the crate tokens are
//! always tagged.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use edeploy_error::{DiscoveryError, Result};

use crate::constants::pattern::{CAPTURE_PREFIX, CLI_SEPARATOR, WILDCARD};
use crate::facts::Fact;

/// Capture name to matched value
pub type Bindings = BTreeMap<String, String>;

/// One position of a pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Must equal the fact token exactly
    Literal(String),
    /// Matches anything, binds nothing
    Wildcard,
    /// Matches anything and binds it under the name
    Capture(String),
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn capture(name: impl Into<String>) -> Self {
        Self::Capture(name.into())
    }

    /// Parse the textual form: `*`, `$name`, or a literal.
    ///
    /// A lone `$` parses as a capture with an empty name, which
    /// [`Pattern::new`] rejects.
    pub fn parse(text: &str) -> Self {
        if text == WILDCARD {
            Self::Wildcard
        } else if let Some(name) = text.strip_prefix(CAPTURE_PREFIX) {
            Self::Capture(name.to_string())
        } else {
            Self::Literal(text.to_string())
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{}", value),
            Self::Wildcard => write!(f, "{}", WILDCARD),
            Self::Capture(name) => write!(f, "{}{}", CAPTURE_PREFIX, name),
        }
    }
}

/// Validated tuple of tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    tokens: Vec<Token>,
}

impl Pattern {
    /// Build a pattern, rejecting empty or repeated capture names
    pub fn new(tokens: Vec<Token>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (position, token) in tokens.iter().enumerate() {
            if let Token::Capture(name) = token {
                if name.is_empty() {
                    return Err(DiscoveryError::EmptyCaptureName { position });
                }
                if !seen.insert(name.as_str()) {
                    return Err(DiscoveryError::DuplicateCapture { name: name.clone() });
                }
            }
        }
        Ok(Self { tokens })
    }

    /// Built-in patterns whose captures are known to be valid
    pub(crate) fn trusted(tokens: Vec<Token>) -> Self {
        debug_assert!(Self::new(tokens.clone()).is_ok(), "invalid built-in pattern");
        Self { tokens }
    }

    /// Parse a sequence of textual tokens
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        if tokens.is_empty() {
            return Err(DiscoveryError::InvalidPattern("pattern has no tokens".into()));
        }
        Self::new(tokens.iter().map(|t| Token::parse(t.as_ref())).collect())
    }

    /// Parse a comma-separated pattern such as `network,$iface,serial,$mac`
    pub fn parse_cli(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = text.split(CLI_SEPARATOR).map(str::trim).collect();
        Self::parse(&tokens)
    }

    pub fn arity(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Names of the captures, in position order
    pub fn captures(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Capture(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Test a single fact. Returns the captured values on success.
    pub fn matches(&self, fact: &Fact) -> Option<Bindings> {
        self.matches_with(fact, &Bindings::new())
    }

    /// Like [`Pattern::matches`], but a capture whose name is already in
    /// `bound` only accepts that value.
    pub(crate) fn matches_with(&self, fact: &Fact, bound: &Bindings) -> Option<Bindings> {
        if fact.arity() != self.arity() {
            return None;
        }

        let mut captured = Bindings::new();
        for (token, value) in self.tokens.iter().zip(fact.tokens()) {
            match token {
                Token::Literal(expected) => {
                    if expected != value {
                        return None;
                    }
                }
                Token::Wildcard => {}
                Token::Capture(name) => {
                    if let Some(previous) = bound.get(name) {
                        if previous != value {
                            return None;
                        }
                    }
                    captured.insert(name.clone(), value.clone());
                }
            }
        }
        Some(captured)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", token)?;
        }
        write!(f, ")")
    }
}
