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

//! Discovery request and response
//!
//! The ramdisk posts a JSON object with a `data` list of facts; the hook
//! returns the same object with `data` removed and the extracted attributes
//! filled in. Fields the hook does not know are carried through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::attributes::{
    CPUS, CPU_ARCH, DATA, INTERFACES, IPMI_ADDRESS, LOCAL_GB, MEMORY_MB, PROFILE,
};
use crate::facts::Fact;
use crate::pattern::Bindings;

/// MAC and IPv4 of one network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub mac: String,
    pub ip: String,
}

/// Discovery request and response.
///
/// Deserialization goes through a plain JSON map: the typed attribute fields
/// only take string values, anything else under those names is kept in
/// `extra` as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct NodeInfo {
    /// Raw facts; present on input, removed by the hook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Fact>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_arch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_gb: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipmi_address: Option<String>,

    /// Interface name to MAC/IPv4
    pub interfaces: BTreeMap<String, Interface>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Other request fields and profile variables
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const STRING_ATTRIBUTES: [&str; 6] = [MEMORY_MB, CPUS, CPU_ARCH, LOCAL_GB, IPMI_ADDRESS, PROFILE];

impl TryFrom<Map<String, Value>> for NodeInfo {
    type Error = serde_json::Error;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let data = fields
            .remove(DATA)
            .map(serde_json::from_value::<Option<Vec<Fact>>>)
            .transpose()?
            .flatten();
        let interfaces = fields
            .remove(INTERFACES)
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        let mut node = Self {
            data,
            interfaces,
            ..Self::default()
        };
        for name in STRING_ATTRIBUTES {
            if !matches!(fields.get(name), Some(Value::String(_))) {
                continue;
            }
            if let Some(Value::String(value)) = fields.remove(name) {
                node.set_attribute(name, value);
            }
        }
        node.extra = fields;
        Ok(node)
    }
}

impl NodeInfo {
    pub fn with_data(data: Vec<Fact>) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Set an attribute by name. Returns false for names the hook manages
    /// structurally (`data`, `interfaces`), which are left alone.
    pub fn set_attribute(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            MEMORY_MB => &mut self.memory_mb,
            CPUS => &mut self.cpus,
            CPU_ARCH => &mut self.cpu_arch,
            LOCAL_GB => &mut self.local_gb,
            IPMI_ADDRESS => &mut self.ipmi_address,
            PROFILE => &mut self.profile,
            DATA | INTERFACES => {
                warn!(attribute = name, "Refusing to overwrite reserved attribute");
                return false;
            }
            _ => {
                self.extra.insert(name.to_string(), Value::String(value));
                return true;
            }
        };
        // a non-string value passed through under the same name
        self.extra.remove(name);
        *slot = Some(value);
        true
    }

    /// Look up a string attribute by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            MEMORY_MB => self.memory_mb.as_deref(),
            CPUS => self.cpus.as_deref(),
            CPU_ARCH => self.cpu_arch.as_deref(),
            LOCAL_GB => self.local_gb.as_deref(),
            IPMI_ADDRESS => self.ipmi_address.as_deref(),
            PROFILE => self.profile.as_deref(),
            _ => self.extra.get(name).and_then(Value::as_str),
        }
    }

    /// Record the resolved profile, then merge its variables over whatever
    /// is already set
    pub fn apply_profile(&mut self, profile: String, vars: Bindings) {
        self.profile = Some(profile);
        for (name, value) in vars {
            self.set_attribute(&name, value);
        }
    }
}
