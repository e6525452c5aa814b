use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const WINDOW_TYPE: &str = "Window";
pub const GLOBAL_TYPE: &str = "Global";
pub const OBJECT_TYPE: &str = "Object";

/// User agents every extracted global is visible to, unless configured otherwise.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Android", "Chrome", "IE", "iPad", "iPhone", "Konqueror", "Mozilla", "Opera", "Safari",
];

#[must_use]
pub fn default_user_agents() -> Vec<String> {
    DEFAULT_USER_AGENTS.iter().map(ToString::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyElement {
    pub name: String,
    pub type_names: Vec<String>,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default)]
    pub is_instance_property: bool,
    #[serde(default)]
    pub is_class_property: bool,
    #[serde(default)]
    pub user_agents: BTreeSet<String>,
}

impl PropertyElement {
    pub fn new(name: impl Into<String>, type_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            type_names,
            is_internal: false,
            is_instance_property: false,
            is_class_property: false,
            user_agents: BTreeSet::new(),
        }
    }

    /// Replaces any narrower visibility with exactly `user_agents`.
    pub fn set_has_all_user_agents(&mut self, user_agents: &[String]) {
        self.user_agents = user_agents.iter().cloned().collect();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeElement {
    pub name: String,
    #[serde(default)]
    pub parent_types: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyElement>,
}

impl TypeElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_types: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn add_parent_type(&mut self, parent: impl Into<String>) {
        let parent = parent.into();
        if !self.parent_types.contains(&parent) {
            self.parent_types.push(parent);
        }
    }

    /// Appends; duplicate names are kept.
    pub fn add_property(&mut self, property: PropertyElement) {
        self.properties.push(property);
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyElement> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_stamp_overrides_narrower_visibility() {
        let mut property = PropertyElement::new("x", vec![OBJECT_TYPE.to_string()]);
        property.user_agents.insert("Netscape".to_string());

        property.set_has_all_user_agents(&default_user_agents());

        let expected: BTreeSet<String> = default_user_agents().into_iter().collect();
        assert_eq!(property.user_agents, expected);
    }
}
