//! In-memory model of a configuration document
//!
//! A document is an ordered sequence of sections. Each section has a type,
//! an optional name (empty string means anonymous), single-valued options,
//! and ordered multi-valued lists. Option keys and list keys live in
//! disjoint namespaces; the format grammar guarantees this.

use std::collections::BTreeMap;

/// A configuration document: an ordered sequence of sections
///
/// Equality is semantic: section order matters, option ordering within a
/// section does not (options live in a sorted map), and list value order
/// is preserved and significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: Vec<Section>,
}

/// A config section (named or anonymous)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section type, e.g. `interface`, `rule`, `zone`
    section_type: String,
    /// Optional name, e.g. `wan`, `lan`; empty for anonymous sections
    name: String,
    /// Single-valued options
    options: BTreeMap<String, String>,
    /// Multi-valued lists, append order preserved per key
    lists: BTreeMap<String, Vec<String>>,
}

impl ConfigDocument {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section to the document
    pub fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Iterate over sections in document order
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Number of sections in the document
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// True if the document has no sections
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Find a section by type and name
    pub fn section(&self, section_type: &str, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.section_type == section_type && s.name == name)
    }

    /// All sections of a given type, in document order
    pub fn sections_by_type(&self, section_type: &str) -> Vec<&Section> {
        self.sections
            .iter()
            .filter(|s| s.section_type == section_type)
            .collect()
    }

    /// Resolve the section a dotted-path segment refers to
    ///
    /// Named sections match on name. An anonymous section matches when its
    /// type equals the segment; the first such section wins (positional
    /// addressing).
    pub fn section_for_path(&self, segment: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name == segment || (s.name.is_empty() && s.section_type == segment))
    }

    /// Mutable variant of [`ConfigDocument::section_for_path`]
    pub fn section_for_path_mut(&mut self, segment: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.name == segment || (s.name.is_empty() && s.section_type == segment))
    }
}

impl Section {
    /// Create a new section; pass an empty name for an anonymous section
    pub fn new(section_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            section_type: section_type.into(),
            name: name.into(),
            options: BTreeMap::new(),
            lists: BTreeMap::new(),
        }
    }

    /// Section type
    pub fn section_type(&self) -> &str {
        &self.section_type
    }

    /// Section name; empty for anonymous sections
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the section has no name and is addressed positionally
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Set a single-valued option
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    /// Get a single-valued option
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Iterate over options in key order
    pub fn options(&self) -> impl Iterator<Item = (&String, &String)> {
        self.options.iter()
    }

    /// Append a value to a list option
    pub fn push_list_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.lists.entry(key.into()).or_default().push(value.into());
    }

    /// Get a list option; `None` when the key was never appended to
    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.lists.get(key).map(Vec::as_slice)
    }

    /// Iterate over lists in key order
    pub fn lists(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.lists.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_lookup_by_type_and_name() {
        let mut doc = ConfigDocument::new();
        let mut wan = Section::new("interface", "wan");
        wan.set_option("proto", "static");
        doc.push_section(wan);
        doc.push_section(Section::new("interface", "lan"));

        assert!(doc.section("interface", "wan").is_some());
        assert!(doc.section("interface", "wifi").is_none());
        assert_eq!(doc.sections_by_type("interface").len(), 2);
    }

    #[test]
    fn test_path_resolution_prefers_name_then_anonymous_type() {
        let mut doc = ConfigDocument::new();
        doc.push_section(Section::new("defaults", ""));
        doc.push_section(Section::new("rule", "allow-ssh"));

        // Anonymous section addressed by its type
        let defaults = doc.section_for_path("defaults").unwrap();
        assert!(defaults.is_anonymous());

        // Named section addressed by its name
        let rule = doc.section_for_path("allow-ssh").unwrap();
        assert_eq!(rule.section_type(), "rule");
    }

    #[test]
    fn test_list_append_order_preserved() {
        let mut zone = Section::new("zone", "lan");
        zone.push_list_value("network", "eth1");
        zone.push_list_value("network", "eth2");
        zone.push_list_value("network", "eth0");

        assert_eq!(zone.list("network").unwrap(), &["eth1", "eth2", "eth0"]);
        assert!(zone.list("absent").is_none());
    }

    #[test]
    fn test_semantic_equality_ignores_option_insertion_order() {
        let mut a = Section::new("interface", "wan");
        a.set_option("proto", "static");
        a.set_option("ipaddr", "192.168.1.1");

        let mut b = Section::new("interface", "wan");
        b.set_option("ipaddr", "192.168.1.1");
        b.set_option("proto", "static");

        assert_eq!(a, b);
    }
}
