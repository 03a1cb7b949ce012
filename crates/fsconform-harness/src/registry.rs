//! Ordered probe catalogue

use crate::probe::{Category, Probe};
use crate::probes;

/// Probes in the order they run
#[derive(Debug, Default, Clone)]
pub struct Registry {
    probes: Vec<Probe>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in probe, grouped by category.
    pub fn standard() -> Self {
        Self {
            probes: probes::all(),
        }
    }

    pub fn register(&mut self, probe: Probe) {
        self.probes.push(probe);
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Probe> {
        self.probes.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Keep the listed categories; an empty list keeps everything.
    pub fn only(self, categories: &[Category]) -> Self {
        if categories.is_empty() {
            return self;
        }
        Self {
            probes: self
                .probes
                .into_iter()
                .filter(|p| categories.contains(&p.category))
                .collect(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&Probe> {
        self.probes.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique_path_components() {
        let registry = Registry::standard();
        let mut seen = HashSet::new();
        for probe in registry.iter() {
            assert!(
                seen.insert(probe.name.to_ascii_lowercase()),
                "duplicate probe name {}",
                probe.name
            );
            assert!(
                probe.name.chars().all(|c| c.is_ascii_alphanumeric()),
                "{} is not a plain path component",
                probe.name
            );
        }
        assert!(registry.len() >= 110);
    }

    #[test]
    fn test_every_category_is_populated() {
        let registry = Registry::standard();
        for category in Category::ALL {
            assert!(
                !registry.clone().only(&[category]).is_empty(),
                "no probes in {category}"
            );
        }
    }

    #[test]
    fn test_category_order_is_grouped() {
        let registry = Registry::standard();
        let order: Vec<Category> = registry.iter().map(|p| p.category).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_filter_and_find() {
        let registry = Registry::standard().only(&[Category::Locking]);
        assert!(registry.iter().all(|p| p.category == Category::Locking));
        assert!(registry.find("LockFileBasicExclusive").is_some());
        assert!(registry.find("CreateAlways").is_none());
    }
}
