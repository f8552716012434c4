//! Component registry boundary
//!
//! Components (loaded modules and similar consumers) carry their own byte
//! counter, independent of the trie. The host owns the list; the report
//! path only walks it, holding the host's guard for the whole pass.

use std::fmt;
use std::io::BufRead;

use parking_lot::Mutex;

use crate::{LkmaError, Result};

/// One externally tracked consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component name
    pub name: String,

    /// Bytes currently attributed (may dip below zero transiently)
    pub attributed_bytes: i64,
}

impl Component {
    /// Create a component entry.
    pub fn new(name: impl Into<String>, attributed_bytes: i64) -> Self {
        Self {
            name: name.into(),
            attributed_bytes,
        }
    }
}

/// Host-owned component list.
///
/// Implementations hold their mutual-exclusion guard for the entire call,
/// so a visitor sees one consistent pass.
pub trait ComponentSource: Send + Sync + fmt::Debug {
    /// Visit every component in list order. The first visitor error stops
    /// the pass and is returned.
    fn for_each_component(
        &self,
        visit: &mut dyn FnMut(&Component) -> Result<()>,
    ) -> Result<()>;
}

/// In-memory component list guarded by a mutex.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    entries: Mutex<Vec<Component>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Create a registry holding `components` in order.
    pub fn with_components(components: impl IntoIterator<Item = Component>) -> Self {
        Self {
            entries: Mutex::new(components.into_iter().collect()),
        }
    }

    /// Parse `name<TAB>bytes` lines. Blank lines and `#` comments are skipped.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| {
                LkmaError::InvalidInput(format!("line {}: {}", line_no + 1, err))
            })?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, bytes) = line.rsplit_once('\t').ok_or_else(|| {
                LkmaError::InvalidInput(format!(
                    "line {}: expected '<name>\\t<bytes>'",
                    line_no + 1
                ))
            })?;
            let bytes: i64 = bytes.trim().parse().map_err(|_| {
                LkmaError::InvalidInput(format!(
                    "line {}: invalid byte count '{}'",
                    line_no + 1,
                    bytes
                ))
            })?;
            entries.push(Component::new(name.trim(), bytes));
        }
        Ok(Self::with_components(entries))
    }

    /// Append a component.
    pub fn register(&self, name: impl Into<String>, attributed_bytes: i64) {
        self.entries
            .lock()
            .push(Component::new(name, attributed_bytes));
    }

    /// Remove every component named `name`; returns how many were removed.
    pub fn unregister(&self, name: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|component| component.name != name);
        before - entries.len()
    }

    /// Adjust the counter of the first component named `name`.
    pub fn charge(&self, name: &str, delta: i64) -> Result<()> {
        let mut entries = self.entries.lock();
        let component = entries
            .iter_mut()
            .find(|component| component.name == name)
            .ok_or_else(|| LkmaError::NotFound(name.to_string()))?;
        component.attributed_bytes = component.attributed_bytes.saturating_add(delta);
        Ok(())
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ComponentSource for ComponentRegistry {
    fn for_each_component(
        &self,
        visit: &mut dyn FnMut(&Component) -> Result<()>,
    ) -> Result<()> {
        let entries = self.entries.lock();
        for component in entries.iter() {
            visit(component)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_in_order() {
        let registry = ComponentRegistry::new();
        registry.register("ext4", 100);
        registry.register("loop", 20);

        let mut seen = Vec::new();
        registry
            .for_each_component(&mut |c| {
                seen.push(c.name.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["ext4", "loop"]);
    }

    #[test]
    fn test_visitor_error_stops_pass() {
        let registry = ComponentRegistry::with_components([
            Component::new("a", 1),
            Component::new("b", 2),
        ]);

        let mut visits = 0;
        let err = registry
            .for_each_component(&mut |_| {
                visits += 1;
                Err(LkmaError::out_of_memory("report buffer", 1))
            })
            .unwrap_err();
        assert_eq!(visits, 1);
        assert!(matches!(err, LkmaError::OutOfMemory { .. }));
    }

    #[test]
    fn test_charge_and_unregister() {
        let registry = ComponentRegistry::new();
        registry.register("nfs", 10);
        registry.charge("nfs", -15).unwrap();
        assert!(registry.charge("absent", 1).is_err());

        let mut bytes = 0;
        registry
            .for_each_component(&mut |c| {
                bytes = c.attributed_bytes;
                Ok(())
            })
            .unwrap();
        assert_eq!(bytes, -5);

        assert_eq!(registry.unregister("nfs"), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parse_components_file() {
        let input = "# name\tbytes\next4\t4096\n\nbtrfs\t-12\n";
        let registry = ComponentRegistry::from_reader(input.as_bytes()).unwrap();
        assert_eq!(registry.len(), 2);

        assert!(ComponentRegistry::from_reader("ext4 4096\n".as_bytes()).is_err());
        assert!(ComponentRegistry::from_reader("ext4\tlots\n".as_bytes()).is_err());
    }
}
