//! Name-indexed registry of control points

use crate::point::ControlPoint;
use indexmap::IndexMap;
use tracing::debug;

/// Every control point referenced since startup
///
/// Points are never removed. Positions are stable, so iteration always
/// follows the order in which points were first seen.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    points: IndexMap<String, ControlPoint>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The point named `name`, created as an unrouted placeholder if new
    pub fn find_or_create(&mut self, name: &str) -> &mut ControlPoint {
        let index = match self.points.get_index_of(name) {
            Some(index) => index,
            None => {
                debug!(point = %name, "New control point");
                self.points
                    .insert_full(name.to_string(), ControlPoint::new(name))
                    .0
            }
        };
        &mut self.points[index]
    }

    pub fn get(&self, name: &str) -> Option<&ControlPoint> {
        self.points.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ControlPoint> {
        self.points.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlPoint> {
        self.points.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ControlPoint> {
        self.points.values_mut()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_is_first_seen_wins() {
        let mut registry = ControlRegistry::new();
        registry.find_or_create("pump").provider = "http://relay1".to_string();

        let again = registry.find_or_create("pump");
        assert_eq!(again.provider, "http://relay1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_order_is_stable() {
        let mut registry = ControlRegistry::new();
        for name in ["valve", "pump", "light"] {
            registry.find_or_create(name);
        }
        registry.find_or_create("pump");

        let names: Vec<_> = registry.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["valve", "pump", "light"]);
    }
}
