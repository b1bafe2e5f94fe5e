//! Identifier Types
//!
//! Stable identities for motives, actions, world objects and running activities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a need the actor can have (hunger, energy, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MotiveId(pub String);

impl MotiveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MotiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MotiveId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identity of an action definition. Many candidates share one identity across targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Generational handle to a world object.
///
/// The generation changes whenever the slot is reused, so a stale handle never
/// aliases a newer object. Holders of an `ObjectId` do not own the object.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ObjectId {
    pub index: u32,
    pub generation: u32,
}

impl ObjectId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the handle for the next occupant of the same slot.
    pub fn next_generation(self) -> Self {
        Self {
            index: self.index,
            generation: self.generation.wrapping_add(1),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}v{}", self.index, self.generation)
    }
}

/// Identifier of an activity currently running on the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub u32);

/// Coarse priority bucket. Higher values outrank lower ones.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PriorityTier(pub u8);

impl PriorityTier {
    pub const LOW: PriorityTier = PriorityTier(0);
    pub const NORMAL: PriorityTier = PriorityTier(1);
    pub const HIGH: PriorityTier = PriorityTier(2);
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&MotiveId::new("hunger")).unwrap(), r#""hunger""#);
        assert_eq!(serde_json::to_string(&ActionId::new("eat")).unwrap(), r#""eat""#);
        assert_eq!(serde_json::to_string(&PriorityTier::HIGH).unwrap(), "2");
    }

    #[test]
    fn test_next_generation_keeps_index() {
        let id = ObjectId::new(7, 3);
        let next = id.next_generation();
        assert_eq!(next.index, 7);
        assert_eq!(next.generation, 4);
        assert_ne!(id, next);
    }

    #[test]
    fn test_priority_tier_ordering() {
        assert!(PriorityTier::HIGH > PriorityTier::NORMAL);
        assert!(PriorityTier::NORMAL > PriorityTier::LOW);
        assert_eq!(PriorityTier::default(), PriorityTier::LOW);
    }
}
