//! Cyclic assignment pattern: which members hold the property in which week of the cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RotationError};

/// One member assigned to one position of the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAssignment {
    pub week_index: u32,
    pub member_id: String,
}

impl CycleAssignment {
    pub fn new(week_index: u32, member_id: impl Into<String>) -> Self {
        Self {
            week_index,
            member_id: member_id.into(),
        }
    }
}

/// Mapping from `week_index mod length` to the members sharing that slot.
///
/// Slots nobody is assigned to are simply absent and yield no members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePattern {
    length: u32,
    slots: BTreeMap<u32, Vec<String>>,
}

impl CyclePattern {
    /// Build a pattern of `length` slots from a flat assignment list.
    ///
    /// Week indices are reduced modulo `length`. A member listed twice for the
    /// same slot is kept once, at its first position.
    ///
    /// # Errors
    /// Returns `RotationError::InvalidCycleLength` when `length` is zero.
    pub fn new(length: u32, assignments: &[CycleAssignment]) -> Result<Self> {
        if length == 0 {
            return Err(RotationError::InvalidCycleLength(0));
        }

        let mut slots: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for assignment in assignments {
            let slot = slots.entry(assignment.week_index % length).or_default();
            if !slot.contains(&assignment.member_id) {
                slot.push(assignment.member_id.clone());
            }
        }

        Ok(Self { length, slots })
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Members assigned to the window with the given running week counter.
    pub fn members_for(&self, week_counter: u32) -> &[String] {
        self.slots
            .get(&(week_counter % self.length))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Largest number of members sharing one slot.
    pub fn max_occupancy(&self) -> usize {
        self.slots.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Reject any slot that assigns more members than the property can hold.
    pub fn check_capacity(&self, capacity: u32) -> Result<()> {
        for (week_index, members) in &self.slots {
            if members.len() > capacity as usize {
                return Err(RotationError::CapacityExceeded {
                    week_index: *week_index,
                    members: members.len(),
                    capacity,
                });
            }
        }
        Ok(())
    }
}
