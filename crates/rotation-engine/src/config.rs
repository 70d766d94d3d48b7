//! Property configuration and the member directory, read from TOML.
//!
//! ```toml
//! id = "lake-house"
//! max_slots = 2
//! default_turn_duration_weeks = 1
//!
//! [[members]]
//! id = "anna"
//! display_name = "Anna"
//! color = "#e07a5f"
//! initials = "AN"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RotationError};

/// Per-property settings the generator and the capacity check rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub id: String,
    /// Simultaneous occupants the property holds.
    #[serde(default = "default_max_slots")]
    pub max_slots: u32,
    /// Window length used when a request does not name one.
    #[serde(default = "default_turn_duration_weeks")]
    pub default_turn_duration_weeks: u32,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Display details of one member. Never consulted by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub initials: Option<String>,
}

fn default_max_slots() -> u32 {
    1
}

fn default_turn_duration_weeks() -> u32 {
    1
}

impl PropertyConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            max_slots: default_max_slots(),
            default_turn_duration_weeks: default_turn_duration_weeks(),
            members: Vec::new(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PropertyConfig = toml::from_str(content)
            .map_err(|e| RotationError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RotationError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(RotationError::Config("property id is empty".to_string()));
        }
        if self.max_slots == 0 {
            return Err(RotationError::Config(
                "max_slots must be at least 1".to_string(),
            ));
        }
        if self.default_turn_duration_weeks == 0 {
            return Err(RotationError::InvalidWindowWeeks(0));
        }
        Ok(())
    }

    pub fn directory(&self) -> MemberDirectory {
        MemberDirectory::new(self.members.iter().cloned())
    }
}

/// Lookup from member id to display details.
#[derive(Debug, Clone, Default)]
pub struct MemberDirectory {
    members: HashMap<String, Member>,
}

impl MemberDirectory {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn get(&self, member_id: &str) -> Option<&Member> {
        self.members.get(member_id)
    }

    /// Display name, falling back to the raw id for unknown members.
    pub fn display_name<'a>(&'a self, member_id: &'a str) -> &'a str {
        self.get(member_id)
            .map(|m| m.display_name.as_str())
            .unwrap_or(member_id)
    }

    /// Initials, derived from the display name when none are configured.
    pub fn initials(&self, member_id: &str) -> String {
        match self.get(member_id) {
            Some(Member {
                initials: Some(initials),
                ..
            }) => initials.clone(),
            _ => self
                .display_name(member_id)
                .split_whitespace()
                .filter_map(|word| word.chars().next())
                .flat_map(char::to_uppercase)
                .take(2)
                .collect(),
        }
    }
}
