use crate::types::{Color, ParticipantId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f32,
    pub y: f32,
    pub section: String,
}

impl CursorPosition {
    pub fn new(x: f32, y: f32, section: impl Into<String>) -> Self {
        Self {
            x,
            y,
            section: section.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    is_host: bool,
    /// Empty string means the participant isn't looking at any section.
    pub current_section: String,
    pub cursor: Option<CursorPosition>,
    pub color: Color,
}

impl Participant {
    pub fn new(id: ParticipantId, name: String, is_host: bool, color: Color) -> Self {
        Self {
            id,
            name,
            is_host,
            current_section: String::new(),
            cursor: None,
            color,
        }
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_in_section(&self, section: &str) -> bool {
        self.current_section == section
    }
}
