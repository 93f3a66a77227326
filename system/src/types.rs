use serde::{Deserialize, Serialize};

pub type ConnectionId = u16;
pub type SessionId = String;
pub type ParticipantId = String;
pub type CommandId = u16;

/// Room-wide logical clock. Every accepted mutation gets the next value.
pub type Seq = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl std::default::Default for Color {
    fn default() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Cursor colors, handed out by rotation in join order.
pub const PALETTE: [Color; 8] = [
    Color::rgb(0xFF, 0x6B, 0x6B),
    Color::rgb(0x4E, 0xCD, 0xC4),
    Color::rgb(0x45, 0xB7, 0xD1),
    Color::rgb(0xFF, 0xA0, 0x7A),
    Color::rgb(0x98, 0xD8, 0xC8),
    Color::rgb(0xF7, 0xDC, 0x6F),
    Color::rgb(0xBB, 0x8F, 0xCE),
    Color::rgb(0x85, 0xC1, 0xE9),
];

pub fn palette_color(join_index: usize) -> Color {
    PALETTE[join_index % PALETTE.len()]
}
