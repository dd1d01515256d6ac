//! The fixed category (type) vocabulary, its colours and matchup tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One tag of the fixed 18-member type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Normal,
    Fighting,
    Flying,
    Poison,
    Ground,
    Rock,
    Bug,
    Ghost,
    Steel,
    Fire,
    Water,
    Grass,
    Electric,
    Psychic,
    Ice,
    Dragon,
    Dark,
    Fairy,
}

/// Error returned when a string does not name a known category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 18] = [
        Self::Normal,
        Self::Fighting,
        Self::Flying,
        Self::Poison,
        Self::Ground,
        Self::Rock,
        Self::Bug,
        Self::Ghost,
        Self::Steel,
        Self::Fire,
        Self::Water,
        Self::Grass,
        Self::Electric,
        Self::Psychic,
        Self::Ice,
        Self::Dragon,
        Self::Dark,
        Self::Fairy,
    ];

    /// Lower-case provider name, e.g. `"fire"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fighting => "fighting",
            Self::Flying => "flying",
            Self::Poison => "poison",
            Self::Ground => "ground",
            Self::Rock => "rock",
            Self::Bug => "bug",
            Self::Ghost => "ghost",
            Self::Steel => "steel",
            Self::Fire => "fire",
            Self::Water => "water",
            Self::Grass => "grass",
            Self::Electric => "electric",
            Self::Psychic => "psychic",
            Self::Ice => "ice",
            Self::Dragon => "dragon",
            Self::Dark => "dark",
            Self::Fairy => "fairy",
        }
    }

    /// Capitalized label for chips and tooltips, e.g. `"Fire"`.
    pub fn label(self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Display colour as `(r, g, b)`.
    pub fn color(self) -> (u8, u8, u8) {
        match self {
            Self::Normal => (0xA8, 0xA7, 0x7A),
            Self::Fire => (0xEE, 0x81, 0x30),
            Self::Water => (0x63, 0x90, 0xF0),
            Self::Electric => (0xF7, 0xD0, 0x2C),
            Self::Grass => (0x7A, 0xC7, 0x4C),
            Self::Ice => (0x96, 0xD9, 0xD6),
            Self::Fighting => (0xC2, 0x2E, 0x28),
            Self::Poison => (0xA3, 0x3E, 0xA1),
            Self::Ground => (0xE2, 0xBF, 0x65),
            Self::Flying => (0xA9, 0x8F, 0xF3),
            Self::Psychic => (0xF9, 0x55, 0x87),
            Self::Bug => (0xA6, 0xB9, 0x1A),
            Self::Rock => (0xB6, 0xA1, 0x36),
            Self::Ghost => (0x73, 0x57, 0x97),
            Self::Dragon => (0x6F, 0x35, 0xFC),
            Self::Dark => (0x70, 0x57, 0x46),
            Self::Steel => (0xB7, 0xB7, 0xCE),
            Self::Fairy => (0xD6, 0x85, 0xAD),
        }
    }

    /// Categories that deal double damage to this one.
    pub fn weak_to(self) -> &'static [Category] {
        use Category::*;
        match self {
            Normal => &[Fighting],
            Fighting => &[Flying, Psychic, Fairy],
            Flying => &[Rock, Ice, Electric],
            Poison => &[Ground, Psychic],
            Ground => &[Water, Grass, Ice],
            Rock => &[Fighting, Ground, Steel, Water, Grass],
            Bug => &[Flying, Fire, Rock],
            Ghost => &[Ghost, Dark],
            Steel => &[Fighting, Fire, Ground],
            Fire => &[Rock, Ground, Water],
            Water => &[Electric, Grass],
            Grass => &[Flying, Poison, Bug, Ice, Fire],
            Electric => &[Ground],
            Psychic => &[Bug, Ghost, Dark],
            Ice => &[Steel, Fire, Fighting, Rock],
            Dragon => &[Ice, Dragon, Fairy],
            Dark => &[Fighting, Bug, Fairy],
            Fairy => &[Poison, Steel],
        }
    }

    /// Categories this one deals double damage to.
    pub fn strong_against(self) -> &'static [Category] {
        use Category::*;
        match self {
            Normal => &[],
            Fighting => &[Normal, Rock, Steel, Ice, Dark],
            Flying => &[Fighting, Bug, Grass],
            Poison => &[Grass, Fairy],
            Ground => &[Poison, Rock, Steel, Fire, Electric],
            Rock => &[Flying, Bug, Fire, Ice],
            Bug => &[Grass, Psychic, Dark],
            Ghost => &[Ghost, Psychic],
            Steel => &[Rock, Ice, Fairy],
            Fire => &[Bug, Steel, Grass, Ice],
            Water => &[Ground, Rock, Fire],
            Grass => &[Ground, Rock, Water],
            Electric => &[Flying, Water],
            Psychic => &[Fighting, Poison],
            Ice => &[Flying, Ground, Grass, Dragon],
            Dragon => &[Dragon],
            Dark => &[Ghost, Psychic],
            Fairy => &[Fighting, Dragon, Dark],
        }
    }

    /// Categories whose attacks this one resists or is immune to.
    pub fn resists(self) -> &'static [Category] {
        use Category::*;
        match self {
            Normal => &[Ghost],
            Fighting => &[Bug, Rock, Dark],
            Flying => &[Fighting, Bug, Grass, Ground],
            Poison => &[Fighting, Poison, Grass, Fairy],
            Ground => &[Poison, Rock, Electric],
            Rock => &[Normal, Flying, Poison, Fire],
            Bug => &[Fighting, Ground, Grass],
            Ghost => &[Poison, Bug, Normal, Fighting],
            Steel => &[
                Normal, Flying, Poison, Rock, Bug, Steel, Grass, Psychic, Ice, Dragon, Fairy,
            ],
            Fire => &[Bug, Steel, Fire, Grass, Ice],
            Water => &[Steel, Fire, Water, Ice],
            Grass => &[Ground, Water, Grass, Electric],
            Electric => &[Flying, Steel, Electric],
            Psychic => &[Fighting, Psychic],
            Ice => &[Ice],
            Dragon => &[Fire, Water, Grass, Electric],
            Dark => &[Ghost, Dark, Psychic],
            Fairy => &[Fighting, Bug, Dark, Dragon],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Case-insensitive: `"Fire"`, `"FIRE"` and `"fire"` all parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Weaknesses of a category combination: every weakness of every member,
/// minus anything some member resists, deduplicated in first-seen order.
pub fn weaknesses(categories: &[Category]) -> Vec<Category> {
    let resisted: Vec<Category> = categories
        .iter()
        .flat_map(|c| c.resists().iter().copied())
        .collect();
    dedup_in_order(
        categories
            .iter()
            .flat_map(|c| c.weak_to().iter().copied())
            .filter(|w| !resisted.contains(w)),
    )
}

/// Strengths of a category combination, deduplicated in first-seen order.
pub fn strengths(categories: &[Category]) -> Vec<Category> {
    dedup_in_order(
        categories
            .iter()
            .flat_map(|c| c.strong_against().iter().copied()),
    )
}

fn dedup_in_order(iter: impl Iterator<Item = Category>) -> Vec<Category> {
    let mut out = Vec::new();
    for c in iter {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Theme colour for a category combination.
///
/// One category uses its own colour; two use the rounded channel-wise average;
/// none falls back to white.
pub fn theme_color(categories: &[Category]) -> (u8, u8, u8) {
    match categories {
        [] => (0xFF, 0xFF, 0xFF),
        [only] => only.color(),
        [first, second, ..] => mix_colors(first.color(), second.color()),
    }
}

/// Rounded average of two colours, channel by channel.
pub fn mix_colors(a: (u8, u8, u8), b: (u8, u8, u8)) -> (u8, u8, u8) {
    let avg = |x: u8, y: u8| ((u16::from(x) + u16::from(y) + 1) / 2) as u8;
    (avg(a.0, b.0), avg(a.1, b.1), avg(a.2, b.2))
}

/// `#rrggbb` hex form of a colour.
pub fn to_hex((r, g, b): (u8, u8, u8)) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}
