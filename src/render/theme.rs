use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::render::page::Color;

pub const INCH: f32 = 72.0;

/// Fallback key shared by every lookup table below.
pub const UNKNOWN: &str = "Unknown";

pub const ISSUE_TYPES: [&str; 7] = [
    "Operational Task",
    "Task",
    "Story",
    "Epic",
    "Improvement",
    "Bug",
    UNKNOWN,
];

pub const ISSUE_PRIORITIES: [&str; 6] = ["Blocker", "Critical", "Major", "Minor", "Trivial", UNKNOWN];

pub fn type_icon(issue_type: &str) -> &'static str {
    match issue_type {
        "Operational Task" => "cards-heart.png",
        "Bug" => "tools-report-bug.png",
        _ => "agt_utilities.png",
    }
}

pub fn priority_icon(priority: &str) -> &'static str {
    match priority {
        "Blocker" => "software-update-urgent-2.png",
        "Critical" => "emblem-important-3.png",
        "Major" => "emblem-special.png",
        "Minor" | "Trivial" => "emblem-generic.png",
        _ => "face-uncertain.png",
    }
}

pub fn priority_color(priority: &str) -> &'static str {
    match priority {
        "Blocker" | "Critical" => "#F56C6C",
        "Major" => "#EEEEEE",
        "Minor" | "Trivial" => "#CEE8F0",
        _ => "#FFFFFF",
    }
}

/// Look-and-feel of an issue card: icons and accent colors keyed by display
/// name, plus page geometry.
#[derive(Debug, Clone)]
pub struct CardTheme {
    pub type_icons: BTreeMap<String, String>,
    pub priority_icons: BTreeMap<String, String>,
    pub priority_colors: BTreeMap<String, String>,
    /// Directory holding the icon files. Without one, cards get outlined
    /// placeholders where the icons would go.
    pub icon_dir: Option<PathBuf>,
    pub border: bool,
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
}

impl Default for CardTheme {
    fn default() -> Self {
        let table = |names: &[&str], f: fn(&str) -> &'static str| {
            names
                .iter()
                .map(|name| (name.to_string(), f(name).to_string()))
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            type_icons: table(&ISSUE_TYPES, type_icon),
            priority_icons: table(&ISSUE_PRIORITIES, priority_icon),
            priority_colors: table(&ISSUE_PRIORITIES, priority_color),
            icon_dir: None,
            border: true,
            page_width: 5.0 * INCH,
            page_height: 3.0 * INCH,
            margin: 0.15 * INCH,
        }
    }
}

impl CardTheme {
    pub fn with_icon_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.icon_dir = dir;
        self
    }

    pub fn with_border(mut self, border: bool) -> Self {
        self.border = border;
        self
    }

    fn lookup<'a>(table: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
        table.get(name).or_else(|| table.get(UNKNOWN)).map(String::as_str)
    }

    fn icon_path(&self, file: Option<&str>) -> Option<PathBuf> {
        Some(self.icon_dir.as_ref()?.join(file?))
    }

    pub fn type_icon_path(&self, type_name: &str) -> Option<PathBuf> {
        self.icon_path(Self::lookup(&self.type_icons, type_name))
    }

    pub fn priority_icon_path(&self, priority_name: &str) -> Option<PathBuf> {
        self.icon_path(Self::lookup(&self.priority_icons, priority_name))
    }

    /// Header background for a priority, falling back to the Unknown entry
    /// and then to white.
    pub fn accent_color(&self, priority_name: &str) -> Color {
        Self::lookup(&self.priority_colors, priority_name)
            .and_then(Color::from_hex)
            .unwrap_or(Color::WHITE)
    }
}
