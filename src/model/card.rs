use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};

use crate::cache::lookups::LookupTables;
use crate::model::issue::IssueSnapshot;
use crate::model::user::UserProfile;
use crate::render::page::Color;
use crate::render::theme::{CardTheme, UNKNOWN};

/// Everything needed to draw one card, with ids already resolved to names.
/// Built fresh for every render and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CardModel {
    pub key: String,
    pub summary: String,
    pub detail: String,
    pub type_name: String,
    pub priority_name: String,
    pub reporter_name: String,
    pub created: DateTime<Utc>,
    pub type_icon: Option<PathBuf>,
    pub priority_icon: Option<PathBuf>,
    pub accent: Color,
    pub border: bool,
}

impl CardModel {
    pub fn build(
        snapshot: &IssueSnapshot,
        reporter: &UserProfile,
        lookups: &LookupTables,
        theme: &CardTheme,
    ) -> Self {
        let type_name = snapshot
            .issue_type
            .as_deref()
            .map_or(UNKNOWN, |id| lookups.type_name(id))
            .to_string();
        let priority_name = snapshot
            .priority
            .as_deref()
            .map_or(UNKNOWN, |id| lookups.priority_name(id))
            .to_string();

        Self {
            key: snapshot.key.clone(),
            summary: snapshot.summary.clone(),
            detail: snapshot.detail.clone().unwrap_or_default(),
            type_icon: theme.type_icon_path(&type_name),
            priority_icon: theme.priority_icon_path(&priority_name),
            accent: theme.accent_color(&priority_name),
            type_name,
            priority_name,
            reporter_name: reporter.full_name.clone(),
            created: snapshot.created,
            border: theme.border,
        }
    }

    /// "Opened: 01/15 @ 10:30 AM", in local time.
    pub fn opened_label(&self) -> String {
        format!(
            "Opened: {}",
            self.created.with_timezone(&Local).format("%m/%d @ %I:%M %p")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::LookupEntry;
    use chrono::TimeZone;

    fn entry(id: &str, name: &str) -> LookupEntry {
        LookupEntry {
            id: id.into(),
            display_name: name.into(),
        }
    }

    fn snapshot() -> IssueSnapshot {
        IssueSnapshot {
            key: "CI-1".into(),
            summary: "Fix the printer".into(),
            detail: None,
            issue_type: Some("10001".into()),
            priority: Some("2".into()),
            reporter: "acc-1".into(),
            created: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
        }
    }

    fn bob() -> UserProfile {
        UserProfile {
            id: "acc-1".into(),
            full_name: "Bob Dobbalina".into(),
        }
    }

    #[test]
    fn ids_resolve_to_display_names() {
        let lookups = LookupTables::new(vec![entry("10001", "Bug")], vec![entry("2", "Critical")]);
        let theme = CardTheme::default().with_icon_dir(Some("/icons".into()));

        let card = CardModel::build(&snapshot(), &bob(), &lookups, &theme);

        assert_eq!(card.type_name, "Bug");
        assert_eq!(card.priority_name, "Critical");
        assert_eq!(card.reporter_name, "Bob Dobbalina");
        assert_eq!(card.detail, "");
        assert_eq!(card.accent, theme.accent_color("Critical"));
        assert_eq!(
            card.type_icon,
            Some(PathBuf::from("/icons/tools-report-bug.png"))
        );
    }

    #[test]
    fn missing_type_and_priority_are_unknown() {
        let mut snap = snapshot();
        snap.issue_type = None;
        snap.priority = None;
        let card = CardModel::build(
            &snap,
            &bob(),
            &LookupTables::new(vec![], vec![]),
            &CardTheme::default(),
        );

        assert_eq!(card.type_name, UNKNOWN);
        assert_eq!(card.priority_name, UNKNOWN);
        assert_eq!(card.accent, Color::WHITE);
        assert_eq!(card.priority_icon, None);
    }

    #[test]
    fn opened_label_format() {
        let card = CardModel::build(
            &snapshot(),
            &bob(),
            &LookupTables::new(vec![], vec![]),
            &CardTheme::default(),
        );
        let label = card.opened_label();
        assert!(label.starts_with("Opened: "));
        assert!(label.contains(" @ "));
        assert!(label.ends_with("AM") || label.ends_with("PM"));
    }
}
