use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::model::user::LookupEntry;
use crate::source::{IssueSource, Session};

/// Issue type and priority names, keyed by the ids issues carry.
/// Loaded once per session and read-only afterwards.
#[derive(Debug, Clone)]
pub struct LookupTables {
    types: HashMap<String, LookupEntry>,
    priorities: HashMap<String, LookupEntry>,
    pub loaded_at: DateTime<Utc>,
}

impl LookupTables {
    pub fn new(types: Vec<LookupEntry>, priorities: Vec<LookupEntry>) -> Self {
        Self {
            types: types.into_iter().map(|e| (e.id.clone(), e)).collect(),
            priorities: priorities.into_iter().map(|e| (e.id.clone(), e)).collect(),
            loaded_at: Utc::now(),
        }
    }

    pub async fn load(source: &dyn IssueSource, session: &Session) -> Result<Self> {
        let (types, priorities) = tokio::try_join!(
            async {
                source
                    .fetch_issue_types(session)
                    .await
                    .context("Failed to fetch issue types")
            },
            async {
                source
                    .fetch_priorities(session)
                    .await
                    .context("Failed to fetch priorities")
            },
        )?;
        Ok(Self::new(types, priorities))
    }

    /// Display name for a type id; unknown ids display as themselves.
    pub fn type_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.types.get(id).map_or(id, |e| e.display_name.as_str())
    }

    pub fn priority_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.priorities
            .get(id)
            .map_or(id, |e| e.display_name.as_str())
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn priority_count(&self) -> usize {
        self.priorities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::MockSource;
    use std::sync::atomic::Ordering;

    fn entry(id: &str, name: &str) -> LookupEntry {
        LookupEntry {
            id: id.into(),
            display_name: name.into(),
        }
    }

    #[test]
    fn names_resolve_by_id() {
        let tables = LookupTables::new(
            vec![entry("10001", "Bug")],
            vec![entry("2", "Critical")],
        );
        assert_eq!(tables.type_name("10001"), "Bug");
        assert_eq!(tables.priority_name("2"), "Critical");
    }

    #[test]
    fn unknown_ids_fall_back_to_the_id() {
        let tables = LookupTables::new(vec![], vec![]);
        assert_eq!(tables.type_name("Story"), "Story");
        assert_eq!(tables.priority_name("9"), "9");
    }

    #[tokio::test]
    async fn load_fetches_both_tables() {
        let source = MockSource::new();
        let session = source.authenticate().await.unwrap();

        let tables = LookupTables::load(&source, &session).await.unwrap();

        assert_eq!(tables.type_count(), 2);
        assert_eq!(tables.priority_count(), 2);
        assert_eq!(tables.type_name("2"), "Bug");
        assert_eq!(source.lookup_loads.load(Ordering::SeqCst), 1);
    }
}
