use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{IssueSource, Session};
use crate::model::issue::RawIssue;
use crate::model::user::{LookupEntry, UserProfile};

/// Scripted issue source that records what the pipeline asked of it.
#[derive(Clone, Default)]
pub struct MockSource {
    pub issues: Arc<Mutex<Vec<RawIssue>>>,
    pub users: Arc<Mutex<HashMap<String, String>>>,
    pub user_fetches: Arc<Mutex<Vec<String>>>,
    pub lookup_loads: Arc<AtomicUsize>,
    pub fail_auth: Arc<AtomicBool>,
    pub fail_fetch: Arc<AtomicBool>,
    pub fail_users: Arc<AtomicBool>,
    pub fail_lookups: Arc<AtomicBool>,
    pub user_delay: Option<Duration>,
}

impl MockSource {
    pub fn new() -> Self {
        let source = Self::default();
        source
            .users
            .lock()
            .unwrap()
            .insert("bob".into(), "Bob Dobbalina".into());
        source
    }

    pub fn with_user_delay(mut self, delay: Duration) -> Self {
        self.user_delay = Some(delay);
        self
    }

    pub fn set_issues(&self, issues: Vec<RawIssue>) {
        *self.issues.lock().unwrap() = issues;
    }

    pub fn user_fetch_count(&self) -> usize {
        self.user_fetches.lock().unwrap().len()
    }
}

pub fn raw_issue(key: &str, priority: &str) -> RawIssue {
    RawIssue {
        key: Some(key.into()),
        summary: Some(format!("Summary for {key}")),
        detail: Some("Lorem ipsum dolor sit amet".into()),
        issue_type: Some("1".into()),
        priority: Some(priority.into()),
        reporter: Some("bob".into()),
        created: Some("2024-01-15T10:30:00.000+0000".into()),
    }
}

#[async_trait]
impl IssueSource for MockSource {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn authenticate(&self) -> Result<Session> {
        if self.fail_auth.load(Ordering::SeqCst) {
            anyhow::bail!("Mock login refused");
        }
        Ok(Session {
            token: "mock-token".into(),
        })
    }

    async fn fetch_issues(&self, _session: &Session, _filter_id: &str) -> Result<Vec<RawIssue>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            anyhow::bail!("Mock fetch failure");
        }
        Ok(self.issues.lock().unwrap().clone())
    }

    async fn fetch_user(&self, _session: &Session, user_id: &str) -> Result<UserProfile> {
        self.user_fetches.lock().unwrap().push(user_id.to_string());
        if let Some(delay) = self.user_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_users.load(Ordering::SeqCst) {
            anyhow::bail!("Mock user lookup failure");
        }
        let full_name = self
            .users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_uppercase());
        Ok(UserProfile {
            id: user_id.to_string(),
            full_name,
        })
    }

    async fn fetch_issue_types(&self, _session: &Session) -> Result<Vec<LookupEntry>> {
        self.lookup_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            anyhow::bail!("Mock issue type lookup failure");
        }
        Ok(vec![
            LookupEntry { id: "1".into(), display_name: "Task".into() },
            LookupEntry { id: "2".into(), display_name: "Bug".into() },
        ])
    }

    async fn fetch_priorities(&self, _session: &Session) -> Result<Vec<LookupEntry>> {
        Ok(vec![
            LookupEntry { id: "Critical".into(), display_name: "Critical".into() },
            LookupEntry { id: "Minor".into(), display_name: "Minor".into() },
        ])
    }
}

#[tokio::test]
async fn mock_source_records_user_fetches() {
    let source = MockSource::new();
    let session = source.authenticate().await.unwrap();

    let user = source.fetch_user(&session, "bob").await.unwrap();

    assert_eq!(user.full_name, "Bob Dobbalina");
    assert_eq!(source.user_fetch_count(), 1);
}

#[tokio::test]
async fn mock_source_failures_propagate() {
    let source = MockSource::new();
    source.fail_auth.store(true, Ordering::SeqCst);
    let err = source.authenticate().await.unwrap_err();
    assert!(err.to_string().contains("refused"));
}

#[tokio::test]
async fn sources_are_usable_as_trait_objects() {
    let mock = MockSource::new();
    mock.set_issues(vec![raw_issue("CI-1", "Minor")]);
    let source: Box<dyn IssueSource> = Box::new(mock);

    let session = source.authenticate().await.unwrap();
    let issues = source.fetch_issues(&session, "12328").await.unwrap();

    assert_eq!(source.name(), "Mock");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].key.as_deref(), Some("CI-1"));
}
