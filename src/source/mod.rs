pub mod jira;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::model::issue::RawIssue;
use crate::model::user::{LookupEntry, UserProfile};

/// Token handed out by `IssueSource::authenticate`, passed back on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
}

/// Remote issue tracker the pipeline polls.
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn name(&self) -> &str;
    async fn authenticate(&self) -> Result<Session>;
    async fn fetch_issues(&self, session: &Session, filter_id: &str) -> Result<Vec<RawIssue>>;
    async fn fetch_user(&self, session: &Session, user_id: &str) -> Result<UserProfile>;
    async fn fetch_issue_types(&self, session: &Session) -> Result<Vec<LookupEntry>>;
    async fn fetch_priorities(&self, session: &Session) -> Result<Vec<LookupEntry>>;
}

#[cfg(test)]
pub mod tests;

pub fn create_source(config: &AppConfig) -> Option<Box<dyn IssueSource>> {
    config.jira.as_ref().map(|cfg| {
        Box::new(jira::JiraSource::new(
            cfg.domain.clone(),
            cfg.email.clone(),
            cfg.api_token.clone(),
        )) as Box<dyn IssueSource>
    })
}
