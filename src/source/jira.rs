use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{IssueSource, Session};
use crate::model::issue::RawIssue;
use crate::model::user::{LookupEntry, UserProfile};
use crate::util::adf::extract_text_from_adf;

const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ISSUE_FIELDS: &str = "summary,description,issuetype,priority,reporter,created";

pub struct JiraSource {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl JiraSource {
    pub fn new(domain: String, email: String, api_token: String) -> Self {
        let creds = format!("{email}:{api_token}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        let base_url = if domain.contains("://") {
            domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{domain}.atlassian.net")
        };
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url,
            auth_header: format!("Basic {encoded}"),
            client,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, session: &Session, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", &session.token)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Jira request to {path} failed"))?
            .error_for_status()
            .with_context(|| format!("Jira rejected request to {path}"))?;

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Jira response from {path}"))
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: Option<String>,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Deserialize, Default)]
struct IssueFields {
    summary: Option<String>,
    description: Option<serde_json::Value>,
    issuetype: Option<NamedField>,
    priority: Option<NamedField>,
    reporter: Option<UserField>,
    created: Option<String>,
}

#[derive(Deserialize)]
struct NamedField {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct UserField {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

impl NamedField {
    fn into_entry(self) -> Option<LookupEntry> {
        let id = self.id?;
        let display_name = self.name.unwrap_or_else(|| id.clone());
        Some(LookupEntry { id, display_name })
    }
}

impl From<JiraIssue> for RawIssue {
    fn from(issue: JiraIssue) -> Self {
        let fields = issue.fields;
        RawIssue {
            key: issue.key,
            summary: fields.summary,
            detail: fields.description.as_ref().and_then(extract_text_from_adf),
            issue_type: fields.issuetype.and_then(|t| t.id),
            priority: fields.priority.and_then(|p| p.id),
            reporter: fields.reporter.and_then(|r| r.account_id),
            created: fields.created,
        }
    }
}

#[async_trait]
impl IssueSource for JiraSource {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn authenticate(&self) -> Result<Session> {
        let session = Session {
            token: self.auth_header.clone(),
        };
        let _: serde_json::Value = self
            .get_json(&session, "/rest/api/3/myself")
            .await
            .context("Jira login failed")?;
        Ok(session)
    }

    async fn fetch_issues(&self, session: &Session, filter_id: &str) -> Result<Vec<RawIssue>> {
        let jql = format!("filter={filter_id} ORDER BY key ASC");
        let mut issues = Vec::new();
        let mut start_at = 0;

        loop {
            let path = format!(
                "/rest/api/3/search?jql={}&startAt={start_at}&maxResults={PAGE_SIZE}&fields={ISSUE_FIELDS}",
                urlencoding::encode(&jql)
            );
            let page: SearchResponse = self.get_json(session, &path).await?;
            let count = page.issues.len();
            issues.extend(page.issues.into_iter().map(RawIssue::from));
            start_at += count;
            if count == 0 || start_at >= page.total {
                break;
            }
        }

        Ok(issues)
    }

    async fn fetch_user(&self, session: &Session, user_id: &str) -> Result<UserProfile> {
        let path = format!("/rest/api/3/user?accountId={}", urlencoding::encode(user_id));
        let user: UserField = self.get_json(session, &path).await?;
        Ok(UserProfile {
            id: user.account_id.unwrap_or_else(|| user_id.to_string()),
            full_name: user.display_name.unwrap_or_else(|| user_id.to_string()),
        })
    }

    async fn fetch_issue_types(&self, session: &Session) -> Result<Vec<LookupEntry>> {
        let types: Vec<NamedField> = self.get_json(session, "/rest/api/3/issuetype").await?;
        Ok(types.into_iter().filter_map(NamedField::into_entry).collect())
    }

    async fn fetch_priorities(&self, session: &Session) -> Result<Vec<LookupEntry>> {
        let priorities: Vec<NamedField> = self.get_json(session, "/rest/api/3/priority").await?;
        Ok(priorities
            .into_iter()
            .filter_map(NamedField::into_entry)
            .collect())
    }
}
