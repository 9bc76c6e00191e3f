//! Issue archival operations.
//!
//! `preserve` and `restore` answer with a fully computed report. The JQL
//! based variant and the export start a server-side task instead, and only
//! hand back the task's identifier.

use crate::error::{Error, Result};
use crate::response::ResponseEnvelope;
use crate::rest::{Client, RequestContext};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Report returned by synchronous archive and restore calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueArchivalSyncResponse {
    #[serde(default)]
    pub errors: Option<IssueArchivalSyncErrors>,
    #[serde(default)]
    pub number_of_issues_updated: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueArchivalSyncErrors {
    #[serde(default)]
    pub issue_is_subtask: Option<IssueArchivalError>,
    #[serde(default)]
    pub issues_in_archived_projects: Option<IssueArchivalError>,
    #[serde(default)]
    pub issues_in_unlicensed_projects: Option<IssueArchivalError>,
    #[serde(default)]
    pub issues_not_found: Option<IssueArchivalError>,
    #[serde(default)]
    pub user_does_not_have_permission: Option<IssueArchivalError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueArchivalError {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub issue_ids_or_keys: Vec<String>,
    #[serde(default)]
    pub message: String,
}

/// Filters for exporting archived issues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueArchivalExportPayload {
    pub archived_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_date_range: Option<DateRangeFilter>,
    pub issue_types: Vec<String>,
    pub projects: Vec<String>,
    pub reporters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_before: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueKeysPayload<'a> {
    issue_ids_or_keys: &'a [String],
}

#[derive(Serialize)]
struct JqlPayload<'a> {
    jql: &'a str,
}

/// Archival endpoints, borrowed from a [`Client`]
#[derive(Debug, Clone, Copy)]
pub struct IssueArchivalService<'a> {
    client: &'a Client,
    version: &'a str,
}

impl<'a> IssueArchivalService<'a> {
    pub fn new(client: &'a Client, version: &'a str) -> Self {
        IssueArchivalService { client, version }
    }

    /// Archive the given issues
    pub fn preserve(
        &self,
        ctx: &RequestContext,
        issue_ids_or_keys: &[String],
    ) -> Result<(IssueArchivalSyncResponse, ResponseEnvelope)> {
        self.sync_update(ctx, "issue/archive", issue_ids_or_keys)
    }

    /// Archive every issue matched by `jql`, returning the task id
    pub fn preserve_by_jql(
        &self,
        ctx: &RequestContext,
        jql: &str,
    ) -> Result<(String, ResponseEnvelope)> {
        if jql.is_empty() {
            return Err(Error::NoJql);
        }

        let endpoint = format!("rest/api/{}/issue/archive", self.version);
        let request =
            self.client
                .new_request(ctx, Method::POST, &endpoint, None, Some(&JqlPayload { jql }))?;
        self.start_task(request)
    }

    /// Bring archived issues back
    pub fn restore(
        &self,
        ctx: &RequestContext,
        issue_ids_or_keys: &[String],
    ) -> Result<(IssueArchivalSyncResponse, ResponseEnvelope)> {
        self.sync_update(ctx, "issue/unarchive", issue_ids_or_keys)
    }

    /// Export archived issues matching `payload`, returning the task id
    pub fn export(
        &self,
        ctx: &RequestContext,
        payload: &IssueArchivalExportPayload,
    ) -> Result<(String, ResponseEnvelope)> {
        let endpoint = format!("rest/api/{}/issues/archive/export", self.version);
        let request = self
            .client
            .new_request(ctx, Method::PUT, &endpoint, None, Some(payload))?;
        self.start_task(request)
    }

    fn sync_update(
        &self,
        ctx: &RequestContext,
        resource: &str,
        issue_ids_or_keys: &[String],
    ) -> Result<(IssueArchivalSyncResponse, ResponseEnvelope)> {
        if issue_ids_or_keys.is_empty() {
            return Err(Error::NoIssueKeys);
        }

        let endpoint = format!("rest/api/{}/{}", self.version, resource);
        let payload = IssueKeysPayload { issue_ids_or_keys };
        let request = self
            .client
            .new_request(ctx, Method::PUT, &endpoint, None, Some(&payload))?;
        self.client.call_into(request)
    }

    fn start_task(&self, request: reqwest::blocking::Request) -> Result<(String, ResponseEnvelope)> {
        let response = self.client.call(request)?;
        let task_id = response.task_id().unwrap_or_default();
        Ok((task_id, response))
    }
}
