//! Client for the remote task API
//!
//! Two read-only calls: list the sections of a project, and page through the
//! tasks of a section following the server's `next_page.uri` links.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::RemoteApiError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: &str = "100";

/// Source of section and task data
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Identifier of the first section whose name equals `section_name`
    /// exactly, or `None` when no section matches
    async fn resolve_section_id(
        &self,
        project_id: &str,
        section_name: &str,
    ) -> Result<Option<String>, RemoteApiError>;

    /// Number of tasks in the section not explicitly marked completed,
    /// across every page
    async fn count_incomplete(&self, section_id: &str) -> Result<u64, RemoteApiError>;
}

#[derive(Debug, Deserialize)]
struct SectionList {
    #[serde(default)]
    data: Vec<SectionEntry>,
}

#[derive(Debug, Deserialize)]
struct SectionEntry {
    #[serde(default)]
    gid: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TaskPage {
    #[serde(default)]
    data: Vec<TaskEntry>,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct TaskEntry {
    #[serde(default)]
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    #[serde(default)]
    uri: Option<String>,
}

impl TaskPage {
    fn incomplete(&self) -> u64 {
        // Only an explicit `true` marks a task done
        self.data
            .iter()
            .filter(|task| task.completed != Some(true))
            .count() as u64
    }

    fn next_uri(&self) -> Option<&str> {
        self.next_page.as_ref()?.uri.as_deref()
    }
}

/// [`TaskSource`] backed by the Asana REST API
pub struct AsanaClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl AsanaClient {
    pub fn new(token: impl Into<String>, base_url: &str) -> Result<Self, RemoteApiError> {
        let base_url = parse_url(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteApiError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    /// `base_url` plus percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteApiError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RemoteApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TaskSource for AsanaClient {
    async fn resolve_section_id(
        &self,
        project_id: &str,
        section_name: &str,
    ) -> Result<Option<String>, RemoteApiError> {
        let url = self.endpoint(&["projects", project_id, "sections"]);
        let sections: SectionList = self.get_json(url).await?;

        let found = sections
            .data
            .into_iter()
            .find(|section| section.name == section_name)
            .map(|section| section.gid);

        debug!("Section '{}' resolved to {:?}", section_name, found);
        Ok(found)
    }

    async fn count_incomplete(&self, section_id: &str) -> Result<u64, RemoteApiError> {
        let mut url = self.endpoint(&["sections", section_id, "tasks"]);
        url.query_pairs_mut()
            .append_pair("opt_fields", "completed")
            .append_pair("limit", PAGE_SIZE);

        let mut count = 0u64;
        let mut pages = 0usize;
        loop {
            let page: TaskPage = self.get_json(url).await?;
            pages += 1;
            count += page.incomplete();

            match page.next_uri() {
                Some(next) => url = parse_url(next)?,
                None => break,
            }
        }

        debug!(
            "Counted {} incomplete task(s) in section {} over {} page(s)",
            count, section_id, pages
        );
        Ok(count)
    }
}

fn parse_url(raw: &str) -> Result<Url, RemoteApiError> {
    Url::parse(raw).map_err(|e| RemoteApiError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    const TOKEN: &str = "test-token";

    /// In-process stand-in for the remote API
    struct FakeApi {
        base: String,
        sections: serde_json::Value,
        /// Task pages per section, served in order via `?page=N`
        pages: Vec<Vec<serde_json::Value>>,
        /// Page index that answers 500 instead of data
        fail_page: Option<usize>,
        requests: Mutex<Vec<String>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {}", TOKEN))
    }

    async fn sections(
        State(api): State<Arc<FakeApi>>,
        Path(project): Path<String>,
        headers: HeaderMap,
    ) -> Response {
        api.requests.lock().unwrap().push(format!("sections:{}", project));
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, "bad token").into_response();
        }
        if project == "broken" {
            return (StatusCode::FORBIDDEN, "{\"errors\":[{\"message\":\"forbidden\"}]}")
                .into_response();
        }
        Json(api.sections.clone()).into_response()
    }

    async fn tasks(
        State(api): State<Arc<FakeApi>>,
        Path(section): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Response {
        let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
        api.requests
            .lock()
            .unwrap()
            .push(format!("tasks:{}:{}", section, page));

        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, "bad token").into_response();
        }
        if query.get("opt_fields").map(String::as_str) != Some("completed")
            || query.get("limit").map(String::as_str) != Some("100")
        {
            return (StatusCode::BAD_REQUEST, "missing query").into_response();
        }
        if api.fail_page == Some(page) {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
        }

        let next_page = if page + 1 < api.pages.len() {
            json!({
                "offset": format!("tok{}", page + 1),
                "uri": format!(
                    "{}/sections/{}/tasks?opt_fields=completed&limit=100&page={}",
                    api.base,
                    section,
                    page + 1
                ),
            })
        } else {
            serde_json::Value::Null
        };

        Json(json!({ "data": api.pages[page], "next_page": next_page })).into_response()
    }

    async fn serve(
        sections_body: serde_json::Value,
        pages: Vec<Vec<serde_json::Value>>,
        fail_page: Option<usize>,
    ) -> Arc<FakeApi> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let api = Arc::new(FakeApi {
            base: format!("http://{}", addr),
            sections: sections_body,
            pages,
            fail_page,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/projects/{project}/sections", get(sections))
            .route("/sections/{section}/tasks", get(tasks))
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        api
    }

    fn client(api: &FakeApi) -> AsanaClient {
        AsanaClient::new(TOKEN, &api.base).unwrap()
    }

    fn requests(api: &FakeApi) -> Vec<String> {
        api.requests.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_resolve_section_exact_match() {
        let api = serve(
            json!({ "data": [
                { "gid": "1", "name": "backlog" },
                { "gid": "2", "name": "Backlog" },
                { "gid": "3", "name": "Backlog" },
            ]}),
            vec![],
            None,
        )
        .await;

        let id = client(&api).resolve_section_id("p1", "Backlog").await.unwrap();
        assert_eq!(id.as_deref(), Some("2"));
        assert_eq!(requests(&api), vec!["sections:p1"]);
    }

    #[tokio::test]
    async fn test_resolve_section_not_found() {
        let api = serve(
            json!({ "data": [{ "gid": "1", "name": "Done" }] }),
            vec![],
            None,
        )
        .await;

        let id = client(&api).resolve_section_id("p1", "Doing").await.unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn test_resolve_section_error_status() {
        let api = serve(json!({ "data": [] }), vec![], None).await;

        let err = client(&api)
            .resolve_section_id("broken", "Doing")
            .await
            .unwrap_err();
        match err {
            RemoteApiError::Status { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("forbidden"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected() {
        let api = serve(json!({ "data": [] }), vec![], None).await;
        let client = AsanaClient::new("wrong", &api.base).unwrap();

        let err = client.resolve_section_id("p1", "Doing").await.unwrap_err();
        assert!(matches!(err, RemoteApiError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_count_follows_every_page() {
        let api = serve(
            json!({ "data": [] }),
            vec![
                vec![
                    json!({ "gid": "a", "completed": false }),
                    json!({ "gid": "b", "completed": true }),
                    json!({ "gid": "c" }),
                ],
                vec![
                    json!({ "gid": "d", "completed": false }),
                    json!({ "gid": "e", "completed": null }),
                ],
                vec![json!({ "gid": "f", "completed": true })],
            ],
            None,
        )
        .await;

        let count = client(&api).count_incomplete("s1").await.unwrap();
        assert_eq!(count, 4);
        assert_eq!(
            requests(&api),
            vec!["tasks:s1:0", "tasks:s1:1", "tasks:s1:2"]
        );
    }

    #[tokio::test]
    async fn test_count_single_empty_page() {
        let api = serve(json!({ "data": [] }), vec![vec![]], None).await;

        let count = client(&api).count_incomplete("s1").await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(requests(&api), vec!["tasks:s1:0"]);
    }

    #[tokio::test]
    async fn test_count_fails_on_mid_pagination_error() {
        let api = serve(
            json!({ "data": [] }),
            vec![
                vec![json!({ "completed": false })],
                vec![json!({ "completed": false })],
                vec![json!({ "completed": false })],
            ],
            Some(1),
        )
        .await;

        let err = client(&api).count_incomplete("s1").await.unwrap_err();
        assert!(matches!(err, RemoteApiError::Status { status: 500, .. }));
        assert_eq!(requests(&api), vec!["tasks:s1:0", "tasks:s1:1"]);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = AsanaClient::new(TOKEN, &format!("http://{}", addr)).unwrap();
        let err = client.count_incomplete("s1").await.unwrap_err();
        assert!(matches!(err, RemoteApiError::Transport(_)));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = AsanaClient::new(TOKEN, "https://app.asana.com/api/1.0/").unwrap();
        let url = client.endpoint(&["projects", "12/34", "sections"]);
        assert_eq!(
            url.as_str(),
            "https://app.asana.com/api/1.0/projects/12%2F34/sections"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            AsanaClient::new(TOKEN, "not a url"),
            Err(RemoteApiError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_page_parsing() {
        let page: TaskPage = serde_json::from_str(
            r#"{"data":[{"completed":true},{"completed":false},{}],"next_page":{"offset":"x","uri":"https://example.com/next"}}"#,
        )
        .unwrap();
        assert_eq!(page.incomplete(), 2);
        assert_eq!(page.next_uri(), Some("https://example.com/next"));

        let last: TaskPage = serde_json::from_str(r#"{"data":[],"next_page":null}"#).unwrap();
        assert_eq!(last.next_uri(), None);

        let no_uri: TaskPage = serde_json::from_str(r#"{"data":[],"next_page":{}}"#).unwrap();
        assert_eq!(no_uri.next_uri(), None);
    }
}
