use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{TaskApi, TransportError};
use crate::models::{Settings, Task, TaskId};

/// [`TaskApi`] over the REST task service (`/tasks`, `/tasks/{id}`).
#[derive(Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct NewTask<'a> {
    text: &'a str,
    completed: bool,
}

#[derive(Serialize)]
struct CompletedPatch {
    completed: bool,
}

impl HttpTaskApi {
    pub fn new(settings: &Settings) -> Result<Self, TransportError> {
        // The request timeout lives here; the store itself never times out.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|err| TransportError::Transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            base_url: normalize_base_url(&settings.api_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: TaskId) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }
}

impl TaskApi for HttpTaskApi {
    async fn fetch_all(&self) -> Result<Vec<Task>, TransportError> {
        let url = self.tasks_url();
        log::debug!("http request method=GET url={url}");
        let response = self.client.get(&url).send().await.map_err(send_error)?;
        decode(check(response, None).await?).await
    }

    async fn create(&self, text: &str) -> Result<Task, TransportError> {
        let url = self.tasks_url();
        log::debug!("http request method=POST url={url}");
        let body = NewTask {
            text,
            completed: false,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        decode(check(response, None).await?).await
    }

    async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task, TransportError> {
        let url = self.task_url(id);
        log::debug!("http request method=PATCH url={url} completed={completed}");
        let response = self
            .client
            .patch(&url)
            .json(&CompletedPatch { completed })
            .send()
            .await
            .map_err(send_error)?;
        decode(check(response, Some(id)).await?).await
    }

    async fn delete(&self, id: TaskId) -> Result<(), TransportError> {
        let url = self.task_url(id);
        log::debug!("http request method=DELETE url={url}");
        let response = self.client.delete(&url).send().await.map_err(send_error)?;
        check(response, Some(id)).await?;
        Ok(())
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn send_error(err: reqwest::Error) -> TransportError {
    log::warn!("http request failed: {err}");
    if err.is_timeout() || err.is_connect() {
        TransportError::Network(err.to_string())
    } else {
        TransportError::Transport(err.to_string())
    }
}

async fn check(
    response: reqwest::Response,
    id: Option<TaskId>,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::warn!("http status={status} id={id:?} body={}", body.trim());
    Err(status_error(status.as_u16(), id, &body))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    response
        .json::<T>()
        .await
        .map_err(|err| TransportError::Transport(format!("invalid response body: {err}")))
}

fn status_error(status: u16, id: Option<TaskId>, body: &str) -> TransportError {
    match (status, id) {
        (404, Some(id)) => TransportError::NotFound(id),
        _ => {
            let body = body.trim();
            TransportError::Server {
                status,
                message: if body.is_empty() {
                    "empty response body".to_string()
                } else {
                    body.to_string()
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed_of_trailing_slashes() {
        let settings = Settings {
            api_url: " http://localhost:3001// ".to_string(),
            ..Settings::default()
        };
        let api = HttpTaskApi::new(&settings).expect("client builds");
        assert_eq!(api.base_url(), "http://localhost:3001");
        assert_eq!(api.tasks_url(), "http://localhost:3001/tasks");
        assert_eq!(api.task_url(12), "http://localhost:3001/tasks/12");
    }

    #[test]
    fn status_error_maps_missing_task_and_server_failures() {
        assert_eq!(status_error(404, Some(3), ""), TransportError::NotFound(3));
        assert_eq!(
            status_error(404, None, "Not Found"),
            TransportError::Server {
                status: 404,
                message: "Not Found".to_string()
            }
        );
        assert_eq!(
            status_error(500, Some(3), "  "),
            TransportError::Server {
                status: 500,
                message: "empty response body".to_string()
            }
        );
    }

    #[test]
    fn request_bodies_match_the_service_contract() {
        let value = serde_json::to_value(NewTask {
            text: "buy milk",
            completed: false,
        })
        .expect("serialize new task");
        assert_eq!(
            value,
            serde_json::json!({ "text": "buy milk", "completed": false })
        );

        let value =
            serde_json::to_value(CompletedPatch { completed: true }).expect("serialize patch");
        assert_eq!(value, serde_json::json!({ "completed": true }));
    }
}
