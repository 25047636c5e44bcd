//! Authenticated JSON client for the provider's REST API.
//!
//! Every call either yields a decoded record or an
//! [`ApiFailure`] wrapped in [`SpinupError::Api`]; transport
//! faults and non-2xx statuses look the same to callers.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiFailure, SpinupError, SpinupResult};

const PER_PAGE: u32 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiClient {
    http: Client,
    base: String,
    token: String,
}

impl ApiClient {
    pub fn new(base: &str, token: &str) -> SpinupResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("spinup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiFailure::transport(e.to_string()))?;

        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header("Content-Type", "application/json")
    }

    /// Fetch every page of a collection and return the items under
    /// `key`.
    pub fn list<T: DeserializeOwned>(&self, path: &str, key: &str) -> SpinupResult<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut next = Some(self.url(&format!("{path}{separator}per_page={PER_PAGE}")));
        let mut items = Vec::new();

        while let Some(url) = next.take() {
            debug!(%url, "GET page");
            let page: Value = read_json(send(self.authed(self.http.get(&url)))?)?;
            items.extend(extract::<Vec<T>>(&page, key)?);
            next = next_page(&page);
        }
        Ok(items)
    }

    /// GET a single record found under `key`.
    pub fn get<T: DeserializeOwned>(&self, path: &str, key: &str) -> SpinupResult<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let body: Value = read_json(send(self.authed(self.http.get(&url)))?)?;
        extract(&body, key)
    }

    /// POST `body` and decode the record found under `key`.
    pub fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        key: &str,
    ) -> SpinupResult<T> {
        let url = self.url(path);
        debug!(%url, "POST");
        let reply: Value = read_json(send(self.authed(self.http.post(&url)).json(body))?)?;
        extract(&reply, key)
    }

    /// POST `body` to an endpoint that answers without a body.
    /// Returns the status code and whatever text came back so the
    /// caller can decide what counts as success.
    pub fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> SpinupResult<(u16, String)> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = send(self.authed(self.http.post(&url)).json(body))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| ApiFailure::transport(e.to_string()))?;
        Ok((status, text))
    }

    /// DELETE a resource. Any 2xx, normally `204 No Content`, is
    /// success.
    pub fn delete(&self, path: &str) -> SpinupResult<()> {
        let url = self.url(path);
        debug!(%url, "DELETE");
        let response = send(self.authed(self.http.delete(&url)))?;
        debug!(status = response.status().as_u16(), "deleted");
        Ok(())
    }
}

/// Send a request and turn anything but a 2xx into an
/// [`ApiFailure`].
fn send(req: RequestBuilder) -> SpinupResult<Response> {
    let response = req
        .send()
        .map_err(|e| ApiFailure::transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reason = status.canonical_reason().unwrap_or("unexpected status");
    let body = response.text().unwrap_or_default();
    Err(ApiFailure::from_response(status.as_u16(), reason, &body).into())
}

fn read_json(response: Response) -> SpinupResult<Value> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .map_err(|e| ApiFailure::transport(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(SpinupError::Api(ApiFailure {
            status: Some(status),
            message: "empty response body".into(),
            body: None,
        }));
    }
    Ok(serde_json::from_str(&text)?)
}

/// Decode the member `key` of a response document.
pub fn extract<T: DeserializeOwned>(doc: &Value, key: &str) -> SpinupResult<T> {
    let member = doc.get(key).ok_or_else(|| {
        SpinupError::Api(ApiFailure {
            status: None,
            message: format!("response has no '{key}' field"),
            body: Some(doc.to_string()),
        })
    })?;
    Ok(serde_json::from_value(member.clone())?)
}

/// The `links.pages.next` URL of a paginated response.
#[must_use]
pub fn next_page(doc: &Value) -> Option<String> {
    doc.pointer("/links/pages/next")
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer a single request with `status_line` and `body`.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).unwrap();
            let reply = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn delete_accepts_no_content() {
        let base = serve_once("204 No Content", "");
        let client = ApiClient::new(&base, "token").unwrap();

        client.delete("/droplets/1").unwrap();
    }

    #[test]
    fn delete_rejects_error_status() {
        let base = serve_once(
            "404 Not Found",
            r#"{"id":"not_found","message":"The resource you were accessing could not be found."}"#,
        );
        let client = ApiClient::new(&base, "token").unwrap();

        let err = client.delete("/droplets/1").unwrap_err();
        assert!(matches!(err, SpinupError::Api(ref f) if f.status == Some(404)));
    }

    #[test]
    fn next_page_present() {
        let doc = json!({
            "droplets": [],
            "links": {"pages": {"next": "https://api.example/v2/droplets?page=2"}}
        });
        assert_eq!(
            next_page(&doc).as_deref(),
            Some("https://api.example/v2/droplets?page=2")
        );
    }

    #[test]
    fn next_page_absent_on_last_page() {
        let doc = json!({"droplets": [], "links": {}});
        assert_eq!(next_page(&doc), None);
    }

    #[test]
    fn extract_missing_key_is_api_failure() {
        let doc = json!({"other": 1});
        let err = extract::<u64>(&doc, "droplet").unwrap_err();
        assert!(matches!(err, SpinupError::Api(ref f) if f.message.contains("droplet")));
    }

    #[test]
    fn extract_decodes_member() {
        let doc = json!({"ids": [1, 2, 3]});
        let ids: Vec<u64> = extract(&doc, "ids").unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
