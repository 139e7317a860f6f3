mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use serde::Serialize;

/// Builds a request carrying `body` serialized as JSON.
pub fn json_request<B: Serialize + ?Sized>(
    method: reqwest::Method,
    url: reqwest::Url,
    body: &B,
) -> serde_json::Result<reqwest::Request> {
    let mut req = reqwest::Request::new(method, url);
    req.headers_mut().insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_request_sets_body_and_content_type() {
        let url = reqwest::Url::parse("https://example.org/send").unwrap();
        let req = json_request(
            reqwest::Method::POST,
            url,
            &serde_json::json!({ "chat_id": 1 }),
        )
        .unwrap();

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.headers()[reqwest::header::CONTENT_TYPE],
            "application/json"
        );
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"chat_id":1}"#);
    }
}
