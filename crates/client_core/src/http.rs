use anyhow::{anyhow, bail, Result};
use reqwest::Response;
use shared::error::{ApiError, ApiException};
use url::Url;

/// Maps a non-success response to the service's error envelope when one is
/// present, falling back to the bare status code.
pub(crate) async fn expect_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(err) => Err(ApiException::new(err.code, err.message).into()),
        Err(_) => Err(anyhow!("service returned {status}")),
    }
}

/// Rewrites an http(s) base url into the ws(s) url for `path`.
pub(crate) fn websocket_url(base_url: &str, path: &str) -> Result<Url> {
    let base = Url::parse(base_url)?;
    let mut url = base.join(path)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(url),
        other => bail!("unsupported url scheme '{other}' in '{base_url}'"),
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow!("failed to set websocket scheme on '{base_url}'"))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_rewrites_scheme_and_joins_path() {
        let url = websocket_url("http://127.0.0.1:8080", "/favorites/u1/ws").expect("url");
        assert_eq!(url.as_str(), "ws://127.0.0.1:8080/favorites/u1/ws");

        let url = websocket_url("https://sync.example", "/notifications/ws").expect("url");
        assert_eq!(url.as_str(), "wss://sync.example/notifications/ws");
    }

    #[test]
    fn websocket_url_rejects_non_http_schemes() {
        assert!(websocket_url("ftp://sync.example", "/ws").is_err());
    }
}
