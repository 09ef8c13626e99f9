//! Local redirect listener for the browser sign-in.

use crate::{AuthError, AuthResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

/// Path the identity provider redirects to.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// How long to wait for the browser to come back.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 180;

/// What the redirect carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// One-time authorization code, ready for exchange.
    Code(String),
    /// Provider or auth service reported an error.
    Error {
        error: String,
        description: Option<String>,
    },
    /// Neither a code nor an error.
    Missing,
}

impl CallbackOutcome {
    /// Parse the query of a callback request target such as
    /// `/auth/callback?code=...`.
    pub fn from_query(url: &Url) -> Self {
        let mut code = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if !value.is_empty() => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        match (code, error) {
            (_, Some(error)) => CallbackOutcome::Error { error, description },
            (Some(code), None) => CallbackOutcome::Code(code),
            (None, None) => CallbackOutcome::Missing,
        }
    }
}

/// One-shot HTTP listener on the loopback interface.
pub struct CallbackServer {
    listener: TcpListener,
    timeout: Duration,
}

impl CallbackServer {
    /// Bind `127.0.0.1:port`. Port 0 picks a free port.
    pub async fn bind(port: u16) -> AuthResult<Self> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::OAuth(format!("Failed to bind to {}: {}", addr, e)))?;

        Ok(Self {
            listener,
            timeout: Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> AuthResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Redirect URL to register with the authorize request.
    pub fn callback_url(&self) -> AuthResult<String> {
        Ok(format!(
            "http://localhost:{}{}",
            self.local_addr()?.port(),
            CALLBACK_PATH
        ))
    }

    /// Serve requests until one hits the callback path, then answer the
    /// browser and return what it carried.
    pub async fn wait_for_callback(self) -> AuthResult<CallbackOutcome> {
        info!(addr = ?self.listener.local_addr().ok(), "waiting for sign-in redirect");

        let serve = async {
            loop {
                let (mut socket, peer) = self.listener.accept().await?;
                debug!(%peer, "callback connection");
                match handle_connection(&mut socket).await {
                    Ok(Some(outcome)) => return Ok::<_, AuthError>(outcome),
                    Ok(None) => continue,
                    Err(e) => warn!(error = %e, "error handling callback connection"),
                }
            }
        };

        match tokio::time::timeout(self.timeout, serve).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout),
        }
    }
}

/// Returns `None` for requests that are not the callback (favicon etc.).
async fn handle_connection(socket: &mut TcpStream) -> AuthResult<Option<CallbackOutcome>> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Consume the headers so closing the socket does not reset the connection.
    let mut header = String::new();
    loop {
        header.clear();
        let n = reader.read_line(&mut header).await?;
        if n == 0 || header.trim().is_empty() {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let (method, target) = (parts.next().unwrap_or(""), parts.next().unwrap_or("/"));

    if method != "GET" {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(None);
    }

    let url = Url::parse("http://localhost")?.join(target)?;
    if url.path() != CALLBACK_PATH {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(None);
    }

    let outcome = CallbackOutcome::from_query(&url);
    let body = match &outcome {
        CallbackOutcome::Code(_) => success_page(),
        CallbackOutcome::Error { error, description } => {
            error_page(description.as_deref().unwrap_or(error))
        }
        CallbackOutcome::Missing => error_page("Missing authorization code"),
    };
    send_response(&mut writer, 200, "OK", &body).await?;

    Ok(Some(outcome))
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>LinkVault - Signed in</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>You're signed in</h1>
<p>You can close this window and return to the terminal.</p>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>LinkVault - Sign-in failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>Sign-in failed</h1>
<p>{}</p>
<p>You can close this window and run <code>linkvault login</code> again.</p>
</body>
</html>"#,
        escape_html(error)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn outcome_for(target: &str) -> CallbackOutcome {
        let url = Url::parse("http://localhost").unwrap().join(target).unwrap();
        CallbackOutcome::from_query(&url)
    }

    #[test]
    fn test_outcome_from_query() {
        assert_eq!(
            outcome_for("/auth/callback?code=abc%2B1"),
            CallbackOutcome::Code("abc+1".into())
        );
        assert_eq!(
            outcome_for("/auth/callback?error=access_denied&error_description=User+denied"),
            CallbackOutcome::Error {
                error: "access_denied".into(),
                description: Some("User denied".into()),
            }
        );
        assert_eq!(outcome_for("/auth/callback"), CallbackOutcome::Missing);
        assert_eq!(outcome_for("/auth/callback?code="), CallbackOutcome::Missing);
    }

    #[test]
    fn test_error_wins_over_code() {
        assert!(matches!(
            outcome_for("/auth/callback?code=abc&error=server_error"),
            CallbackOutcome::Error { .. }
        ));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let page = error_page("<script>alert(1)</script>");
        assert!(!page.contains("<script>alert"));
        assert!(page.contains("&lt;script&gt;"));
    }

    async fn send_request(addr: SocketAddr, request_line: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("{}\r\nHost: localhost\r\n\r\n", request_line).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_server_ignores_other_paths_then_returns_code() {
        let server = CallbackServer::bind(0).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_eq!(
            server.callback_url().unwrap(),
            format!("http://localhost:{}/auth/callback", addr.port())
        );

        let waiter = tokio::spawn(server.wait_for_callback());

        let response = send_request(addr, "GET /favicon.ico HTTP/1.1").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        let response = send_request(addr, "GET /auth/callback?code=xyz HTTP/1.1").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("signed in"));

        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome, CallbackOutcome::Code("xyz".into()));
    }

    #[tokio::test]
    async fn test_server_times_out() {
        let server = CallbackServer::bind(0)
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(50));

        assert!(matches!(
            server.wait_for_callback().await,
            Err(AuthError::Timeout)
        ));
    }
}
