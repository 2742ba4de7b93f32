//! Loopback listener receiving the authorization redirect.
//!
//! Only the request line is interpreted. Requests for other paths, such as
//! the browser asking for `/favicon.ico`, get a 404 and are otherwise
//! ignored. Connections are read concurrently, so a preconnected socket that
//! never sends a request cannot hold up the redirect.

use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use url::Url;

use super::AuthError;
use crate::error::{Error, Result};

pub const CALLBACK_PATH: &str = "/callback";

/// Time a connection gets to send its request head.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str =
    "<html><body><h1>Success!</h1><p>You can close this window.</p></body></html>";

pub struct Listener {
    listener: TcpListener,
}

/// An accepted redirect carrying an authorization code.
///
/// The browser is kept waiting until [`Callback::succeed`] or
/// [`Callback::fail`] answers it.
pub struct Callback {
    pub code: String,
    stream: TcpStream,
}

impl Listener {
    /// Binds to `port` on the loopback interface. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Waits for a redirect to the callback path.
    ///
    /// # Errors
    ///
    /// * `AuthError::StateMismatch` if the redirect is not for `state`
    /// * `AuthError::AccessDenied` if the user declined
    /// * I/O errors of the listener
    pub async fn accept(&self, state: &str) -> Result<Callback> {
        // Dropping the set on return aborts the reads still in progress.
        let mut requests = JoinSet::new();

        loop {
            let (mut stream, request_line) = tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    trace!("callback connection from {peer}");
                    requests.spawn(read_request(stream));
                    continue;
                }
                Some(read) = requests.join_next() => match read {
                    Ok(Ok(request)) => request,
                    Ok(Err(e)) => {
                        debug!("error reading callback request: {e}");
                        continue;
                    }
                    Err(e) => {
                        debug!("callback request reader failed: {e}");
                        continue;
                    }
                },
            };

            let Some(url) = request_url(&request_line) else {
                respond(&mut stream, 400, "Bad Request", "text/plain", "Bad request").await;
                continue;
            };

            if url.path() != CALLBACK_PATH {
                respond(&mut stream, 404, "Not Found", "text/plain", "Not found").await;
                continue;
            }

            let query_value = |key: &str| {
                url.query_pairs()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.into_owned())
            };

            if query_value("state").as_deref() != Some(state) {
                respond(&mut stream, 400, "Bad Request", "text/plain", "State mismatch").await;
                return Err(Error::permission_denied(AuthError::StateMismatch));
            }

            if let Some(error) = query_value("error") {
                respond(
                    &mut stream,
                    400,
                    "Bad Request",
                    "text/plain",
                    "Authorization denied",
                )
                .await;
                return Err(Error::permission_denied(AuthError::AccessDenied(error)));
            }

            match query_value("code") {
                Some(code) if !code.is_empty() => return Ok(Callback { code, stream }),
                _ => {
                    respond(&mut stream, 400, "Bad Request", "text/plain", "Missing code").await;
                }
            }
        }
    }
}

impl Callback {
    pub async fn succeed(mut self) {
        respond(&mut self.stream, 200, "OK", "text/html", SUCCESS_PAGE).await;
    }

    pub async fn fail(mut self) {
        respond(
            &mut self.stream,
            500,
            "Internal Server Error",
            "text/plain",
            "Token exchange failed",
        )
        .await;
    }
}

async fn read_request(stream: TcpStream) -> Result<(TcpStream, String)> {
    let mut stream = BufReader::new(stream);
    let mut request_line = String::new();
    tokio::time::timeout(REQUEST_TIMEOUT, read_head(&mut stream, &mut request_line)).await??;
    Ok((stream.into_inner(), request_line))
}

/// Reads the request line into `request_line` and drains the headers, so
/// that closing the connection does not reset it before the browser read
/// the response.
async fn read_head(
    stream: &mut BufReader<TcpStream>,
    request_line: &mut String,
) -> std::io::Result<()> {
    const MAX_HEADER_LINES: usize = 100;

    stream.read_line(request_line).await?;

    let mut line = String::new();
    for _ in 0..MAX_HEADER_LINES {
        line.clear();
        let read = stream.read_line(&mut line).await?;
        if read == 0 || line.trim_end().is_empty() {
            break;
        }
    }

    Ok(())
}

/// Parses a request line such as `GET /callback?code=... HTTP/1.1`.
fn request_url(request_line: &str) -> Option<Url> {
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;
    if !target.starts_with('/') {
        return None;
    }

    Url::parse(&format!("http://127.0.0.1{target}")).ok()
}

async fn respond(stream: &mut TcpStream, status: u16, reason: &str, content_type: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("error answering callback request: {e}");
    }
    if let Err(e) = stream.shutdown().await {
        debug!("error closing callback connection: {e}");
    }
}
