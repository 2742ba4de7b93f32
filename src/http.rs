//! HTTP client with rate limiting for the Spotify Web API and accounts
//! service.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting so that a fast spinning dial cannot flood the API
//! * Consistent timeouts and headers
//! * Helpers for bearer authentication and form bodies
//!
//! # Rate Limiting
//!
//! Spotify computes its rate limit over a rolling 30-second window without
//! publishing the exact budget. The client allows bursts of up to 60 calls
//! per window and delays requests beyond that, instead of provoking `429`
//! responses that would surface as alerts on the keys.
//!
//! # Example
//!
//! ```rust
//! use spotdeck::http::Client;
//!
//! let client = Client::new(&config)?;
//! let request = client.get(url).bearer(&token)?;
//! let response = client.execute(request).await?;
//! ```

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Body, Method, Url,
};
use serde::Serialize;

use crate::{config::Config, error::Result};

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Unlimited request client for special cases.
    ///
    /// Direct access to underlying client without rate limiting, used for
    /// artwork downloads from the image CDN.
    pub unlimited: reqwest::Client,

    /// Rate limiter for API quota compliance.
    rate_limiter: DefaultDirectRateLimiter,
}

/// A request under construction.
///
/// Thin wrapper over `reqwest::Request` that keeps the call sites free of
/// header plumbing.
#[derive(Debug)]
pub struct Request {
    inner: reqwest::Request,
}

impl Client {
    /// Rolling window over which the remote service computes its rate limit.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(30);

    /// Maximum calls allowed per interval before requests are delayed.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 60;

    /// Duration to keep idle connections alive.
    ///
    /// Key presses tend to come in bursts; keeping the connection open saves
    /// a TLS handshake on each of them.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for individual network reads.
    ///
    /// Controls must react promptly or flag an alert; a stalled read should
    /// not leave a key waiting indefinitely.
    const READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * HTTP client creation fails
    /// * Header values are invalid
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .user_agent(&config.user_agent);

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .expect("quota time interval is zero")
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .expect("calls per interval is zero"),
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a request with specified method and URL.
    ///
    /// Creates a raw request that can be executed with `execute()`.
    pub fn request<U>(&self, method: Method, url: U) -> Request
    where
        U: Into<Url>,
    {
        Request {
            inner: reqwest::Request::new(method, url.into()),
        }
    }

    /// Builds a GET request.
    pub fn get<U>(&self, url: U) -> Request
    where
        U: Into<Url>,
    {
        self.request(Method::GET, url)
    }

    /// Builds a POST request.
    pub fn post<U>(&self, url: U) -> Request
    where
        U: Into<Url>,
    {
        self.request(Method::POST, url)
    }

    /// Builds a PUT request.
    pub fn put<U>(&self, url: U) -> Request
    where
        U: Into<Url>,
    {
        self.request(Method::PUT, url)
    }

    /// Executes a request with rate limiting.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * Request execution fails
    /// * Network error occurs
    ///
    /// Unexpected status codes are not errors at this level; callers decide
    /// which statuses they accept.
    pub fn execute(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| {
            trace!("{} {}", request.inner.method(), request.inner.url());
            self.unlimited.execute(request.inner).map_err(Into::into)
        })
    }
}

impl Request {
    /// Attaches a bearer token.
    ///
    /// # Errors
    ///
    /// Returns error if the token contains characters that are not allowed
    /// in a header value.
    pub fn bearer(mut self, token: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        self.inner.headers_mut().insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if `body` cannot be serialized.
    pub fn json<T>(mut self, body: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_string(body)?;
        self.inner.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        *self.inner.body_mut() = Some(Body::from(body));
        Ok(self)
    }

    /// Sets an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.inner.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        *self.inner.body_mut() = Some(Body::from(body));
        self
    }

    /// Sets an empty body.
    ///
    /// Some endpoints reject `PUT` and `POST` requests without a
    /// `Content-Length`, which an empty body provides.
    #[must_use]
    pub fn empty(mut self) -> Self {
        *self.inner.body_mut() = Some(Body::from(""));
        self
    }
}
