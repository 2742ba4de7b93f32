//! In-process stand-in for the Web API and the accounts service.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// A request as the mock received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Default)]
pub struct Spotify {
    base: OnceLock<String>,

    /// Body of `GET me/player`; `None` answers 204.
    pub player: Mutex<Option<Value>>,
    /// Overrides the status of `GET me/player`.
    pub player_status: Mutex<Option<StatusCode>>,
    /// Overrides the status of playback commands.
    pub command_status: Mutex<Option<StatusCode>>,
    pub requests: Mutex<Vec<Recorded>>,

    /// Overrides the status of the token endpoint.
    pub token_status: Mutex<Option<StatusCode>>,
    /// Refresh token included in token responses, if any.
    pub issued_refresh_token: Mutex<Option<String>>,
    pub token_requests: Mutex<Vec<HashMap<String, String>>>,
}

impl Spotify {
    /// Serves the mock on a free loopback port.
    pub async fn start() -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let spotify = Arc::new(Self::default());
        spotify
            .base
            .set(format!("http://{}", listener.local_addr().unwrap()))
            .unwrap();

        let app = Router::new()
            .route("/v1/me/player", get(player))
            .route("/v1/me/player/play", put(command))
            .route("/v1/me/player/pause", put(command))
            .route("/v1/me/player/next", post(command))
            .route("/v1/me/player/previous", post(command))
            .route("/v1/me/player/volume", put(command))
            .route("/v1/me/player/seek", put(command))
            .route("/v1/me/player/devices", get(devices))
            .route("/v1/me/playlists", get(playlists))
            .route("/v1/playlists/{id}/images", get(playlist_images))
            .route("/images/{name}", get(image))
            .route("/api/token", post(token))
            .with_state(Arc::clone(&spotify));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        spotify
    }

    pub fn base(&self) -> &str {
        self.base.get().map(String::as_str).unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.token_requests.lock().unwrap().clone()
    }

    fn record(&self, method: Method, uri: &Uri, headers: &HeaderMap, body: String) {
        self.requests.lock().unwrap().push(Recorded {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(ToOwned::to_owned),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(ToOwned::to_owned),
            body,
        });
    }
}

/// Playback state of a track on a desk computer.
pub fn playing(volume: u8, progress_ms: u64) -> Value {
    json!({
        "is_playing": true,
        "progress_ms": progress_ms,
        "shuffle_state": false,
        "repeat_state": "context",
        "device": {
            "id": "desk",
            "name": "Desk",
            "type": "Computer",
            "is_active": true,
            "volume_percent": volume
        },
        "item": {
            "id": "t1",
            "name": "Teardrop",
            "duration_ms": 330_000,
            "artists": [{"name": "Massive Attack"}],
            "album": {"name": "Mezzanine"}
        }
    })
}

async fn player(
    State(spotify): State<Arc<Spotify>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    spotify.record(method, &uri, &headers, String::new());

    if let Some(status) = *spotify.player_status.lock().unwrap() {
        return (status, Json(json!({"error": {"status": status.as_u16()}}))).into_response();
    }

    match spotify.player.lock().unwrap().clone() {
        Some(state) => Json(state).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn command(
    State(spotify): State<Arc<Spotify>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    spotify.record(method, &uri, &headers, body);
    spotify
        .command_status
        .lock()
        .unwrap()
        .unwrap_or(StatusCode::NO_CONTENT)
}

async fn devices(
    State(spotify): State<Arc<Spotify>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Value> {
    spotify.record(method, &uri, &headers, String::new());
    Json(json!({
        "devices": [
            {"id": "desk", "name": "Desk", "type": "Computer", "is_active": true, "volume_percent": 40},
            {"id": null, "name": "Restricted", "type": "TV", "is_active": false, "volume_percent": null}
        ]
    }))
}

async fn playlists(
    State(spotify): State<Arc<Spotify>>,
    Query(query): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Value> {
    spotify.record(method, &uri, &headers, String::new());

    if query.get("offset").map(String::as_str) == Some("50") {
        return Json(json!({
            "items": [
                {"id": "3", "name": "Sleep", "uri": "spotify:playlist:3", "images": []}
            ],
            "next": null
        }));
    }

    Json(json!({
        "items": [
            {"id": "1", "name": "Focus", "uri": "spotify:playlist:1", "images": null},
            null,
            {"id": "2", "name": "Run", "uri": "spotify:playlist:2",
             "images": [{"url": format!("{}/images/run.png", spotify.base()), "height": 300, "width": 300}]}
        ],
        "next": format!("{}/v1/me/playlists?offset=50&limit=50", spotify.base())
    }))
}

async fn playlist_images(
    State(spotify): State<Arc<Spotify>>,
    Path(id): Path<String>,
) -> Response {
    if id == "2" {
        return Json(json!([
            {"url": format!("{}/images/run.png", spotify.base()), "height": 300, "width": 300}
        ]))
        .into_response();
    }

    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"status": 404, "message": "Not found."}})),
    )
        .into_response()
}

async fn image(Path(name): Path<String>) -> Response {
    if name == "missing.png" {
        return StatusCode::NOT_FOUND.into_response();
    }
    ([(header::CONTENT_TYPE, "image/png")], vec![0x89_u8, b'P', b'N', b'G']).into_response()
}

async fn token(
    State(spotify): State<Arc<Spotify>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let issued = {
        let mut requests = spotify.token_requests.lock().unwrap();
        requests.push(form);
        requests.len()
    };

    if let Some(status) = *spotify.token_status.lock().unwrap() {
        return (
            status,
            Json(json!({"error": "invalid_grant", "error_description": "Refresh token revoked"})),
        )
            .into_response();
    }

    let mut response = json!({
        "access_token": format!("access-{issued}"),
        "token_type": "Bearer",
        "scope": "user-read-playback-state",
        "expires_in": 3600
    });
    if let Some(refresh_token) = spotify.issued_refresh_token.lock().unwrap().clone() {
        response["refresh_token"] = Value::String(refresh_token);
    }
    Json(response).into_response()
}
