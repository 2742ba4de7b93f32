use std::time::Duration;

use url::Url;

/// OAuth scopes requested during authorization.
pub const SCOPES: &[&str] = &[
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
];

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    pub user_agent: String,

    /// Base of the Web API, with trailing slash.
    pub api_url: Url,

    /// Base of the accounts service hosting `authorize` and `api/token`.
    pub accounts_url: Url,

    /// Loopback port of the authorization callback listener. Must match the
    /// redirect URI registered for the client id.
    pub redirect_port: u16,

    pub auth_timeout: Duration,
}

impl Config {
    pub const DEFAULT_API_URL: &'static str = "https://api.spotify.com/v1/";
    pub const DEFAULT_ACCOUNTS_URL: &'static str = "https://accounts.spotify.com/";
    pub const DEFAULT_REDIRECT_PORT: u16 = 3000;
    pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

    #[must_use]
    pub fn new() -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        // `User-Agent` product tokens must not contain separators.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        let user_agent = if os_version.contains(illegal_chars) {
            format!("{app_name}/{app_version} (Rust; {os_name})")
        } else {
            format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})")
        };
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            user_agent,
            api_url: Self::parse_base(Self::DEFAULT_API_URL),
            accounts_url: Self::parse_base(Self::DEFAULT_ACCOUNTS_URL),
            redirect_port: Self::DEFAULT_REDIRECT_PORT,
            auth_timeout: Self::DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Parses one of the hard coded base URLs.
    ///
    /// # Panics
    ///
    /// Will panic if the URL is invalid.
    fn parse_base(url: &str) -> Url {
        Url::parse(url).expect("invalid base url")
    }

    /// Points the client at a different Web API, normalizing the trailing
    /// slash so relative endpoints join below it.
    #[must_use]
    pub fn with_api_url(mut self, mut url: Url) -> Self {
        ensure_trailing_slash(&mut url);
        self.api_url = url;
        self
    }

    #[must_use]
    pub fn with_accounts_url(mut self, mut url: Url) -> Self {
        ensure_trailing_slash(&mut url);
        self.accounts_url = url;
        self
    }

    /// The redirect URI registered with the authorization server.
    #[must_use]
    pub fn redirect_uri(&self, port: u16) -> String {
        format!("http://127.0.0.1:{port}/callback")
    }

    #[must_use]
    pub fn scope() -> String {
        SCOPES.join(" ")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
}
