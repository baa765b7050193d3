//! Known player listing sources
//!
//! Each source knows its base URL, auth headers, query parameters and the
//! response layout, and builds an [`HttpEndpoint`] from them.

use std::fmt;
use std::str::FromStr;

use super::http::{HttpEndpoint, QueryStyle};
use super::parser::ResponseShape;
use super::FetcherResult;
use crate::downloader::FetchConfig;
use crate::Cursor;

/// Player listing API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// API-Sports football `players/profiles`, page numbers
    ApiSports,
    /// balldontlie NBA `players`, cursor based
    Balldontlie,
}

impl Source {
    /// All supported sources
    pub const ALL: [Source; 2] = [Source::ApiSports, Source::Balldontlie];

    /// Short name used on the command line and in checkpoints
    pub fn name(&self) -> &'static str {
        match self {
            Source::ApiSports => "api-sports",
            Source::Balldontlie => "balldontlie",
        }
    }

    /// Default base URL
    pub fn default_host(&self) -> &'static str {
        match self {
            Source::ApiSports => "https://v3.football.api-sports.io",
            Source::Balldontlie => "https://api.balldontlie.io",
        }
    }

    /// Listing path below the base URL
    pub fn path(&self) -> &'static str {
        match self {
            Source::ApiSports => "/players/profiles",
            Source::Balldontlie => "/v1/players",
        }
    }

    /// Environment variables consulted for the API key, in order
    pub fn key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Source::ApiSports => &["API_SPORTS_KEY", "RAPIDAPI_KEY"],
            Source::Balldontlie => &["BALLDONTLIE_API_KEY"],
        }
    }

    /// Response layout
    pub fn shape(&self) -> ResponseShape {
        match self {
            Source::ApiSports => ResponseShape::API_SPORTS,
            Source::Balldontlie => ResponseShape::BALLDONTLIE,
        }
    }

    /// Cursor of the first page
    pub fn initial_cursor(&self) -> Option<Cursor> {
        match self {
            Source::ApiSports => Some(Cursor::Number(1)),
            Source::Balldontlie => None,
        }
    }

    fn query_style(&self) -> QueryStyle {
        match self {
            Source::ApiSports => QueryStyle {
                cursor_param: "page",
                page_size_param: None,
            },
            Source::Balldontlie => QueryStyle {
                cursor_param: "cursor",
                page_size_param: Some("per_page"),
            },
        }
    }

    fn auth_headers(&self, api_key: &str, base_url: &str) -> Vec<(&'static str, String)> {
        match self {
            Source::ApiSports => vec![
                ("x-rapidapi-host", host_header(base_url).to_string()),
                ("x-rapidapi-key", api_key.to_string()),
            ],
            Source::Balldontlie => vec![("authorization", api_key.to_string())],
        }
    }

    /// Build the HTTP endpoint for this source
    ///
    /// # Arguments
    /// * `api_key` - Key sent in the source's auth header
    /// * `host` - Base URL override (scheme optional, defaults to https)
    /// * `config` - Page size and request timeout are taken from here
    pub fn endpoint(
        &self,
        api_key: &str,
        host: Option<&str>,
        config: &FetchConfig,
    ) -> FetcherResult<HttpEndpoint> {
        let base_url = normalize_base_url(host.unwrap_or(self.default_host()));
        let url = format!("{base_url}{}", self.path());
        HttpEndpoint::new(
            self.name(),
            url,
            &self.auth_headers(api_key, &base_url),
            self.query_style(),
            config.page_size,
            self.shape(),
            self.initial_cursor(),
            config.request_timeout,
        )
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api-sports" | "apisports" | "api_sports" => Ok(Source::ApiSports),
            "balldontlie" => Ok(Source::Balldontlie),
            other => Err(format!(
                "Unknown source '{other}'. Valid sources: api-sports, balldontlie"
            )),
        }
    }
}

/// Pick the API key from an explicit value or the source's environment variables
///
/// Empty values are ignored.
pub fn resolve_api_key(explicit: Option<&str>, source: Source) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| {
            source.key_env_vars().iter().find_map(|var| {
                std::env::var(var)
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
        })
}

fn normalize_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn host_header(base_url: &str) -> &str {
    let without_scheme = base_url
        .strip_prefix("https://")
        .or_else(|| base_url.strip_prefix("http://"))
        .unwrap_or(base_url);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}
