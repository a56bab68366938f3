use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not find a configuration file in any of: {}", .0.join(", "))]
    NotFound(Vec<String>),
    #[error("could not read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("could not reach the token endpoint")]
    Request(#[source] reqwest::Error),
    #[error("token endpoint answered with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("could not decode the token response")]
    Decode(#[source] reqwest::Error),
    #[error("token request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to `{endpoint}` failed")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not decode the response of `{endpoint}`")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("authentication failed")]
    Auth(#[from] AuthError),
    #[error("telemetry fetch failed")]
    Fetch(#[from] FetchError),
    #[error("could not build the HTTP client")]
    Http(#[source] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
