//! Logic for loading configuration in to an object model
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use displaydoc::Display;
use schemars::gen::SchemaSettings;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read configuration file {path}: {error}
    Read {
        path: String,
        error: std::io::Error,
    },

    /// could not parse configuration: {0}
    Parse(#[from] serde_yaml::Error),
}

/// The configuration of the gateway.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Configuration options pertaining to the http server component.
    #[serde(default)]
    pub server: Server,

    /// Where entities are fetched from.
    #[serde(default)]
    pub resources: Resources,
}

impl Configuration {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|error| ConfigurationError::Read {
            path: path.display().to_string(),
            error,
        })?;
        content.parse()
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // An empty document is a valid, fully defaulted configuration.
        if s.trim().is_empty() {
            return Ok(Configuration::default());
        }
        Ok(serde_yaml::from_str(s)?)
    }
}

/// Configuration options pertaining to the http server component.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Server {
    /// The socket address and port to listen on
    /// Defaults to 127.0.0.1:4000
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// The HTTP path on which GraphQL requests will be served.
    /// default: "/graphql"
    #[serde(default = "default_graphql_path")]
    pub path: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_graphql_path(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4000))
}

fn default_graphql_path() -> String {
    String::from("/graphql")
}

/// The remote resource service.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    /// Base URL every resource path is resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Timeout of each call to the resource service. No timeout when unset.
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: None,
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://localhost:3000/").expect("default base url is valid")
}

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> RootSchema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = false;
    });
    settings
        .into_generator()
        .into_root_schema_for::<Configuration>()
}
