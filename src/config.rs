use clap::Parser;
use serde::{de::Visitor, Deserialize};
use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    ops::Deref,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

pub const ENDPOINT_ENV: &str = "PRISMIC_API_ENDPOINT";
pub const ACCESS_TOKEN_ENV: &str = "PRISMIC_ACCESS_TOKEN";

#[derive(Parser, Debug, Default)]
#[command(name = "spacetraveling", version, about = "spacetraveling blog server")]
pub struct Args {
    /// TOML configuration file
    pub config: Option<PathBuf>,

    /// Content API endpoint, e.g. https://my-repo.cdn.prismic.io/api/v2
    #[arg(long, env = ENDPOINT_ENV)]
    pub endpoint: Option<Url>,

    #[arg(long, env = ACCESS_TOKEN_ENV, hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "SPACETRAVELING_BIND")]
    pub bind: Option<SocketAddr>,

    /// Don't render every post into the cache before accepting requests
    #[arg(long)]
    pub no_prerender: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing {key} (set {env} or `{key}` in the config file)")]
    Missing {
        key: &'static str,
        env: &'static str,
    },

    #[error("content endpoint must be an http(s) URL, got {0}")]
    Endpoint(Url),
}

#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(AccessToken(token.to_string()))
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AccessTokenVisitor;
        impl Visitor<'_> for AccessTokenVisitor {
            type Value = AccessToken;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a non-empty access token")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                AccessToken::new(v).ok_or_else(|| E::custom("access token is empty"))
            }
        }

        deserializer.deserialize_str(AccessTokenVisitor)
    }
}

impl Deref for AccessToken {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub endpoint: Url,
    pub access_token: AccessToken,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NetConfig {
    pub bind: SocketAddr,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub revalidate_secs: u64,
    pub page_size: u32,
    pub prerender: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            revalidate_secs: 60 * 30,
            page_size: 5,
            prerender: true,
        }
    }
}

impl RenderConfig {
    pub fn revalidate(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CommentsConfig {
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        CommentsConfig {
            repo: String::from("abigailarruda/space-traveling"),
            issue_term: String::from("pathname"),
            theme: String::from("github-light"),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct FileContentConfig {
    endpoint: Option<Url>,
    access_token: Option<AccessToken>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    content: FileContentConfig,
    net: NetConfig,
    render: RenderConfig,
    comments: CommentsConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub content: ContentConfig,
    pub net: NetConfig,
    pub render: RenderConfig,
    pub comments: CommentsConfig,
}

impl Config {
    /// Reads the optional config file and layers the command line and
    /// environment over it.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let file = match args.config.as_deref() {
            Some(path) => read_file(path)?,
            None => FileConfig::default(),
        };

        Config::resolve(file, args)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::resolve(toml::from_str(source)?, &Args::default())
    }

    fn resolve(file: FileConfig, args: &Args) -> Result<Self, ConfigError> {
        let endpoint = args
            .endpoint
            .clone()
            .or(file.content.endpoint)
            .ok_or(ConfigError::Missing {
                key: "content.endpoint",
                env: ENDPOINT_ENV,
            })?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Endpoint(endpoint));
        }

        let access_token = args
            .access_token
            .clone()
            .and_then(AccessToken::new)
            .or(file.content.access_token)
            .ok_or(ConfigError::Missing {
                key: "content.access_token",
                env: ACCESS_TOKEN_ENV,
            })?;

        let mut net = file.net;
        if let Some(bind) = args.bind {
            net.bind = bind;
        }

        let mut render = file.render;
        if args.no_prerender {
            render.prerender = false;
        }

        Ok(Config {
            content: ContentConfig {
                endpoint,
                access_token,
            },
            net,
            render,
            comments: file.comments,
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(toml::from_str(&source)?)
}
