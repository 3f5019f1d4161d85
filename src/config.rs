use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use error_stack::{Report, ResultExt};
use etcetera::BaseStrategy;
use serde::Deserialize;
use url::Url;

use crate::error::Error;

const CONFIG_FILE_NAME: &str = "identity.toml";
const DEFAULT_HOST: &str = "::1";
const DEFAULT_PORT: u16 = 10003;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
const LOCK_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Settings read from an `identity.toml` file. Every field is optional so that files can be
/// layered, and the command line and environment override all of them.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// SQLite database path or connection string. Relative paths are relative to the directory
    /// holding the config file.
    pub database: Option<String>,
    /// The IP to bind to.
    pub host: Option<String>,
    /// The port to listen on
    pub port: Option<u16>,
    /// Base URL of the auth bridge
    pub bridge_url: Option<String>,
    /// Base URL of the property store
    pub storage_url: Option<String>,
    /// Seconds before an inbound request times out
    pub request_timeout: Option<u64>,
    /// Seconds before a call to the bridge or the property store times out
    pub remote_timeout: Option<u64>,
    /// Set to false to skip loading the .env file alongside this config.
    pub dotenv: Option<bool>,
}

impl FileConfig {
    /// Overlay the values set in `other` on top of this config.
    pub fn merge(&mut self, other: FileConfig) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }

        take!(
            database,
            host,
            port,
            bridge_url,
            storage_url,
            request_timeout,
            remote_timeout,
            dotenv
        );
    }

    /// Make a relative database path relative to `dir` instead of the working directory.
    fn relative_to(mut self, dir: &Path) -> Self {
        if let Some(db) = &self.database {
            if !db.starts_with("sqlite:") && !db.contains(":memory:") {
                self.database = Some(dir.join(db).to_string_lossy().to_string());
            }
        }

        self
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database: String,
    pub host: String,
    pub port: u16,
    pub bridge_url: Url,
    pub storage_url: Url,
    pub request_timeout: Duration,
    pub remote_timeout: Duration,
}

impl ServerConfig {
    pub fn resolve(config: FileConfig) -> Result<Self, Report<Error>> {
        let database = match config.database {
            Some(db) => db,
            None => default_database_path()?,
        };

        let request_timeout = config
            .request_timeout
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let remote_timeout = config.remote_timeout.unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS);
        if request_timeout == 0 || remote_timeout == 0 {
            return Err(Report::new(Error::Config))
                .attach_printable("Timeouts must be at least one second");
        }

        Ok(Self {
            database,
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: config.port.unwrap_or(DEFAULT_PORT),
            bridge_url: required_url("bridge_url", config.bridge_url)?,
            storage_url: required_url("storage_url", config.storage_url)?,
            request_timeout: Duration::from_secs(request_timeout),
            remote_timeout: Duration::from_secs(remote_timeout),
        })
    }

    /// How long a database write may wait for the lock. An account saga holds it across one
    /// bridge call and one property store call, plus some slack for the local queries.
    pub fn lock_timeout(&self) -> Duration {
        self.remote_timeout * 2 + LOCK_TIMEOUT_SLACK
    }
}

fn required_url(name: &str, value: Option<String>) -> Result<Url, Report<Error>> {
    let Some(value) = value else {
        return Err(Report::new(Error::Config))
            .attach_printable_lazy(|| format!("{name} is not set"));
    };

    let url = Url::parse(&value)
        .change_context(Error::Config)
        .attach_printable_lazy(|| format!("{name} is not a valid URL: {value}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Report::new(Error::Config))
            .attach_printable_lazy(|| format!("{name} must be an http or https URL"));
    }

    Ok(url)
}

fn default_database_path() -> Result<String, Report<Error>> {
    let etc = etcetera::base_strategy::choose_native_strategy()
        .change_context(Error::Config)
        .attach_printable("Unable to find the home directory")?;

    Ok(etc
        .home_dir()
        .join("identity.sqlite")
        .to_string_lossy()
        .to_string())
}

/// Config files that were found, in the order they should be applied.
#[derive(Debug, Default)]
pub struct Configs {
    /// Configs from the user's config directories
    pub global: Vec<(PathBuf, FileConfig)>,
    /// Configs from the current directory and its ancestors, outermost first
    pub cwd: Vec<(PathBuf, FileConfig)>,
}

impl Configs {
    pub fn iter(&self) -> impl Iterator<Item = &(PathBuf, FileConfig)> {
        self.global.iter().chain(self.cwd.iter())
    }

    /// Merge every config file, innermost directory last.
    pub fn merged(&self) -> FileConfig {
        let mut output = FileConfig::default();
        for (dir, config) in self.iter() {
            output.merge(config.clone().relative_to(dir));
        }

        output
    }
}

pub fn find_configs(location: Option<String>) -> Result<Configs, Report<Error>> {
    if let Some(location) = location {
        let path = PathBuf::from(location);
        let config = read_config(&path, path.is_dir())?;

        let Some(config) = config else {
            return Err(Report::new(Error::Config))
                .attach_printable_lazy(|| format!("No config found in path {}", path.display()));
        };

        return Ok(Configs {
            global: Vec::new(),
            cwd: vec![config],
        });
    }

    Ok(Configs {
        global: find_default_configs()?,
        cwd: find_current_dir_configs()?,
    })
}

fn find_default_configs() -> Result<Vec<(PathBuf, FileConfig)>, Report<Error>> {
    let Ok(etc) = etcetera::base_strategy::choose_native_strategy() else {
        return Ok(Vec::new());
    };

    let mut dirs = vec![etc.home_dir().join(".config").join("identity")];
    let native = etc.config_dir().join("identity");
    if !dirs.contains(&native) {
        dirs.push(native);
    }

    dirs.into_iter()
        .filter_map(|dir| read_config(&dir, true).transpose())
        .collect::<Result<Vec<_>, Report<Error>>>()
}

fn find_current_dir_configs() -> Result<Vec<(PathBuf, FileConfig)>, Report<Error>> {
    let Ok(current_dir) = std::env::current_dir() else {
        return Ok(Vec::new());
    };

    find_ancestor_configs(&current_dir)
}

fn find_ancestor_configs(start: &Path) -> Result<Vec<(PathBuf, FileConfig)>, Report<Error>> {
    let mut configs = Vec::new();
    let mut search_dir = Some(start);

    while let Some(dir) = search_dir {
        if let Some(config) = read_config(dir, true)? {
            configs.push(config);
        }

        search_dir = dir.parent();
    }

    // Reverse the order so that we'll apply the innermost directory last.
    configs.reverse();

    Ok(configs)
}

fn read_config(
    path: &Path,
    is_directory: bool,
) -> Result<Option<(PathBuf, FileConfig)>, Report<Error>> {
    let config_path = if is_directory {
        path.join(CONFIG_FILE_NAME)
    } else {
        path.to_path_buf()
    };

    let config_dir = if is_directory {
        path
    } else {
        let Some(p) = config_path.parent() else {
            return Ok(None);
        };

        p
    };

    let Ok(buf) = std::fs::read_to_string(&config_path) else {
        return Ok(None);
    };

    let config = toml::from_str::<FileConfig>(&buf)
        .change_context(Error::Config)
        .attach_printable_lazy(|| format!("Error in config file {}", config_path.display()))?;
    Ok(Some((PathBuf::from(config_dir), config)))
}
