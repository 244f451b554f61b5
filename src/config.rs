use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

use crate::api::MovieCategory;

pub const API_KEY_ENV: &str = "MOVIEVIEWER_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "movieviewer", about = "Browse movies, keep favorites, work offline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// TMDB API key (overrides config and environment)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Base URL of the movie API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Serve everything from the local cache
    #[arg(long)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List movies in a category
    Movies {
        #[arg(long, value_enum, default_value_t = CategoryArg::Popular)]
        category: CategoryArg,
    },
    /// Search movies by title
    Search { query: String },
    /// Show details, reviews and similar movies
    Show { id: i64 },
    /// Create an account
    Register {
        user_id: String,
        password: String,
        preferred_name: String,
        /// Password confirmation, defaults to the password
        #[arg(long)]
        confirm: Option<String>,
    },
    /// List a user's favorites (logs in, so not available with --offline)
    Favorites {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },
    /// Add a movie to a user's favorites (logs in, so not available with --offline)
    Favorite {
        id: i64,
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },
    /// Remove a movie from a user's favorites (logs in, so not available with --offline)
    Unfavorite {
        id: i64,
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryArg {
    Popular,
    TopRated,
    NowPlaying,
    Upcoming,
}

impl From<CategoryArg> for MovieCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Popular => MovieCategory::Popular,
            CategoryArg::TopRated => MovieCategory::TopRated,
            CategoryArg::NowPlaying => MovieCategory::NowPlaying,
            CategoryArg::Upcoming => MovieCategory::Upcoming,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3/".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        Self::load_with_env(cli, std::env::var(API_KEY_ENV).ok())
    }

    /// Same as `load`, with the environment API key passed in explicitly.
    pub fn load_with_env(cli: &Cli, env_api_key: Option<String>) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if let Some(key) = env_api_key.filter(|k| !k.is_empty()) {
            config.api.api_key = key;
        }

        // CLI overrides
        if let Some(ref key) = cli.api_key {
            config.api.api_key = key.clone();
        }
        if let Some(ref base_url) = cli.base_url {
            config.api.base_url = base_url.clone();
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("movieviewer.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".movieviewer")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("movieviewer.db"))
    }
}
