use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "forum", about = "A server-rendered discussion forum")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub tls: TlsConfig,
    pub google: OAuthClientConfig,
    pub github: OAuthClientConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible origin, used to build OAuth redirect URLs.
    pub public_url: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub secure_cookie: bool,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    /// Plain-HTTP port that redirects to HTTPS. `0` disables the redirector.
    pub http_port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the provider. Empty means
    /// `server.public_url` plus the provider's callback route.
    pub redirect_url: String,
}

impl OAuthClientConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10443,
            public_url: "https://localhost:10443".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            session_hours: 2,
            secure_cookie: true,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 5,
            window_ms: 1000,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            http_port: 8080,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
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

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        config.apply_env(|key| std::env::var(key).ok());

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("forum.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("uploads"));
        }

        Ok(config)
    }

    /// OAuth secrets may come from the environment instead of the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let overrides = [
            ("GOOGLE_KEY", &mut self.google.client_id),
            ("GOOGLE_SECRET", &mut self.google.client_secret),
            ("GITHUB_KEY", &mut self.github.client_id),
            ("GITHUB_SECRET", &mut self.github.client_secret),
        ];
        for (key, field) in overrides {
            if let Some(value) = var(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".forum")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("forum.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }

    pub fn redirect_url(&self, oauth: &OAuthClientConfig, callback_path: &str) -> String {
        if !oauth.redirect_url.is_empty() {
            return oauth.redirect_url.clone();
        }
        format!(
            "{}{}",
            self.server.public_url.trim_end_matches('/'),
            callback_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(data_dir: Option<PathBuf>) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 10443);
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(config.auth.session_hours, 2);
        assert!(config.auth.secure_cookie);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert!(!config.google.is_configured());
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli(Some(PathBuf::from("/tmp/test-forum")));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-forum"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_forum() {
        assert!(Config::data_dir(&cli(None)).ends_with(".forum"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli(Some(tmp.path().to_path_buf()))).unwrap();
        assert_eq!(config.server.port, 10443);
        assert_eq!(config.db_path(), tmp.path().join("forum.db"));
        assert_eq!(config.uploads_path(), tmp.path().join("uploads"));
    }

    #[test]
    fn load_reads_toml_file_and_cli_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[auth]
session_hours = 24
secure_cookie = false

[rate_limit]
max_requests = 50

[github]
client_id = "gh-id"
client_secret = "gh-secret"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.session_hours, 24);
        assert!(!config.auth.secure_cookie);
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(config.rate_limit.max_requests, 50);
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert!(config.github.is_configured());
    }

    #[test]
    fn env_overrides_oauth_secrets() {
        let mut config = Config::default();
        config.github.client_id = "from-file".into();
        config.apply_env(|key| match key {
            "GOOGLE_KEY" => Some("g-id".into()),
            "GOOGLE_SECRET" => Some("g-secret".into()),
            "GITHUB_KEY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.google.client_id, "g-id");
        assert!(config.google.is_configured());
        assert_eq!(config.github.client_id, "from-file");
    }

    #[test]
    fn redirect_url_joins_public_origin_unless_overridden() {
        let mut config = Config::default();
        config.server.public_url = "https://forum.example/".into();
        assert_eq!(
            config.redirect_url(&config.google, "/GoogleCallback"),
            "https://forum.example/GoogleCallback"
        );

        config.github.redirect_url = "https://elsewhere.example/cb".into();
        assert_eq!(
            config.redirect_url(&config.github, "/login/github/callback"),
            "https://elsewhere.example/cb"
        );
    }
}
