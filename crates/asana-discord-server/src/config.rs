use std::path::PathBuf;

use clap::Parser;
use reqwest::Url;

#[derive(Parser, Debug, Clone)]
#[command(name = "asana-discord-server")]
pub struct Config {
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Directory holding the channel map database.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Public URL of this server, used to build the form submit callback.
    #[arg(long, env = "BASE_URL")]
    pub base_url: Url,

    #[arg(long, env = "DISCORD_TOKEN", value_parser = parse_nonempty)]
    pub discord_token: String,

    /// Asana personal access token used to read task details.
    #[arg(long, env = "ASANA_BEARER", value_parser = parse_nonempty)]
    pub asana_bearer: String,

    /// If set, require action requests to carry a valid
    /// `X-Asana-Request-Signature` computed with this secret.
    #[arg(long, env = "ASANA_CLIENT_SECRET", value_parser = parse_nonempty)]
    pub asana_client_secret: Option<String>,

    #[arg(long, env = "ASANA_ORIGIN", default_value = "https://app.asana.com")]
    pub asana_origin: String,

    #[arg(
        long,
        env = "ASANA_API_BASE",
        default_value = "https://app.asana.com/api/1.0"
    )]
    pub asana_api_base: String,

    #[arg(
        long,
        env = "DISCORD_API_BASE",
        default_value = "https://discord.com/api/v10"
    )]
    pub discord_api_base: String,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("channel_map.sqlite")
    }

    /// Absolute URL of `path` resolved against `base_url`.
    pub fn callback_url(&self, path: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| anyhow::anyhow!("join {path} onto BASE_URL: {err}"))
    }
}

fn parse_nonempty(s: &str) -> Result<String, String> {
    let v = s.trim();
    if v.is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(v.to_string())
    }
}
