use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("tuition".to_string())
}

fn default_public_content() -> PathBuf {
    PathBuf::from(env::var("PUBLIC_CONTENT_PATH").unwrap_or("./public".to_string()))
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(env::var("UPLOAD_DIR").unwrap_or("./public/uploads".to_string()))
}

fn default_upload_temp_dir() -> PathBuf {
    PathBuf::from(env::var("UPLOAD_TEMP_DIR").unwrap_or("./tmp".to_string()))
}

fn default_upload_url_prefix() -> String {
    "/uploads".to_string()
}

fn default_token_lifetime_days() -> i64 {
    env::var("TOKEN_LIFETIME_DAYS")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(7)
}

#[cfg(debug_assertions)]
fn default_admin_usernames() -> Vec<String> {
    vec![String::from("admin")]
}
#[cfg(not(debug_assertions))]
fn default_admin_usernames() -> Vec<String> {
    vec![]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    /// Built SPA files, served for every path the API doesn't claim.
    #[serde(default = "default_public_content")]
    pub public_content: PathBuf,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_upload_temp_dir")]
    pub upload_temp_dir: PathBuf,
    #[serde(default = "default_upload_url_prefix")]
    pub upload_url_prefix: String,

    #[serde(default = "default_token_lifetime_days")]
    pub token_lifetime_days: i64,

    /// Usernames that are granted the admin role on signup.
    #[serde(default = "default_admin_usernames")]
    pub admin_usernames: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            public_content: default_public_content(),
            upload_dir: default_upload_dir(),
            upload_temp_dir: default_upload_temp_dir(),
            upload_url_prefix: default_upload_url_prefix(),
            token_lifetime_days: default_token_lifetime_days(),
            admin_usernames: default_admin_usernames(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config =
            serde_yaml::from_str("mongodb_db: center\nadmin_usernames: [root]\n").unwrap();

        assert_eq!(config.mongodb_db, "center");
        assert_eq!(config.admin_usernames, vec!["root".to_string()]);
        assert_eq!(config.upload_url_prefix, "/uploads");
        assert!(config.token_lifetime_days > 0);
    }
}
