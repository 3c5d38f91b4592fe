use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use crate::generation::FAL_API_BASE;
use crate::payments::STRIPE_API_BASE;
use crate::reducer::{DEFAULT_METADATA_MAX_CHARS, ReducerOptions};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SITE_URL: &str = "https://artzyful.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub public_base_url: String,
    pub site_url: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub fal_key: String,
    pub fal_api_base: String,
    pub reducer: ReducerOptions,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| var(name).ok_or_else(|| anyhow!("missing {name}"));

        let port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("invalid PORT: {value}"))?,
            None => DEFAULT_PORT,
        };
        let bind_address = format!("0.0.0.0:{port}");

        let data_dir = var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| {
            let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
            base.push("artzyful");
            base
        });

        let public_base_url = normalize_base_url(
            &var("PUBLIC_URL").unwrap_or_else(|| format!("localhost:{port}")),
        );

        let max_len = match var("METADATA_MAX_CHARS") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("invalid METADATA_MAX_CHARS: {value}"))?,
            None => DEFAULT_METADATA_MAX_CHARS,
        };
        let lenient_max_len = var("METADATA_LENIENT_MAX_CHARS")
            .map(|value| {
                value
                    .parse::<usize>()
                    .with_context(|| format!("invalid METADATA_LENIENT_MAX_CHARS: {value}"))
            })
            .transpose()?;

        Ok(Self {
            bind_address,
            data_dir,
            public_base_url,
            site_url: var("SITE_URL")
                .map(|value| normalize_base_url(&value))
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_api_base: var("STRIPE_API_BASE").unwrap_or_else(|| STRIPE_API_BASE.to_string()),
            fal_key: required("FAL_KEY")?,
            fal_api_base: var("FAL_API_BASE").unwrap_or_else(|| FAL_API_BASE.to_string()),
            reducer: ReducerOptions {
                lenient_max_len,
                ..ReducerOptions::with_max_len(max_len)
            },
        })
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.data_dir.join("settings")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Adds a scheme when missing and collapses doubled schemes such as
/// `http://https://`.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let mut base = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    loop {
        let collapsed = ["http://", "https://"]
            .iter()
            .find_map(|outer| {
                base.strip_prefix(outer).and_then(|rest| {
                    (rest.starts_with("http://") || rest.starts_with("https://"))
                        .then(|| rest.to_string())
                })
            });
        match collapsed {
            Some(rest) => base = rest,
            None => return base,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config =
            AppConfig::from_lookup(lookup(&[("STRIPE_SECRET_KEY", "sk_test"), ("FAL_KEY", "fal")]))
                .unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert_eq!(config.stripe_api_base, STRIPE_API_BASE);
        assert_eq!(config.fal_api_base, FAL_API_BASE);
        assert_eq!(config.reducer.max_len, 500);
        assert_eq!(config.reducer.lenient_max_len, None);
        assert!(config.data_dir.ends_with("artzyful"));
    }

    #[test]
    fn overrides_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STRIPE_SECRET_KEY", "sk_test"),
            ("FAL_KEY", "fal"),
            ("PORT", "8080"),
            ("DATA_DIR", "/var/lib/artzyful"),
            ("PUBLIC_URL", "https://media.artzyful.com/"),
            ("METADATA_MAX_CHARS", "450"),
            ("METADATA_LENIENT_MAX_CHARS", "480"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.settings_dir(), PathBuf::from("/var/lib/artzyful/settings"));
        assert_eq!(config.public_base_url, "https://media.artzyful.com");
        assert_eq!(config.reducer.max_len, 450);
        assert_eq!(config.reducer.lenient_max_len, Some(480));
    }

    #[test]
    fn missing_keys_are_errors() {
        let err = AppConfig::from_lookup(lookup(&[("FAL_KEY", "fal")])).unwrap_err();
        assert_eq!(err.to_string(), "missing STRIPE_SECRET_KEY");
        let err = AppConfig::from_lookup(lookup(&[("STRIPE_SECRET_KEY", " "), ("FAL_KEY", "x")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "missing STRIPE_SECRET_KEY");
    }

    #[test]
    fn invalid_port_is_an_error() {
        let result = AppConfig::from_lookup(lookup(&[
            ("STRIPE_SECRET_KEY", "sk"),
            ("FAL_KEY", "fal"),
            ("PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("example.com/"), "http://example.com");
        assert_eq!(normalize_base_url("http://https://example.com"), "https://example.com");
        assert_eq!(normalize_base_url("https://http://http://x.io"), "http://x.io");
        assert_eq!(normalize_base_url("https://x.io"), "https://x.io");
    }
}
