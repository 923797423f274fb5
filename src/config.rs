use crate::cors::{CorsOrigin, CorsPolicy, StringOrList};
use crate::playground::{ToolKind, ToolPageConfig};
use crate::upload::UploadConfig;
use serde::Deserialize;
use thiserror::Error;

/// `true`, `false`, a single origin or a comma-separated list of origins
const CORS_ORIGIN_ENV: &str = "STM_GQL_CORS_ORIGIN";
/// Comma-separated list of methods, e.g. `GET,POST,OPTIONS`
const CORS_METHODS_ENV: &str = "STM_GQL_CORS_METHODS";
const CORS_ALLOWED_HEADERS_ENV: &str = "STM_GQL_CORS_ALLOWED_HEADERS";
const CORS_EXPOSED_HEADERS_ENV: &str = "STM_GQL_CORS_EXPOSED_HEADERS";
const CORS_CREDENTIALS_ENV: &str = "STM_GQL_CORS_CREDENTIALS";
/// Number of seconds
const CORS_MAX_AGE_ENV: &str = "STM_GQL_CORS_MAX_AGE";
/// Set to `true` to return responses directly instead of through the completion callback
const ASYNC_MODE_ENV: &str = "STM_GQL_ASYNC_MODE";
/// Set to `false` to pass multipart bodies through unprocessed
const UPLOADS_ENV: &str = "STM_GQL_UPLOADS";
const UPLOAD_MAX_FILE_SIZE_ENV: &str = "STM_GQL_UPLOAD_MAX_FILE_SIZE";
const UPLOAD_MAX_FILES_ENV: &str = "STM_GQL_UPLOAD_MAX_FILES";
/// `graphiql` or `playground`. The tool page is disabled if the var is absent.
const TOOL_PAGE_ENV: &str = "STM_GQL_TOOL_PAGE";
const TOOL_SUBSCRIPTIONS_ENDPOINT_ENV: &str = "STM_GQL_TOOL_SUBSCRIPTIONS_ENDPOINT";
/// Set to `true` to include internal error details in error responses
const DEBUG_ENV: &str = "STM_GQL_DEBUG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value in {0} env var: `{1}`. Expecting {2}.")]
    InvalidValue(&'static str, String, &'static str),
}

/// Adapter settings. They are read once per container and shared by all invocations.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterConfig {
    /// No CORS headers are added if `None`
    pub cors: Option<CorsPolicy>,
    /// `false`: deliver via the completion callback and do not wait for the event loop to drain.
    /// `true`: return the response directly.
    pub async_mode: bool,
    /// Multipart bodies are not processed if `None`
    pub uploads: Option<UploadConfig>,
    /// The HTML query tool is only served if this is set
    pub tool_page: Option<ToolPageConfig>,
    pub debug: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            cors: None,
            async_mode: false,
            uploads: Some(UploadConfig::default()),
            tool_page: None,
            debug: false,
        }
    }
}

impl AdapterConfig {
    /// Reads the config from `STM_GQL_*` env vars. Missing vars fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the config from a var lookup fn. `from_env` uses the process env, tests use a map.
    pub(crate) fn from_vars<F: Fn(&str) -> Option<String>>(var: F) -> Result<Self, ConfigError> {
        let var = |name: &str| var(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let origin = var(CORS_ORIGIN_ENV).map(|v| parse_origin(&v));
        let methods = var(CORS_METHODS_ENV).map(StringOrList::One);
        let allowed_headers = var(CORS_ALLOWED_HEADERS_ENV).map(StringOrList::One);
        let exposed_headers = var(CORS_EXPOSED_HEADERS_ENV).map(StringOrList::One);
        let credentials = parse_bool(CORS_CREDENTIALS_ENV, var(CORS_CREDENTIALS_ENV))?.unwrap_or(false);
        let max_age = parse_num::<u64>(CORS_MAX_AGE_ENV, var(CORS_MAX_AGE_ENV))?;

        // the policy only exists if at least one of its vars is set
        let cors = if origin.is_some()
            || methods.is_some()
            || allowed_headers.is_some()
            || exposed_headers.is_some()
            || credentials
            || max_age.is_some()
        {
            Some(CorsPolicy {
                origin,
                methods,
                allowed_headers,
                exposed_headers,
                credentials,
                max_age,
            })
        } else {
            None
        };

        let uploads = if parse_bool(UPLOADS_ENV, var(UPLOADS_ENV))?.unwrap_or(true) {
            let defaults = UploadConfig::default();
            Some(UploadConfig {
                max_file_size: parse_num(UPLOAD_MAX_FILE_SIZE_ENV, var(UPLOAD_MAX_FILE_SIZE_ENV))?
                    .unwrap_or(defaults.max_file_size),
                max_files: parse_num(UPLOAD_MAX_FILES_ENV, var(UPLOAD_MAX_FILES_ENV))?.unwrap_or(defaults.max_files),
                ..defaults
            })
        } else {
            None
        };

        let tool_page = match var(TOOL_PAGE_ENV).map(|v| v.to_lowercase()) {
            None => None,
            Some(v) => {
                let kind = match v.as_str() {
                    "graphiql" => ToolKind::GraphiQL,
                    "playground" => ToolKind::Playground,
                    _ => return Err(ConfigError::InvalidValue(TOOL_PAGE_ENV, v, "`graphiql` or `playground`")),
                };
                Some(ToolPageConfig {
                    kind,
                    subscriptions_endpoint: var(TOOL_SUBSCRIPTIONS_ENDPOINT_ENV),
                })
            }
        };

        Ok(AdapterConfig {
            cors,
            async_mode: parse_bool(ASYNC_MODE_ENV, var(ASYNC_MODE_ENV))?.unwrap_or(false),
            uploads,
            tool_page,
            debug: parse_bool(DEBUG_ENV, var(DEBUG_ENV))?.unwrap_or(false),
        })
    }
}

/// `true` / `false` are booleans, anything with a comma is a list, the rest is a literal origin.
fn parse_origin(v: &str) -> CorsOrigin {
    match v {
        "true" => CorsOrigin::Reflect(true),
        "false" => CorsOrigin::Reflect(false),
        v if v.contains(',') => CorsOrigin::List(
            v.split(',')
                .map(|o| o.trim().to_owned())
                .filter(|o| !o.is_empty())
                .collect(),
        ),
        v => CorsOrigin::Literal(v.to_owned()),
    }
}

fn parse_bool(name: &'static str, v: Option<String>) -> Result<Option<bool>, ConfigError> {
    match v {
        None => Ok(None),
        Some(v) => match v.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue(name, v, "`true` or `false`")),
        },
    }
}

fn parse_num<T: std::str::FromStr>(name: &'static str, v: Option<String>) -> Result<Option<T>, ConfigError> {
    match v {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, v, "a positive number")),
    }
}

/// Attempts to initialize logging at INFO level. It is specially useful for test
/// functions as a shortcut for logging initializing. This Fn is safe to call multiple times.
pub fn init_logging() {
    let tsub = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false);

    if tsub.try_init().is_ok() {
        tracing::info!("tracing_subscriber initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Result<AdapterConfig, ConfigError> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        AdapterConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_no_vars() {
        init_logging();
        let config = from_map(&[]).unwrap();
        assert_eq!(config, AdapterConfig::default());
        assert!(config.cors.is_none());
        assert!(config.uploads.is_some());
        assert!(config.tool_page.is_none());
    }

    #[test]
    fn cors_vars() {
        let config = from_map(&[
            (CORS_ORIGIN_ENV, "https://a.com, https://b.com"),
            (CORS_METHODS_ENV, "GET,POST"),
            (CORS_CREDENTIALS_ENV, "true"),
            (CORS_MAX_AGE_ENV, "3600"),
        ])
        .unwrap();

        let cors = config.cors.unwrap();
        assert_eq!(
            cors.origin,
            Some(CorsOrigin::List(vec!["https://a.com".to_owned(), "https://b.com".to_owned()]))
        );
        assert_eq!(cors.methods, Some(StringOrList::One("GET,POST".to_owned())));
        assert!(cors.credentials);
        assert_eq!(cors.max_age, Some(3600));
    }

    #[test]
    fn origin_kinds() {
        assert_eq!(parse_origin("true"), CorsOrigin::Reflect(true));
        assert_eq!(parse_origin("*"), CorsOrigin::Literal("*".to_owned()));
    }

    #[test]
    fn tool_page_and_modes() {
        let config = from_map(&[
            (TOOL_PAGE_ENV, "Playground"),
            (ASYNC_MODE_ENV, "true"),
            (UPLOADS_ENV, "false"),
            (DEBUG_ENV, "1"),
        ])
        .unwrap();

        assert_eq!(config.tool_page.unwrap().kind, ToolKind::Playground);
        assert!(config.async_mode);
        assert!(config.uploads.is_none());
        assert!(config.debug);
    }

    #[test]
    fn invalid_values() {
        assert!(from_map(&[(CORS_MAX_AGE_ENV, "an hour")]).is_err());
        assert!(from_map(&[(ASYNC_MODE_ENV, "maybe")]).is_err());
        assert!(from_map(&[(TOOL_PAGE_ENV, "altair")]).is_err());
    }

    #[test]
    fn config_from_json() {
        let config = serde_json::from_str::<AdapterConfig>(
            r#"{"cors":{"origin":"*"},"asyncMode":true,"toolPage":{},"uploads":{"maxFiles":2}}"#,
        )
        .unwrap();
        assert_eq!(config.cors.unwrap().origin, Some(CorsOrigin::Literal("*".to_owned())));
        assert!(config.async_mode);
        assert_eq!(config.tool_page.unwrap().kind, ToolKind::GraphiQL);
        assert_eq!(config.uploads.unwrap().max_files, 2);
    }
}
