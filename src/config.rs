//! Configuration, read from the environment once at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::backend::client::RequestTimeouts;
use crate::dialogue::VerificationPolicy;
use crate::error::ConfigError;

pub const DEFAULT_APP_NAME: &str = "sofia_agent";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "./data/sofia-sessions.db";
pub const DEFAULT_VOICE_LANGUAGE: &str = "es-MX";

/// Record backend connection settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL; also the audience of the identity token.
    pub base_url: String,
    /// Fixed bearer token. When unset, tokens come from the metadata server.
    pub static_token: Option<SecretString>,
    pub timeouts: RequestTimeouts,
}

/// Twilio account used for outbound SMS.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub phone_number: String,
}

#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub app_name: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub backend: BackendConfig,
    pub verification: VerificationPolicy,
    /// Year client-type bands are measured from. Defaults to the current year.
    pub reference_year: Option<i32>,
    /// Enables the telephony routes.
    pub twilio: Option<TwilioConfig>,
    /// Forward bridge turns to a remote agent host instead of running them here.
    pub agent_base_url: Option<String>,
    pub voice_language: String,
}

impl IntakeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get("RECORD_API_URL").ok_or_else(|| ConfigError::MissingRequired {
            key: "RECORD_API_URL".to_string(),
            hint: "Set it to the record backend base URL".to_string(),
        })?;

        let defaults = RequestTimeouts::default();
        let timeouts = RequestTimeouts {
            read: secs(&get, "RECORD_API_READ_TIMEOUT_SECS", defaults.read)?,
            create_contact: secs(&get, "RECORD_API_CREATE_TIMEOUT_SECS", defaults.create_contact)?,
            create_case: secs(&get, "RECORD_API_CASE_TIMEOUT_SECS", defaults.create_case)?,
        };

        let policy_defaults = VerificationPolicy::default();
        let verification = VerificationPolicy {
            dob_only_attempts: parsed(
                &get,
                "SOFIA_DOB_ONLY_ATTEMPTS",
                policy_defaults.dob_only_attempts,
            )?,
            max_attempts: parsed(
                &get,
                "SOFIA_MAX_VERIFICATION_ATTEMPTS",
                policy_defaults.max_attempts,
            )?,
        };
        if verification.max_attempts == 0 || verification.dob_only_attempts > verification.max_attempts {
            return Err(ConfigError::InvalidValue {
                key: "SOFIA_DOB_ONLY_ATTEMPTS".to_string(),
                message: format!(
                    "{} DOB-only attempts with a ceiling of {}",
                    verification.dob_only_attempts, verification.max_attempts
                ),
            });
        }

        let reference_year = match get("SOFIA_REFERENCE_YEAR") {
            Some(raw) => Some(parse_value("SOFIA_REFERENCE_YEAR", &raw)?),
            None => None,
        };

        Ok(Self {
            app_name: get("SOFIA_APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            port: parsed(&get, "PORT", DEFAULT_PORT)?,
            db_path: get("SOFIA_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            backend: BackendConfig {
                base_url,
                static_token: get("RECORD_API_TOKEN").map(SecretString::from),
                timeouts,
            },
            verification,
            reference_year,
            twilio: twilio(&get)?,
            agent_base_url: get("AGENT_BASE_URL"),
            voice_language: get("SOFIA_VOICE_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_VOICE_LANGUAGE.to_string()),
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parsed<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parsed(get, key, default.as_secs()).map(Duration::from_secs)
}

/// All three Twilio settings or none.
fn twilio(get: &impl Fn(&str) -> Option<String>) -> Result<Option<TwilioConfig>, ConfigError> {
    const KEYS: [&str; 3] = ["TWILIO_ACCOUNT_SID", "TWILIO_AUTH_TOKEN", "TWILIO_PHONE_NUMBER"];
    let values = KEYS.map(|key| get(key));
    match values {
        [None, None, None] => Ok(None),
        [Some(account_sid), Some(auth_token), Some(phone_number)] => Ok(Some(TwilioConfig {
            account_sid,
            auth_token: SecretString::from(auth_token),
            phone_number,
        })),
        partial => {
            let missing: Vec<&str> = KEYS
                .iter()
                .zip(partial.iter())
                .filter(|(_, value)| value.is_none())
                .map(|(key, _)| *key)
                .collect();
            Err(ConfigError::MissingRequired {
                key: missing.join(", "),
                hint: "Twilio settings must be given together".to_string(),
            })
        }
    }
}
