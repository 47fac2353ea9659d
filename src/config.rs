use std::{env, fmt};

/// Minimum HMAC-SHA256 key length in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Upper bounds on token lifetimes: one day for access tokens, ten years for
/// refresh tokens.
const MAX_ACCESS_EXPIRATION_MINUTES: u64 = 24 * 60;
const MAX_REFRESH_EXPIRATION_DAYS: u64 = 3650;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_access_expiration_minutes: u64,
    pub jwt_refresh_expiration_days: u64,
    pub bcrypt_cost: u32,
    // Registration admin grant (optional)
    pub admin_email: Option<String>,
    pub admin_invite_code: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup and validates it.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: lookup("PORT").unwrap_or_else(|| "8080".into()).parse()?,
            jwt_access_secret: required(&lookup, "JWT_ACCESS_SECRET")?,
            jwt_refresh_secret: required(&lookup, "JWT_REFRESH_SECRET")?,
            jwt_access_expiration_minutes: required(&lookup, "JWT_ACCESS_EXPIRATION_MINUTES")?
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid JWT_ACCESS_EXPIRATION_MINUTES: {e}"))?,
            jwt_refresh_expiration_days: required(&lookup, "JWT_REFRESH_EXPIRATION_DAYS")?
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid JWT_REFRESH_EXPIRATION_DAYS: {e}"))?,
            bcrypt_cost: match lookup("BCRYPT_COST") {
                Some(v) => v.parse()?,
                None => bcrypt::DEFAULT_COST,
            },
            admin_email: lookup("ADMIN_EMAIL").filter(|s| !s.is_empty()),
            admin_invite_code: lookup("ADMIN_INVITE_CODE").filter(|s| !s.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_access_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_ACCESS_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }
        if self.jwt_refresh_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_REFRESH_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }
        if self.jwt_access_secret == self.jwt_refresh_secret {
            anyhow::bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
        }
        if !(1..=MAX_ACCESS_EXPIRATION_MINUTES).contains(&self.jwt_access_expiration_minutes) {
            anyhow::bail!(
                "JWT_ACCESS_EXPIRATION_MINUTES must be in 1..={MAX_ACCESS_EXPIRATION_MINUTES}"
            );
        }
        if !(1..=MAX_REFRESH_EXPIRATION_DAYS).contains(&self.jwt_refresh_expiration_days) {
            anyhow::bail!(
                "JWT_REFRESH_EXPIRATION_DAYS must be in 1..={MAX_REFRESH_EXPIRATION_DAYS}"
            );
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            anyhow::bail!("BCRYPT_COST must be between 4 and 31");
        }
        Ok(())
    }

    // Both TTLs are bounded by `validate`, so the conversions cannot wrap.
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.jwt_access_expiration_minutes as i64)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.jwt_refresh_expiration_days as i64)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_access_secret", &"<redacted>")
            .field("jwt_refresh_secret", &"<redacted>")
            .field("jwt_access_expiration_minutes", &self.jwt_access_expiration_minutes)
            .field("jwt_refresh_expiration_days", &self.jwt_refresh_expiration_days)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("JWT_ACCESS_SECRET", "a".repeat(32)),
            ("JWT_REFRESH_SECRET", "r".repeat(32)),
            ("JWT_ACCESS_EXPIRATION_MINUTES", "15".to_string()),
            ("JWT_REFRESH_EXPIRATION_DAYS", "7".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> anyhow::Result<Config> {
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_loads_with_defaults_for_optional_values() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.access_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.refresh_ttl(), chrono::Duration::days(7));
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn test_token_settings_have_no_implicit_defaults() {
        for key in [
            "JWT_ACCESS_SECRET",
            "JWT_REFRESH_SECRET",
            "JWT_ACCESS_EXPIRATION_MINUTES",
            "JWT_REFRESH_EXPIRATION_DAYS",
        ] {
            let mut vars = base_vars();
            vars.remove(key);
            let err = load(&vars).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn test_rejects_short_or_shared_secrets() {
        let mut vars = base_vars();
        vars.insert("JWT_ACCESS_SECRET", "short".into());
        assert!(load(&vars).is_err());

        let mut vars = base_vars();
        vars.insert("JWT_REFRESH_SECRET", "a".repeat(32));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_rejects_zero_or_garbage_ttl() {
        let mut vars = base_vars();
        vars.insert("JWT_ACCESS_EXPIRATION_MINUTES", "0".into());
        assert!(load(&vars).is_err());

        let mut vars = base_vars();
        vars.insert("JWT_REFRESH_EXPIRATION_DAYS", "a week".into());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_rejects_ttl_beyond_upper_bound() {
        let mut vars = base_vars();
        vars.insert("JWT_ACCESS_EXPIRATION_MINUTES", u64::MAX.to_string());
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("JWT_ACCESS_EXPIRATION_MINUTES"), "{err}");

        let mut vars = base_vars();
        vars.insert("JWT_REFRESH_EXPIRATION_DAYS", "1000000000".into());
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("JWT_REFRESH_EXPIRATION_DAYS"), "{err}");

        let mut vars = base_vars();
        vars.insert("JWT_ACCESS_EXPIRATION_MINUTES", "1440".into());
        vars.insert("JWT_REFRESH_EXPIRATION_DAYS", "3650".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.access_ttl(), chrono::Duration::days(1));
        assert_eq!(config.refresh_ttl(), chrono::Duration::days(3650));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&base_vars()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(&"a".repeat(32)));
        assert!(rendered.contains("<redacted>"));
    }
}
