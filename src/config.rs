use crate::roster::{ImportRules, DEFAULT_STUDENT_ID_DIGITS, DEFAULT_STUDENT_ID_PREFIX};
use anyhow::Context;

pub const ENV_STUDENT_ID_PREFIX: &str = "ROSTERD_STUDENT_ID_PREFIX";
pub const ENV_STUDENT_ID_DIGITS: &str = "ROSTERD_STUDENT_ID_DIGITS";
pub const ENV_SEED_DEMO: &str = "ROSTERD_SEED_DEMO";

/// Startup configuration. Runtime changes go through the `setup.import`
/// section instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub student_id_prefix: String,
    pub student_id_digits: u32,
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            student_id_prefix: DEFAULT_STUDENT_ID_PREFIX.to_string(),
            student_id_digits: DEFAULT_STUDENT_ID_DIGITS,
            seed_demo: true,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(prefix) = get(ENV_STUDENT_ID_PREFIX) {
            let prefix = prefix.trim();
            validate_prefix(prefix).map_err(anyhow::Error::msg)?;
            cfg.student_id_prefix = prefix.to_string();
        }
        if let Some(digits) = get(ENV_STUDENT_ID_DIGITS) {
            let n = digits
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{ENV_STUDENT_ID_DIGITS} must be an integer"))?;
            validate_digits(i64::from(n)).map_err(anyhow::Error::msg)?;
            cfg.student_id_digits = n;
        }
        if let Some(seed) = get(ENV_SEED_DEMO) {
            cfg.seed_demo = match seed.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "y" => true,
                "0" | "false" | "no" | "n" => false,
                other => anyhow::bail!("{ENV_SEED_DEMO} must be boolean, got {other:?}"),
            };
        }
        Ok(cfg)
    }

    pub fn import_rules(&self) -> anyhow::Result<ImportRules> {
        ImportRules::new(&self.student_id_prefix, self.student_id_digits)
            .context("build student id rule")
    }
}

pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.len() > 16 {
        return Err("studentIdPrefix length must be <= 16".into());
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("studentIdPrefix must contain only ASCII letters and digits".into());
    }
    Ok(())
}

pub fn validate_digits(n: i64) -> Result<(), String> {
    if !(1..=9).contains(&n) {
        return Err("studentIdDigits must be in 1..=9".into());
    }
    Ok(())
}
