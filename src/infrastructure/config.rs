use std::env;

use crate::domain::LoanPolicy;
use crate::domain::policy::{DEFAULT_FINE_PER_DAY, DEFAULT_LOAN_DAYS};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub loan_policy: LoanPolicy,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://campus_library.db?mode=rwc".to_string());

        let loan_policy = LoanPolicy {
            loan_days: env::var("LOAN_PERIOD_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|days: &i64| *days > 0)
                .unwrap_or(DEFAULT_LOAN_DAYS),
            fine_per_day: env::var("FINE_PER_DAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|rate: &f64| *rate >= 0.0)
                .unwrap_or(DEFAULT_FINE_PER_DAY),
        };

        Self {
            database_url,
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            loan_policy,
            seed_demo: env::var("SEED_DEMO").is_ok(),
        }
    }
}
