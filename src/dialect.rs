//! SQL dialect selection and dialect-specific identifier rules.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlDialect {
    Pgsql,
    Mssql,
}

impl SqlDialect {
    pub fn rules(self) -> &'static dyn SqlDialectRules {
        match self {
            SqlDialect::Pgsql => &PgsqlDialectRules,
            SqlDialect::Mssql => &MssqlDialectRules,
        }
    }
}

/// Dialect-specific identifier policy.
///
/// Shortening is deterministic and length-only: a conforming identifier is
/// returned unchanged, an overlong one is truncated and suffixed with an
/// 8-hex-char SHA-256 digest of the full original name, so equal inputs
/// shorten equally on every run.
pub trait SqlDialectRules: Sync {
    fn dialect(&self) -> SqlDialect;

    fn max_identifier_length(&self) -> usize;

    fn shorten_identifier(&self, name: &str) -> String {
        let max = self.max_identifier_length();
        if name.chars().count() <= max {
            return name.to_string();
        }
        let digest = sha256_hex_prefix(name, 8);
        let keep = max.saturating_sub(digest.len() + 1);
        let prefix: String = name.chars().take(keep).collect();
        format!("{prefix}_{digest}")
    }

    /// Whether identity value propagation can ride on `ON UPDATE CASCADE`
    /// foreign keys, or needs a trigger fallback.
    fn supports_cascading_identity_updates(&self) -> bool;
}

pub struct PgsqlDialectRules;

impl SqlDialectRules for PgsqlDialectRules {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Pgsql
    }

    fn max_identifier_length(&self) -> usize {
        63
    }

    fn supports_cascading_identity_updates(&self) -> bool {
        true
    }
}

pub struct MssqlDialectRules;

impl SqlDialectRules for MssqlDialectRules {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Mssql
    }

    fn max_identifier_length(&self) -> usize {
        128
    }

    // SQL Server rejects schemas with multiple cascade paths.
    fn supports_cascading_identity_updates(&self) -> bool {
        false
    }
}

/// Lowercase hex prefix of the SHA-256 digest of `value`.
pub fn sha256_hex_prefix(value: &str, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..length].to_string()
}
