//! Execution configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Hard memory cap per fragment (in bytes). Aggregate and join buffers
    /// must never exceed this.
    pub mem_cap_bytes: usize,

    /// How many fragments the executor runs at the same time.
    pub max_parallel_fragments: usize,

    /// Fail a streaming aggregate whose upstream reuses an earlier sorted-prefix value.
    pub verify_sorted_prefix: bool,

    /// Number of decoded plans kept by the plan cache.
    pub plan_cache_capacity: usize,

    /// Maximum node/expression nesting accepted by the plan decoder.
    pub decode_max_depth: usize,

    /// Maximum element count of any list read by the plan decoder.
    pub decode_max_list_len: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 256 * 1024 * 1024, // 256 MiB default
            max_parallel_fragments: 4,
            verify_sorted_prefix: true,
            plan_cache_capacity: 1024,
            decode_max_depth: 128,
            decode_max_list_len: 1 << 20,
        }
    }
}

impl ExecConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `GRIDSQL_MEM_CAP_BYTES`: memory cap in bytes
    /// - `GRIDSQL_MAX_PARALLEL_FRAGMENTS`: concurrently running fragments
    /// - `GRIDSQL_VERIFY_SORTED_PREFIX`: `true`/`false`
    /// - `GRIDSQL_PLAN_CACHE_CAPACITY`: cached plans
    /// - `GRIDSQL_DECODE_MAX_DEPTH`: plan nesting limit
    /// - `GRIDSQL_DECODE_MAX_LIST_LEN`: plan list length limit
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("GRIDSQL_MEM_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("GRIDSQL_MAX_PARALLEL_FRAGMENTS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_fragments = v;
            }
        }

        if let Ok(s) = std::env::var("GRIDSQL_VERIFY_SORTED_PREFIX") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.verify_sorted_prefix = v;
            }
        }

        if let Ok(s) = std::env::var("GRIDSQL_PLAN_CACHE_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.plan_cache_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("GRIDSQL_DECODE_MAX_DEPTH") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.decode_max_depth = v;
            }
        }

        if let Ok(s) = std::env::var("GRIDSQL_DECODE_MAX_LIST_LEN") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.decode_max_list_len = v;
            }
        }

        cfg
    }

    /// Parse a JSON config document; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mem_cap_bytes == 0 {
            return Err(Error::Config("mem_cap_bytes must be positive".into()));
        }
        if self.max_parallel_fragments == 0 {
            return Err(Error::Config(
                "max_parallel_fragments must be positive".into(),
            ));
        }
        if self.decode_max_depth == 0 {
            return Err(Error::Config("decode_max_depth must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ExecConfig::default().validate().unwrap();
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let cfg = ExecConfig::from_json(r#"{"mem_cap_bytes": 4096}"#).unwrap();
        assert_eq!(cfg.mem_cap_bytes, 4096);
        assert_eq!(cfg.max_parallel_fragments, 4);
        assert!(cfg.verify_sorted_prefix);
    }

    #[test]
    fn test_from_json_rejects_zero_parallelism() {
        let err = ExecConfig::from_json(r#"{"max_parallel_fragments": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = ExecConfig {
            verify_sorted_prefix: false,
            ..ExecConfig::default()
        };
        let s = serde_json::to_string(&cfg).unwrap();
        assert_eq!(ExecConfig::from_json(&s).unwrap(), cfg);
    }
}
