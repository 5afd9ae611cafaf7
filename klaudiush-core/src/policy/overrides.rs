//! Stage B: direct per-code and per-validator overrides.

use chrono::{DateTime, Utc};
use klaudiush_config::OverridesConfig;
use tracing::debug;

use crate::validators::result::ValidationResult;

pub struct OverrideFilter {
    config: OverridesConfig,
}

impl OverrideFilter {
    pub fn new(config: OverridesConfig) -> Self {
        Self { config }
    }

    /// Drop results disabled by an active override; force-pass results whose
    /// override is an explicit `disabled = false`. Expired entries behave as
    /// absent.
    pub fn apply(
        &self,
        results: Vec<ValidationResult>,
        now: DateTime<Utc>,
    ) -> Vec<ValidationResult> {
        results
            .into_iter()
            .filter_map(|mut result| {
                let entry = result
                    .code()
                    .and_then(|code| self.config.active_entry(code, now))
                    .or_else(|| self.config.active_entry(&result.validator, now));

                match entry {
                    Some(entry) if entry.disabled => {
                        debug!(
                            validator = %result.validator,
                            code = result.code().unwrap_or(""),
                            "result dropped by override"
                        );
                        None
                    }
                    Some(_) => {
                        result.passed = true;
                        result.should_block = false;
                        Some(result)
                    }
                    None => Some(result),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use klaudiush_config::OverrideEntry;

    fn config_with(target: &str, entry: OverrideEntry) -> OverridesConfig {
        let mut config = OverridesConfig::default();
        config.entries.insert(target.to_string(), entry);
        config
    }

    fn blocked() -> Vec<ValidationResult> {
        vec![ValidationResult::block("GIT010", "sign-off missing").with_validator("git.commit")]
    }

    #[test]
    fn disabled_code_drops_the_result() {
        let filter = OverrideFilter::new(config_with(
            "GIT010",
            OverrideEntry {
                disabled: true,
                ..Default::default()
            },
        ));
        assert!(filter.apply(blocked(), Utc::now()).is_empty());
    }

    #[test]
    fn disabled_validator_name_drops_the_result() {
        let filter = OverrideFilter::new(config_with(
            "git.commit",
            OverrideEntry {
                disabled: true,
                ..Default::default()
            },
        ));
        assert!(filter.apply(blocked(), Utc::now()).is_empty());
    }

    #[test]
    fn expired_override_is_ignored() {
        let filter = OverrideFilter::new(config_with(
            "GIT010",
            OverrideEntry {
                disabled: true,
                expires_at: Some(Utc::now() - Duration::hours(2)),
                ..Default::default()
            },
        ));
        let results = filter.apply(blocked(), Utc::now());
        assert_eq!(results.len(), 1);
        assert!(results[0].should_block);
    }

    #[test]
    fn explicit_false_forces_a_pass() {
        let filter = OverrideFilter::new(config_with(
            "GIT010",
            OverrideEntry {
                disabled: false,
                ..Default::default()
            },
        ));
        let results = filter.apply(blocked(), Utc::now());
        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
        assert!(!results[0].should_block);
    }

    #[test]
    fn unrelated_results_pass_through() {
        let filter = OverrideFilter::new(config_with(
            "GIT022",
            OverrideEntry {
                disabled: true,
                ..Default::default()
            },
        ));
        let results = filter.apply(blocked(), Utc::now());
        assert_eq!(results.len(), 1);
    }
}
