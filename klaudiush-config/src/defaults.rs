//! Default values for every configuration leaf.
//!
//! Each section module mirrors a TOML table; serde `default =` attributes and
//! the section `Default` impls both pull from here so the two can never drift.

pub mod global {
    pub fn version() -> u32 {
        1
    }

    pub fn default_timeout_secs() -> u64 {
        10
    }

    pub fn hook_budget_secs() -> u64 {
        10
    }

    pub fn grace_period_ms() -> u64 {
        100
    }

    pub fn io_pool_multiplier() -> usize {
        4
    }

    pub fn io_pool_ceiling() -> usize {
        32
    }
}

pub mod git {
    pub fn required_flags() -> Vec<String> {
        vec!["-s".to_string(), "-S".to_string()]
    }

    pub fn severity() -> String {
        "error".to_string()
    }

    pub fn protected_remotes() -> Vec<String> {
        vec!["origin".to_string()]
    }

    pub fn protected_branches() -> Vec<String> {
        vec!["main".to_string(), "master".to_string()]
    }
}

pub mod markdown {
    pub fn severity() -> String {
        "warning".to_string()
    }

    pub fn max_title_length() -> usize {
        80
    }
}

pub mod secrets {
    pub fn severity() -> String {
        "error".to_string()
    }

    pub fn context_lines() -> i64 {
        2
    }
}

pub mod shell {
    pub fn severity() -> String {
        "error".to_string()
    }
}

pub mod exceptions {
    pub fn token_prefix() -> String {
        "EXC".to_string()
    }

    pub fn min_reason_length() -> usize {
        8
    }
}

pub mod rate_limit {
    pub fn max_global_per_hour() -> u32 {
        10
    }

    pub fn max_global_per_day() -> u32 {
        50
    }
}

pub mod audit {
    pub fn max_size_mb() -> u64 {
        10
    }

    pub fn max_backups() -> usize {
        3
    }

    pub fn max_age_days() -> u32 {
        30
    }
}

pub mod backup {
    pub fn max_count() -> usize {
        20
    }

    pub fn max_age_days() -> u32 {
        90
    }

    pub fn max_total_size_mb() -> u64 {
        50
    }

    pub fn patch_threshold_percent() -> u8 {
        75
    }
}

pub mod crash_dump {
    pub fn max_dumps() -> usize {
        5
    }
}

pub mod patterns {
    pub fn max_age_days() -> u32 {
        90
    }

    pub fn session_max_age_hours() -> u32 {
        24
    }
}

pub mod session {
    pub fn window_minutes() -> u32 {
        30
    }
}
