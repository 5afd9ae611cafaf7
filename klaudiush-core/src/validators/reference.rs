//! Stable error references and the fix-hint registry.
//!
//! Every built-in failure class has a code in a namespace (GIT###, FILE###,
//! SEC###, SHELL###, GH###) exposed as `https://klaudiu.sh/<CODE>`. Codes are
//! part of the stable contract; renaming one is a breaking change.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const REFERENCE_BASE: &str = "https://klaudiu.sh";

/// URL-form error identifier, e.g. `https://klaudiu.sh/GIT010`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    pub fn new(code: &str) -> Self {
        Self(format!("{REFERENCE_BASE}/{code}"))
    }

    pub fn url(&self) -> &str {
        &self.0
    }

    /// The bare code, e.g. `GIT010`.
    pub fn code(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The namespace prefix, e.g. `GIT`.
    pub fn category(&self) -> &str {
        let code = self.code();
        let end = code
            .find(|ch: char| !ch.is_ascii_alphabetic())
            .unwrap_or(code.len());
        &code[..end]
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static FIX_HINTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "GIT010",
            "Add a sign-off flag to the commit, e.g. `git commit -s`.",
        ),
        (
            "GIT012",
            "Drop --no-verify and let the configured hooks run.",
        ),
        (
            "GIT022",
            "Push to a feature branch and open a pull request instead.",
        ),
        (
            "SEC001",
            "Remove the secret from the content and load it from the environment.",
        ),
        (
            "SHELL001",
            "Rewrite the command without the destructive pattern, or run it manually.",
        ),
        (
            "FILE020",
            "Insert a blank line before each heading and shorten the title.",
        ),
        (
            "RULE001",
            "A configured rule blocked this action; check `[rules.rules]` in your config.",
        ),
    ])
});

/// Remediation text for a code, or `""` when none is registered.
pub fn fix_hint_for(code: &str) -> &'static str {
    FIX_HINTS.get(code).copied().unwrap_or("")
}
