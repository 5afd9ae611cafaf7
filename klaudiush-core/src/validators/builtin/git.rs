//! Git command validators: commit sign-off and protected-branch pushes.

use async_trait::async_trait;
use klaudiush_config::{GitCommitConfig, GitPushConfig};

use crate::hook::context::HookContext;
use crate::validators::Validator;
use crate::validators::result::ValidationResult;

/// Tokenize a shell command, tolerating unparseable input.
fn tokenize(command: &str) -> Vec<String> {
    shell_words::split(command).unwrap_or_default()
}

/// Locate the git subcommand, skipping global options like `-C <dir>` and
/// `-c key=value`.
fn git_subcommand(tokens: &[String]) -> Option<(usize, &str)> {
    let mut index = tokens.iter().position(|token| token == "git")? + 1;
    while index < tokens.len() {
        let token = tokens[index].as_str();
        match token {
            "-C" | "-c" | "--git-dir" | "--work-tree" => index += 2,
            _ if token.starts_with('-') => index += 1,
            _ => return Some((index, token)),
        }
    }
    None
}

/// `(remote, branch)` of a `git push`, when both are given positionally.
pub fn parse_push_target(command: &str) -> Option<(String, String)> {
    let tokens = tokenize(command);
    let (index, subcommand) = git_subcommand(&tokens)?;
    if subcommand != "push" {
        return None;
    }

    let mut positional = Vec::new();
    let mut cursor = index + 1;
    while cursor < tokens.len() {
        let token = tokens[cursor].as_str();
        if token == "-o" || token == "--push-option" {
            cursor += 2;
            continue;
        }
        if !token.starts_with('-') {
            positional.push(token.to_string());
        }
        cursor += 1;
    }

    match positional.as_slice() {
        [remote, refspec, ..] => {
            // `src:dst` refspecs protect on the destination side.
            let branch = refspec
                .rsplit(':')
                .next()
                .unwrap_or(refspec)
                .to_string();
            Some((remote.clone(), branch))
        }
        _ => None,
    }
}

/// Blocks `git commit` invocations without a sign-off flag (GIT010) and
/// commits run with `--no-verify` (GIT012).
pub struct GitCommitValidator {
    config: GitCommitConfig,
}

impl GitCommitValidator {
    pub fn new(config: GitCommitConfig) -> Self {
        Self { config }
    }

    fn has_required_flag(&self, tokens: &[String]) -> bool {
        tokens.iter().any(|token| {
            self.config.required_flags.iter().any(|flag| token == flag)
                || token == "--signoff"
                || token == "--gpg-sign"
                || token.starts_with("--gpg-sign=")
        })
    }
}

#[async_trait]
impl Validator for GitCommitValidator {
    fn name(&self) -> &str {
        "git.commit"
    }

    async fn validate(&self, context: &HookContext) -> ValidationResult {
        let tokens = tokenize(context.command());
        let Some((_, subcommand)) = git_subcommand(&tokens) else {
            return ValidationResult::pass();
        };
        if subcommand != "commit" {
            return ValidationResult::pass();
        }

        if self.config.forbid_no_verify() && tokens.iter().any(|token| token == "--no-verify") {
            return ValidationResult::fail_with_severity(
                "GIT012",
                &self.config.severity,
                "commit bypasses hooks with --no-verify",
            )
            .with_detail("command", context.command());
        }

        if !self.has_required_flag(&tokens) {
            let flags = self.config.required_flags.join("/");
            return ValidationResult::fail_with_severity(
                "GIT010",
                &self.config.severity,
                format!("commit is missing required flags ({flags})"),
            )
            .with_detail("command", context.command());
        }

        ValidationResult::pass()
    }
}

/// Blocks direct pushes to protected branches on protected remotes (GIT022).
pub struct GitPushValidator {
    config: GitPushConfig,
}

impl GitPushValidator {
    pub fn new(config: GitPushConfig) -> Self {
        Self { config }
    }

    fn branch_is_protected(&self, branch: &str) -> bool {
        self.config.protected_branches.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|glob| glob.matches(branch))
                .unwrap_or_else(|_| pattern == branch)
        })
    }
}

#[async_trait]
impl Validator for GitPushValidator {
    fn name(&self) -> &str {
        "git.push"
    }

    async fn validate(&self, context: &HookContext) -> ValidationResult {
        let Some((remote, branch)) = parse_push_target(context.command()) else {
            return ValidationResult::pass();
        };

        if self.config.protected_remotes.contains(&remote) && self.branch_is_protected(&branch) {
            return ValidationResult::fail_with_severity(
                "GIT022",
                &self.config.severity,
                format!("direct push to protected branch {remote}/{branch}"),
            )
            .with_detail("remote", remote)
            .with_detail("branch", branch);
        }

        ValidationResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::context::{HookEvent, ToolInput, ToolKind};

    fn bash(command: &str) -> HookContext {
        HookContext {
            event: HookEvent::PreToolUse,
            tool: Some(ToolKind::Bash),
            input: ToolInput::Bash {
                command: command.to_string(),
                description: String::new(),
            },
            session_id: "s".to_string(),
            cwd: String::new(),
            transcript_path: String::new(),
        }
    }

    #[tokio::test]
    async fn unsigned_commit_is_blocked() {
        let validator = GitCommitValidator::new(GitCommitConfig::default());
        let result = validator.validate(&bash("git commit -m \"x\"")).await;
        assert!(result.should_block);
        assert_eq!(result.code(), Some("GIT010"));
        assert!(result.message.contains("missing required flags"));
    }

    #[tokio::test]
    async fn signed_commit_passes() {
        let validator = GitCommitValidator::new(GitCommitConfig::default());
        assert!(validator.validate(&bash("git commit -s -m \"x\"")).await.passed);
        assert!(
            validator
                .validate(&bash("git commit --signoff -m \"x\""))
                .await
                .passed
        );
    }

    #[tokio::test]
    async fn no_verify_is_blocked_first() {
        let validator = GitCommitValidator::new(GitCommitConfig::default());
        let result = validator
            .validate(&bash("git commit -s --no-verify -m \"x\""))
            .await;
        assert_eq!(result.code(), Some("GIT012"));
    }

    #[tokio::test]
    async fn non_commit_subcommands_pass() {
        let validator = GitCommitValidator::new(GitCommitConfig::default());
        assert!(validator.validate(&bash("git status")).await.passed);
        assert!(validator.validate(&bash("cargo build")).await.passed);
    }

    #[tokio::test]
    async fn commit_after_global_options_is_found() {
        let validator = GitCommitValidator::new(GitCommitConfig::default());
        let result = validator
            .validate(&bash("git -C /repo commit -m \"x\""))
            .await;
        assert_eq!(result.code(), Some("GIT010"));
    }

    #[tokio::test]
    async fn push_to_protected_branch_is_blocked() {
        let validator = GitPushValidator::new(GitPushConfig::default());
        let result = validator.validate(&bash("git push origin main")).await;
        assert!(result.should_block);
        assert_eq!(result.code(), Some("GIT022"));
    }

    #[tokio::test]
    async fn push_to_feature_branch_passes() {
        let validator = GitPushValidator::new(GitPushConfig::default());
        assert!(
            validator
                .validate(&bash("git push origin feature/thing"))
                .await
                .passed
        );
    }

    #[tokio::test]
    async fn refspec_destination_side_is_checked() {
        let validator = GitPushValidator::new(GitPushConfig::default());
        let result = validator
            .validate(&bash("git push origin feature:main"))
            .await;
        assert_eq!(result.code(), Some("GIT022"));
    }

    #[test]
    fn push_target_parsing() {
        assert_eq!(
            parse_push_target("git push origin main"),
            Some(("origin".to_string(), "main".to_string()))
        );
        assert_eq!(parse_push_target("git push"), None);
        assert_eq!(parse_push_target("git pull origin main"), None);
    }
}
