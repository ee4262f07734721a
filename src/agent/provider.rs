//! LLM provider seam and the command-template provider.

use super::config::ProviderProfile;
use super::phase::Step;
use super::template::{render_template, vars};
use crate::process::{CancelToken, DEFAULT_OUTPUT_LIMIT, Termination, run_command};
use anyhow::{Context, Result, anyhow, bail};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// One prompt sent to a provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub step: Step,
    pub model: String,
    pub prompt: String,
    /// File holding `prompt`, for tools that read prompts from disk.
    pub prompt_file: PathBuf,
    pub max_tokens: u64,
    /// Working directory of the provider process.
    pub workdir: PathBuf,
}

/// Provider reply with usage metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency: Duration,
}

/// A text-completion capability.
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Complete `request`. Timeouts, cancellation and tool failures are
    /// errors.
    fn complete(&self, request: &CompletionRequest, cancel: &CancelToken) -> Result<Completion>;
}

/// Runs a configured CLI and reads the completion from its stdout.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: String,
    profile: ProviderProfile,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(name: impl Into<String>, profile: ProviderProfile, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            profile,
            timeout,
        }
    }

    /// Build the process for `request`.
    ///
    /// The template is split into words before substitution, so a prompt
    /// with quotes or newlines stays one argument.
    fn command(&self, request: &CompletionRequest) -> Result<Command> {
        let words = shell_words::split(&self.profile.command).with_context(|| {
            format!(
                "provider '{}' command '{}' cannot be parsed",
                self.name, self.profile.command
            )
        })?;

        let variables = vars([
            ("model", request.model.clone()),
            ("prompt", request.prompt.clone()),
            ("prompt_file", request.prompt_file.to_string_lossy().into_owned()),
            ("max_tokens", request.max_tokens.to_string()),
            ("step", request.step.as_str().to_string()),
        ]);
        let args = words
            .iter()
            .map(|word| render_template(word, &variables))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("provider '{}' command template: {}", self.name, e))?;

        let (program, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("provider '{}' command is empty", self.name))?;
        let mut cmd = Command::new(program);
        cmd.args(rest).current_dir(&request.workdir);
        for (key, value) in &self.profile.environment {
            cmd.env(key, value);
        }
        Ok(cmd)
    }
}

impl LlmProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, request: &CompletionRequest, cancel: &CancelToken) -> Result<Completion> {
        let cmd = self.command(request)?;
        debug!(provider = %self.name, model = %request.model, step = %request.step, "invoking provider");

        let output = run_command(cmd, self.timeout, cancel, DEFAULT_OUTPUT_LIMIT)
            .with_context(|| format!("provider '{}' could not be started", self.name))?;

        match output.termination {
            Termination::TimedOut => bail!(
                "provider '{}' timed out after {}ms",
                self.name,
                self.timeout.as_millis()
            ),
            Termination::Cancelled => bail!("provider '{}' was cancelled", self.name),
            Termination::Exited if !output.status.success() => bail!(
                "provider '{}' exited with {}: {}",
                self.name,
                output.status,
                output.tail(20)
            ),
            Termination::Exited => {}
        }

        let text = output.stdout_lossy();
        if text.trim().is_empty() {
            bail!("provider '{}' returned no output", self.name);
        }

        Ok(Completion {
            input_tokens: estimate_tokens(&request.prompt),
            output_tokens: estimate_tokens(&text),
            text,
            latency: output.elapsed,
        })
    }
}

/// Rough token count for providers that do not report usage.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(workdir: &std::path::Path) -> CompletionRequest {
        CompletionRequest {
            step: Step::Plan,
            model: "opus".to_string(),
            prompt: "say \"hi\"\nplease".to_string(),
            prompt_file: workdir.join("plan.prompt.md"),
            max_tokens: 100,
            workdir: workdir.to_path_buf(),
        }
    }

    fn provider(command: &str, timeout: Duration) -> CommandProvider {
        CommandProvider::new(
            "test",
            ProviderProfile {
                command: command.to_string(),
                ..Default::default()
            },
            timeout,
        )
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_placeholders_substituted_per_argument() {
        let temp = TempDir::new().unwrap();
        let cmd = provider("llm --model {model} -p {prompt} --max {max_tokens}", Duration::from_secs(5))
            .command(&request(temp.path()))
            .unwrap();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["--model", "opus", "-p", "say \"hi\"\nplease", "--max", "100"]
        );
    }

    #[test]
    fn test_unknown_placeholder_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = provider("llm {temperature}", Duration::from_secs(5))
            .command(&request(temp.path()))
            .unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_becomes_completion() {
        let temp = TempDir::new().unwrap();
        let completion = provider("echo plan for {model}", Duration::from_secs(10))
            .complete(&request(temp.path()), &CancelToken::new())
            .unwrap();
        assert_eq!(completion.text.trim(), "plan for opus");
        assert!(completion.input_tokens > 0);
        assert!(completion.output_tokens > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_failures_and_timeouts_are_errors() {
        let temp = TempDir::new().unwrap();
        let err = provider("false", Duration::from_secs(10))
            .complete(&request(temp.path()), &CancelToken::new())
            .unwrap_err();
        assert!(err.to_string().contains("exited with"));

        let err = provider("sleep 5", Duration::from_millis(200))
            .complete(&request(temp.path()), &CancelToken::new())
            .unwrap_err();
        assert!(err.to_string().contains("timed out after 200ms"));
    }
}
