//! Per-invocation context handed to every command handler.
//!
//! Built once in `Cli::run()` from the global flags. It owns the output
//! context, both local stores, and the only two places that may block on
//! the operator.

use anyhow::Result;

use crate::infra::config::YamlSettingsStore;
use crate::infra::state::JsonSessionStore;
use crate::output::human::HumanRenderer;
use crate::output::json::JsonRenderer;
use crate::output::{OutputContext, Renderer};

/// Environment variables that disable prompts like `--yes` does.
const NON_INTERACTIVE_ENV: &[&str] = &["CI", "EPHEM_YES"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    /// One JSON document on stdout; progress is suppressed.
    Json,
}

/// Whether a command may stop and ask the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompts {
    Ask,
    /// Confirmations take their default; choices are refused.
    AssumeDefaults,
}

impl Prompts {
    fn detect(yes: bool) -> Self {
        let env_says_yes = NON_INTERACTIVE_ENV
            .iter()
            .any(|var| std::env::var_os(var).is_some());
        if yes || env_says_yes {
            Self::AssumeDefaults
        } else {
            Self::Ask
        }
    }
}

/// Global flags, as parsed by clap.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppFlags {
    pub json: bool,
    pub quiet: bool,
    pub no_color: bool,
    pub yes: bool,
}

pub struct AppContext {
    pub output: OutputContext,
    pub mode: OutputMode,
    pub prompts: Prompts,
    /// `~/.ephem/config.yaml`, or `$EPHEM_CONFIG`.
    pub settings_store: YamlSettingsStore,
    /// `~/.ephem/session.json`.
    pub session_store: JsonSessionStore,
}

impl AppContext {
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new(flags: AppFlags) -> Result<Self> {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Ok(Self {
            output: OutputContext::new(flags.no_color, flags.quiet || flags.json),
            mode,
            prompts: Prompts::detect(flags.yes),
            settings_store: YamlSettingsStore,
            session_store: JsonSessionStore::new()?,
        })
    }

    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Ask a yes/no question, or take `default` when prompts are off.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.prompts == Prompts::AssumeDefaults {
            return Ok(default);
        }
        Ok(dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    /// Let the operator pick one of `items`. `None` when prompts are off,
    /// since there is no safe default to assume.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails.
    pub fn choose(&self, prompt: &str, items: &[String]) -> Result<Option<usize>> {
        if self.prompts == Prompts::AssumeDefaults {
            return Ok(None);
        }
        let index = dialoguer::Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()?;
        Ok(Some(index))
    }
}
