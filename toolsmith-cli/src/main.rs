//! # Toolsmith CLI
//!
//! Command-line interface for running the self-extending agent.
//!
//! Usage:
//!   toolsmith <task>
//!   toolsmith -i task.txt -p prompts.yaml --prompt coder
//!   toolsmith --list-prompts -p prompts.yaml
//!
//! Examples:
//!   toolsmith "Fetch the weather for Paris and summarize it"
//!   toolsmith --model openai/gpt-4o -i task.txt
//!   TOOLSMITH_MODEL=local/llama3 toolsmith --base-url http://localhost:11434/v1 "List files"

use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use toolsmith_agent::{AgentConfig, AgentLoop, RunOutcome, RunState};
use toolsmith_error::{Error, Result};
use toolsmith_runtime::{
    AnthropicProvider, InstallerConfig, LlmProvider, OpenAIProvider, PromptPair, ProviderConfig,
    ProviderType, SandboxConfig, ScriptSandbox, ToolExecutor, MAX_TOOL_OUTPUT_LENGTH,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prompt library looked up in the working directory when `--prompts` is not given
const DEFAULT_PROMPTS_FILE: &str = "prompts.yaml";

#[derive(Parser, Debug)]
#[command(name = "toolsmith")]
#[command(author, version, about = "Toolsmith - an agent that builds its own tools")]
struct Cli {
    /// Task to execute (read from --input or stdin when omitted)
    #[arg(trailing_var_arg = true)]
    task: Vec<String>,

    /// Path to a file containing the task
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Path to a YAML prompt library
    #[arg(short, long)]
    prompts: Option<PathBuf>,

    /// Key of the prompt to use from the library
    #[arg(long, default_value = "default")]
    prompt: String,

    /// Print the keys of the prompt library and exit
    #[arg(long)]
    list_prompts: bool,

    /// Model as `provider/model`
    #[arg(long, env = "TOOLSMITH_MODEL", default_value = "anthropic/claude-sonnet-4-20250514")]
    model: String,

    /// Override the provider's API base URL
    #[arg(long, env = "TOOLSMITH_BASE_URL")]
    base_url: Option<String>,

    /// Turn ceiling
    #[arg(long, default_value_t = 50)]
    max_iterations: usize,

    /// Seconds to wait after a failed completion
    #[arg(long, default_value_t = 2)]
    retry_delay_secs: u64,

    /// Character cap for a single tool result
    #[arg(long, default_value_t = MAX_TOOL_OUTPUT_LENGTH)]
    max_tool_output: usize,

    /// Command used by install_package; the package name is appended
    #[arg(long, env = "TOOLSMITH_INSTALLER", default_value = "uv pip install")]
    installer: String,

    /// Timeout for a single model-authored tool invocation
    #[arg(long, default_value_t = 120)]
    tool_timeout_secs: u64,
}

impl Cli {
    fn agent_config(&self, model: &str) -> AgentConfig {
        AgentConfig::default()
            .with_model(model)
            .with_max_iterations(self.max_iterations)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_max_tool_output(self.max_tool_output)
    }

    fn executor(&self) -> Result<ToolExecutor> {
        let sandbox = ScriptSandbox::new(SandboxConfig {
            timeout: Duration::from_secs(self.tool_timeout_secs),
            ..SandboxConfig::default()
        });
        let installer = InstallerConfig::from_command_line(&self.installer)?;
        Ok(ToolExecutor::new(sandbox, installer))
    }

    fn library_path(&self) -> Option<PathBuf> {
        match &self.prompts {
            Some(path) => Some(path.clone()),
            None => {
                let fallback = PathBuf::from(DEFAULT_PROMPTS_FILE);
                fallback.exists().then_some(fallback)
            }
        }
    }
}

/// Ordered `key -> prompt` entries of a YAML library
fn parse_prompt_library(text: &str) -> Result<Vec<(String, PromptPair)>> {
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(text).map_err(|e| {
        Error::config_invalid(format!("invalid prompt library: {}", e))
            .with_operation("cli::parse_prompt_library")
            .set_source(e)
    })?;

    mapping
        .into_iter()
        .map(|(key, value)| {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(Error::config_invalid(format!(
                        "prompt keys must be strings, got {:?}",
                        other
                    )))
                }
            };
            let pair: PromptPair = serde_yaml::from_value(value).map_err(|e| {
                Error::config_invalid(format!("invalid prompt '{}': {}", key, e))
                    .with_operation("cli::parse_prompt_library")
                    .set_source(e)
            })?;
            Ok((key, pair))
        })
        .collect()
}

fn load_prompt_library(path: &Path) -> Result<Vec<(String, PromptPair)>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::from(e)
            .with_operation("cli::load_prompt_library")
            .with_context("path", path.display().to_string())
    })?;
    parse_prompt_library(&text)
}

fn select_prompt(library: Vec<(String, PromptPair)>, key: &str) -> Result<PromptPair> {
    let available: Vec<String> = library.iter().map(|(k, _)| k.clone()).collect();
    library
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, pair)| pair)
        .ok_or_else(|| {
            Error::config_invalid(format!(
                "prompt '{}' not found (available: {})",
                key,
                available.join(", ")
            ))
        })
}

/// Task text from the input file, the trailing arguments, or one line of stdin
fn read_task(cli: &Cli) -> Result<String> {
    let task = if let Some(path) = &cli.input {
        std::fs::read_to_string(path)
            .map_err(|e| {
                Error::from(e)
                    .with_operation("cli::read_task")
                    .with_context("path", path.display().to_string())
            })?
            .trim()
            .to_string()
    } else if !cli.task.is_empty() {
        cli.task.join(" ")
    } else {
        eprint!("Describe the task you want to complete: ");
        std::io::stderr().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line.trim().to_string()
    };

    if task.is_empty() {
        return Err(Error::invalid_argument("No task provided."));
    }
    Ok(task)
}

/// Split `provider/model`; a bare model name is routed by its family
fn parse_model(spec: &str) -> Result<(ProviderType, String)> {
    if let Some((prefix, model)) = spec.split_once('/') {
        let provider = ProviderType::from_prefix(prefix).ok_or_else(|| {
            Error::config_invalid(format!("unknown provider '{}' in model '{}'", prefix, spec))
        })?;
        if model.is_empty() {
            return Err(Error::config_invalid(format!("model name missing in '{}'", spec)));
        }
        return Ok((provider, model.to_string()));
    }

    if spec.is_empty() {
        return Err(Error::config_invalid("model name is empty"));
    }
    let provider = if spec.starts_with("claude") {
        ProviderType::Anthropic
    } else {
        ProviderType::OpenAI
    };
    Ok((provider, spec.to_string()))
}

fn api_key(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::config_invalid(format!("{} is not set", var)).with_context("env", var))
}

async fn run_agent<P: LlmProvider>(
    provider: P,
    config: AgentConfig,
    executor: ToolExecutor,
    prompt: PromptPair,
) -> RunOutcome {
    let mut agent = AgentLoop::with_executor(provider, config, executor);
    agent.run(prompt).await
}

async fn run(cli: Cli) -> Result<RunState> {
    let library = cli.library_path().map(|p| load_prompt_library(&p)).transpose()?;

    if cli.list_prompts {
        match &library {
            Some(entries) => entries.iter().for_each(|(key, _)| println!("{}", key)),
            None => println!("{}", cli.prompt),
        }
        return Ok(RunState::Completed);
    }

    let mut prompt = match library {
        Some(entries) => select_prompt(entries, &cli.prompt)?,
        None if cli.prompt == "default" => PromptPair::with_default_system(""),
        None => {
            return Err(Error::config_invalid(format!(
                "prompt '{}' requested but no prompt library found",
                cli.prompt
            )))
        }
    };
    prompt.user = read_task(&cli)?;

    let (provider_type, model) = parse_model(&cli.model)?;
    let config = cli.agent_config(&model);
    let executor = cli.executor()?;
    info!(provider = ?provider_type, model = %model, "Resolved model");

    let outcome = match provider_type {
        ProviderType::OpenAI => {
            let mut pc = ProviderConfig::openai(api_key("OPENAI_API_KEY")?).with_model(&model);
            if let Some(url) = &cli.base_url {
                pc = pc.with_base_url(url);
            }
            run_agent(OpenAIProvider::new(pc)?, config, executor, prompt).await
        }
        ProviderType::Anthropic => {
            let mut pc = ProviderConfig::anthropic(api_key("ANTHROPIC_API_KEY")?).with_model(&model);
            if let Some(url) = &cli.base_url {
                pc = pc.with_base_url(url);
            }
            run_agent(AnthropicProvider::new(pc)?, config, executor, prompt).await
        }
        ProviderType::Local => {
            let url = cli.base_url.as_deref().unwrap_or("http://localhost:11434/v1");
            let pc = ProviderConfig::local(url, &model);
            run_agent(OpenAIProvider::new(pc)?, config, executor, prompt).await
        }
    };

    info!(
        state = %outcome.state,
        turns = outcome.turns,
        messages = outcome.conversation.len(),
        tokens = outcome.usage.total_tokens(),
        "Run finished"
    );
    Ok(outcome.state)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolsmith=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(RunState::Completed) => ExitCode::SUCCESS,
        Ok(state) => {
            warn!(%state, "Max iterations reached or task completed.");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(kind = %err.kind(), "{}", err);
            eprintln!("Error: {}", err.message());
            ExitCode::from(1)
        }
    }
}
