//! # Toolsmith Agent
//!
//! The agent drives the model <-> tool loop:
//! 1. The conversation is seeded with a rendered system prompt and the task
//! 2. The model sees the transcript plus every registered tool schema
//! 3. Requested tool calls run in order, each answered by exactly one result
//! 4. The model may define new tools, which are offered from the next turn on
//! 5. The run ends when the completion tool is requested or the turn ceiling is hit
//!
//! A failed completion costs a turn and a short pause, never the run.

mod agent;

pub use agent::{AgentConfig, AgentLoop, RunOutcome, RunState};
