//! `parley batch`: answers one math question for an evaluation harness.
//!
//! The model only translates the question into an expression. The expression
//! is evaluated locally and printed as `Answer: <value>`.

use anyhow::{anyhow, bail, Context, Result};
use parley_agent::{ContextBuilder, TurnExecutor};
use parley_core::config::{Config, HistoryPolicy};
use parley_core::{GenerationParameters, Session};
use parley_providers::build_provider;
use tracing::{debug, info};

use crate::select_target;

/// Entry point for `parley batch <prompt> <options> <context>`
pub async fn run_batch(config: &Config, prompt: &str, options: &str, context: &str) -> Result<()> {
    let options: serde_json::Value =
        serde_json::from_str(options).context("Batch options must be valid JSON")?;
    let context: serde_json::Value =
        serde_json::from_str(context).context("Batch context must be valid JSON")?;
    debug!("Batch options: {}", options);
    debug!("Batch context: {}", context);

    let target = select_target(
        config,
        config.batch.provider.clone(),
        config.batch.model.clone(),
    );
    let provider = build_provider(&config.providers, &target)?;
    info!("Batch using {} / {}", target.provider, target.model);

    let mut builder = ContextBuilder::new(HistoryPolicy::Discard, 0);
    if !config.batch.system_prompt.trim().is_empty() {
        builder = builder.with_system_prompt(config.batch.system_prompt.clone());
    }
    let executor = TurnExecutor::new(provider)
        .with_model(target.model.clone())
        .with_max_tokens(config.chat.max_tokens)
        .with_context(builder);

    let params = GenerationParameters {
        temperature: config.batch.temperature,
        top_k: None,
        top_p: None,
    };

    let answer = solve(&executor, prompt, &params).await?;
    println!("Answer: {}", answer);
    Ok(())
}

/// Ask the model for an expression and evaluate it
async fn solve(
    executor: &TurnExecutor,
    question: &str,
    params: &GenerationParameters,
) -> Result<String> {
    let (reply, _) = executor
        .execute_turn(question, &Session::new(), params)
        .await?;
    debug!("Model reply: {}", reply);

    if let Some(expr) = extract_expression(&reply) {
        debug!("Evaluating expression: {}", expr);
        let value = meval::eval_str(&expr)
            .map_err(|e| anyhow!("Cannot evaluate `{}`: {}", expr, e))?;
        if !value.is_finite() {
            bail!("Expression `{}` has no finite value", expr);
        }
        return Ok(value.to_string());
    }

    // Simple questions may be answered directly
    if let Some(answer) = direct_answer(&reply) {
        debug!("Model answered directly: {}", answer);
        return Ok(answer.to_string());
    }

    bail!("No expression found in model reply: {}", reply.trim())
}

/// Body of the first fenced block, minus an optional language tag
fn extract_expression(reply: &str) -> Option<String> {
    let (_, rest) = reply.split_once("```")?;
    let (block, _) = rest.split_once("```")?;

    let body = match block.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => block,
    };

    let expr = body.trim();
    if expr.is_empty() {
        None
    } else {
        Some(expr.to_string())
    }
}

fn direct_answer(reply: &str) -> Option<&str> {
    reply
        .lines()
        .find_map(|line| line.trim().strip_prefix("Answer:"))
        .map(str::trim)
        .filter(|answer| !answer.is_empty())
}
