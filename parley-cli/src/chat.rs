//! Interactive terminal chat

use anyhow::Result;
use console::{style, Term};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use parley_agent::TurnExecutor;
use parley_core::{GenerationParameters, Session};
use std::time::Duration;
use tracing::{info, warn};

use crate::client::ApiClient;

/// Where turns are executed
pub enum Backend {
    Local(TurnExecutor),
    Remote(ApiClient),
}

impl Backend {
    pub async fn execute(
        &self,
        user_text: &str,
        session: &Session,
        params: &GenerationParameters,
    ) -> Result<(String, Session)> {
        match self {
            Backend::Local(executor) => Ok(executor.execute_turn(user_text, session, params).await?),
            Backend::Remote(client) => client.chat(user_text, session, params).await,
        }
    }
}

/// A submission that failed; shown where the assistant turn would be
struct FailedTurn {
    user_text: String,
    error: String,
}

pub struct ChatRepl {
    backend: Backend,
    params: GenerationParameters,
    title: String,
}

impl ChatRepl {
    pub fn new(backend: Backend, params: GenerationParameters, title: impl Into<String>) -> Self {
        Self {
            backend,
            params,
            title: title.into(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let term = Term::stdout();
        let mut session = Session::new();
        let mut failed: Option<FailedTurn> = None;

        loop {
            term.clear_screen()?;
            for line in self.render(&session, failed.take().as_ref()) {
                term.write_line(&line)?;
            }

            let input: String = Input::new()
                .with_prompt("You")
                .allow_empty(true)
                .interact_text()?;

            match input.trim() {
                "/quit" | "/exit" => break,
                "/new" => {
                    info!("Starting a new session");
                    session = Session::new();
                    continue;
                }
                _ => {}
            }

            let spinner = spinner();
            let result = self.backend.execute(&input, &session, &self.params).await;
            spinner.finish_and_clear();

            match result {
                Ok((_, updated)) => session = updated,
                Err(e) => {
                    warn!("Turn failed: {:#}", e);
                    failed = Some(FailedTurn {
                        user_text: input,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        Ok(())
    }

    fn render(&self, session: &Session, failed: Option<&FailedTurn>) -> Vec<String> {
        let mut lines = vec![
            style(&self.title).bold().cyan().to_string(),
            style(format!(
                "temperature {} | top_k {} | top_p {}",
                self.params.temperature,
                display_opt(self.params.top_k),
                display_opt(self.params.top_p)
            ))
            .dim()
            .to_string(),
            String::new(),
        ];

        for turn in session.turns() {
            lines.push(format!("{} {}", style("You:").bold().cyan(), turn.user_text));
            lines.push(format!(
                "{} {}",
                style("Assistant:").bold().green(),
                turn.assistant_text
            ));
            lines.push(String::new());
        }

        if let Some(failed) = failed {
            lines.push(format!("{} {}", style("You:").bold().cyan(), failed.user_text));
            lines.push(format!("{} {}", style("Error:").bold().red(), failed.error));
            lines.push(String::new());
        }

        lines.push(
            style("/new starts over, /quit exits")
                .dim()
                .to_string(),
        );
        lines
    }
}

fn display_opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repl() -> ChatRepl {
        ChatRepl::new(
            Backend::Remote(ApiClient::new("http://127.0.0.1:9")),
            GenerationParameters::default(),
            "parley",
        )
    }

    #[test]
    fn test_render_full_transcript_in_order() {
        let session = Session::from_pairs([("first", "one"), ("second", "two")]);
        let lines = repl().render(&session, None).join("\n");

        let first = lines.find("first").unwrap();
        let two = lines.find("two").unwrap();
        assert!(first < two);
        assert!(lines.contains("one"));
        assert!(!lines.contains("Error:"));
    }

    #[test]
    fn test_render_failure_in_place_of_reply() {
        let session = Session::from_pairs([("A", "a")]);
        let failed = FailedTurn {
            user_text: "B".to_string(),
            error: "connection refused".to_string(),
        };
        let lines = repl().render(&session, Some(&failed));

        let error_line = lines.iter().position(|l| l.contains("connection refused")).unwrap();
        assert!(lines[error_line - 1].contains('B'));
        assert!(lines[error_line].contains("Error:"));
    }
}
