use anyhow::{Context, Result};

/// Questions put to the human operator.
pub(crate) trait Interaction {
    /// Ask a yes/no question; empty input selects `default`.
    fn ask_yes_no(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Ask for free text; empty input selects `default`.
    fn ask_text(&mut self, prompt: &str, default: &str) -> Result<String>;

    /// Block until the operator acknowledges `message`.
    fn pause(&mut self, message: &str) -> Result<()>;
}

/// Interpret a yes/no answer. Returns `None` for input that is neither.
pub(crate) fn parse_yes_no(input: &str, default: bool) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub(crate) struct Terminal;

impl Interaction for Terminal {
    fn ask_yes_no(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        let answer = dialoguer::Input::<String>::new()
            .with_prompt(format!("{question} [{hint}]"))
            .allow_empty(true)
            .validate_with(|s: &String| -> Result<(), &str> {
                parse_yes_no(s, default)
                    .map(|_| ())
                    .ok_or("Please answer yes or no")
            })
            .interact_text()
            .context("prompting")?;
        Ok(parse_yes_no(&answer, default).unwrap_or(default))
    }

    fn ask_text(&mut self, prompt: &str, default: &str) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .default(default.to_owned())
            .interact_text()
            .context("prompting")
    }

    fn pause(&mut self, message: &str) -> Result<()> {
        dialoguer::Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text()
            .context("prompting")?;
        Ok(())
    }
}
