//! Relays free-text chat to the configured text generator.

use std::sync::{Arc, LazyLock};

use craftbot_core::{GeneratorError, TextGenerator};
use regex_lite::Regex;
use tracing::debug;

static ACTION_MARKUP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<action:[^>]*>").ok());

/// Remove embedded `<action:...>` tags and tidy the whitespace left behind.
pub fn strip_action_markup(text: &str) -> String {
    let stripped = match ACTION_MARKUP.as_ref() {
        Some(re) => re.replace_all(text, ""),
        None => text.into(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct ChatRelay {
    generator: Option<Arc<dyn TextGenerator>>,
    persona: String,
    name: String,
}

impl ChatRelay {
    /// `persona` may reference `{name}` and `{message}`.
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        persona: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            persona: persona.into(),
            name: name.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub fn render_prompt(&self, message: &str) -> String {
        let prompt = self.persona.replace("{name}", &self.name);
        if prompt.contains("{message}") {
            prompt.replace("{message}", message)
        } else {
            format!("{prompt}\n{message}")
        }
    }

    /// Generate a reply to `message`, ready to send as chat.
    pub async fn reply(&self, message: &str) -> Result<String, GeneratorError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| GeneratorError::NotConfigured("no API key".into()))?;

        let raw = generator.generate(&self.render_prompt(message)).await?;
        let reply = strip_action_markup(&raw);
        debug!(generator = generator.name(), chars = reply.len(), "Generated reply");
        if reply.is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedGenerator;

    #[test]
    fn strips_markup_and_collapses_spaces() {
        assert_eq!(
            strip_action_markup("Sure! <action:follow player=alex> On my way."),
            "Sure! On my way."
        );
        assert_eq!(strip_action_markup("plain"), "plain");
    }

    #[test]
    fn prompt_template_substitution() {
        let relay = ChatRelay::new(None, "You are {name}. Player says: {message}", "Aisha");
        assert_eq!(relay.render_prompt("hi"), "You are Aisha. Player says: hi");

        let relay = ChatRelay::new(None, "You are {name}.", "Aisha");
        assert_eq!(relay.render_prompt("hi"), "You are Aisha.\nhi");
    }

    #[tokio::test]
    async fn unconfigured_relay_reports_not_configured() {
        let relay = ChatRelay::new(None, "{message}", "Aisha");
        assert!(matches!(
            relay.reply("hello").await,
            Err(GeneratorError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn markup_only_reply_is_empty() {
        let generator = ScriptedGenerator::new(vec![
            Ok("<action:jump>".into()),
            Ok("Hello <action:wave> there".into()),
        ]);
        let relay = ChatRelay::new(Some(generator.clone()), "{name}: {message}", "Aisha");

        assert!(matches!(
            relay.reply("hi").await,
            Err(GeneratorError::EmptyResponse)
        ));
        assert_eq!(relay.reply("hi").await.unwrap(), "Hello there");
        assert_eq!(generator.prompts(), vec!["Aisha: hi", "Aisha: hi"]);
    }
}
