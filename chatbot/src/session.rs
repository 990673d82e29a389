use serde::Serialize;

use crate::{
    message::{Message, Transcript},
    model::{GenerationError, GenerationParams, TextGenerator},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Generating,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Conversation state of one user session.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Transcript,
    state: SessionState,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs one user turn against `model`.
    ///
    /// The user message is recorded before the model is called. On success
    /// the first candidate becomes the assistant message and is returned; on
    /// failure the transcript keeps the user message only.
    pub async fn submit(
        &mut self,
        prompt: &str,
        model: &dyn TextGenerator,
    ) -> Result<&Message, ChatError> {
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        self.transcript.push(Message::user(prompt));

        let reply = {
            let _generating = Generating::enter(&mut self.state);
            log::info!("Generating response with {}", model.model_id());
            model
                .generate(prompt, GenerationParams::default())
                .await
                .and_then(|candidates| {
                    candidates
                        .into_iter()
                        .next()
                        .ok_or(GenerationError::Empty)
                })
        };

        match reply {
            Ok(candidate) => Ok(self
                .transcript
                .push(Message::assistant(candidate.generated_text))),
            Err(err) => {
                log::warn!("Generation with {} failed: {err}", model.model_id());
                Err(err.into())
            }
        }
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }
}

/// Marks the session as generating until dropped, so an abandoned call still
/// returns the session to idle.
struct Generating<'a>(&'a mut SessionState);

impl<'a> Generating<'a> {
    fn enter(state: &'a mut SessionState) -> Self {
        *state = SessionState::Generating;
        Self(state)
    }
}

impl Drop for Generating<'_> {
    fn drop(&mut self) {
        *self.0 = SessionState::Idle;
    }
}
