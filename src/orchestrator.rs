use crate::completion::CompletionClient;
use crate::transcript::encoder::encode_request;
use crate::transcript::noise::strip_noise;
use crate::transcript::prefix::build_prefix_pattern;
use crate::transcript::segment::split_segments;
use crate::transcript::{Persona, Transcript, Turn, names_pool};

pub const COMPLETION_FAILURE_PREFIX: &str = "⚠️ API 调用失败：";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundWarning {
    NoPersonas,
}

/// Progress reported while a round runs, in the order it happens.
#[derive(Debug)]
pub enum RoundEvent<'a> {
    Turn(&'a Turn),
    Typing(&'a Persona),
    Warning(RoundWarning),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    pub turns_appended: usize,
    pub failed_personas: Vec<String>,
}

/// Runs one round: records the user's message, then lets every persona reply
/// in order. Each persona sees everything appended before it, including the
/// replies of personas earlier in the same round. Completion failures become
/// visible turns and never end the round early.
pub async fn process_round<C, F>(
    user_alias: &str,
    user_message: &str,
    personas: &[Persona],
    transcript: &mut Transcript,
    client: &C,
    mut on_event: F,
) -> RoundSummary
where
    C: CompletionClient,
    F: FnMut(RoundEvent<'_>),
{
    let mut summary = RoundSummary::default();

    on_event(RoundEvent::Turn(
        transcript.push(Turn::new(user_alias, user_alias, user_message)),
    ));
    summary.turns_appended += 1;

    if personas.is_empty() {
        tracing::warn!("round attempted without any persona");
        on_event(RoundEvent::Warning(RoundWarning::NoPersonas));
        return summary;
    }

    let names = names_pool(user_alias, personas);
    let prefix = build_prefix_pattern(&names);
    tracing::debug!(personas = personas.len(), history = transcript.len(), "starting round");

    for persona in personas {
        let messages = encode_request(persona, transcript.turns());
        tracing::debug!(persona = %persona.name, messages = messages.len(), "requesting completion");
        on_event(RoundEvent::Typing(persona));

        let raw = match client.complete(&messages).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(persona = %persona.name, %error, "completion failed");
                summary.failed_personas.push(persona.name.clone());
                format!("{COMPLETION_FAILURE_PREFIX}{error}")
            }
        };

        for segment in split_segments(&raw, &persona.name) {
            let label = segment.speaker.trim();
            let speaker = if names.iter().any(|name| name == label) {
                label
            } else {
                persona.name.as_str()
            };
            let content = strip_noise(&segment.content, prefix.as_ref());

            on_event(RoundEvent::Turn(
                transcript.push(Turn::new(speaker, user_alias, content)),
            ));
            summary.turns_appended += 1;
        }
    }

    summary
}
