use serde::Serialize;

use super::{ApiRole, Persona, Turn};

pub const BASE_INSTRUCTION: &str = "历史消息用 `[名字]内容` 标签指示发言者，你回复时**不要加入任何标签或姓名前缀**，且禁止括号动作；\
一次仅回复 1-2 句；保持角色一致；以用户为中心。";

pub const PERSONA_LEAD_IN: &str = "你的角色设定：";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl From<ApiRole> for MessageRole {
    fn from(role: ApiRole) -> Self {
        match role {
            ApiRole::User => MessageRole::User,
            ApiRole::Assistant => MessageRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

pub fn system_prompt(persona: &Persona) -> String {
    format!("{BASE_INSTRUCTION}\n{PERSONA_LEAD_IN}{}", persona.system)
}

/// Builds the request for one persona: its system prompt followed by the
/// whole transcript, every turn re-tagged as `[speaker] content`.
pub fn encode_request(persona: &Persona, transcript: &[Turn]) -> Vec<Message> {
    std::iter::once(Message {
        role: MessageRole::System,
        content: system_prompt(persona),
    })
    .chain(transcript.iter().map(|turn| Message {
        role: turn.role.into(),
        content: turn.tagged(),
    }))
    .collect()
}
