pub(crate) mod encoder;
pub(crate) mod noise;
pub(crate) mod prefix;
pub(crate) mod segment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub system: String,
}

/// Role a turn is replayed under when the transcript is sent to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRole {
    User,
    Assistant,
}

impl ApiRole {
    pub fn for_speaker(speaker: &str, user_alias: &str) -> Self {
        if speaker == user_alias {
            ApiRole::User
        } else {
            ApiRole::Assistant
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: String,
    pub role: ApiRole,
    pub content: String,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, user_alias: &str, content: impl Into<String>) -> Self {
        let speaker = speaker.into();
        let role = ApiRole::for_speaker(&speaker, user_alias);
        Self {
            speaker,
            role,
            content: content.into(),
        }
    }

    /// `[speaker] content`, the form every turn takes when replayed to a model.
    pub fn tagged(&self) -> String {
        format!("[{}] {}", self.speaker, self.content)
    }
}

/// Append-only record of a session. Only [`Transcript::clear`] removes turns.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Speakers recognised in a round: the user alias followed by every persona name.
pub fn names_pool(user_alias: &str, personas: &[Persona]) -> Vec<String> {
    std::iter::once(user_alias.to_owned())
        .chain(personas.iter().map(|persona| persona.name.clone()))
        .collect()
}
