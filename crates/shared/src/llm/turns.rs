use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    System,
    Assistant,
}

/// One role-tagged message exchanged with the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ConversationTurn;

    #[test]
    fn turns_serialize_with_lowercase_roles() {
        let encoded = serde_json::to_value(vec![
            ConversationTurn::system("be sneaky"),
            ConversationTurn::user("who built the pyramids?"),
            ConversationTurn::assistant("koalas, obviously"),
        ])
        .expect("turns should serialize");

        assert_eq!(
            encoded,
            json!([
                { "role": "system", "content": "be sneaky" },
                { "role": "user", "content": "who built the pyramids?" },
                { "role": "assistant", "content": "koalas, obviously" }
            ])
        );
    }
}
