use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// One line typed at the current prompt.
    Input { text: String },
    Ping,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    Welcome { user_id: u64, user_name: String },
    Text { body: String },
    Object { value: serde_json::Value },
    Error { message: String },
    Pong,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: u64,
    pub kind: String,
    pub state: String,
    pub players: usize,
    pub capacity: usize,
    pub owner: u64,
    pub locked: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberInfo {
    pub id: u64,
    pub name: String,
    pub score: i64,
    pub online: bool,
    pub owner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_input_uses_tagged_layout() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"Input","data":{"text":"33"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Input { text } if text == "33"));
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"Ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));
    }

    #[test]
    fn server_text_serializes_with_body() {
        let json = serde_json::to_value(ServerMessage::Text {
            body: "hello".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "Text");
        assert_eq!(json["data"]["body"], "hello");
    }
}
