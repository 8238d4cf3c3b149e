use serde::{Deserialize, Serialize};

/// Server to client push of one completed reload.
///
/// Both fields are themselves JSON documents, carried as strings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReloadMessage {
    pub model_data: String,
    pub action_data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Ask for the last published reload, if there is one.
    RequestState,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ClientMessage, ReloadMessage};

    #[test]
    fn reload_message_field_names() {
        let message = ReloadMessage {
            model_data: "{\"vertexPositions\":[]}".to_string(),
            action_data: "{}".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "modelData": "{\"vertexPositions\":[]}",
                "actionData": "{}"
            })
        );
    }

    #[test]
    fn request_state_is_tagged() {
        assert_eq!(
            serde_json::to_string(&ClientMessage::RequestState).unwrap(),
            r#"{"type":"requestState"}"#
        );
        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"requestState"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::RequestState);
    }
}
