use dirtybox_core::StructuredData;
use tracing::debug;

/// Reply shown to the contact when the model output is unusable.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble right now. Could you please repeat that?";

/// The model's answer split into the customer-facing reply and the snapshot
/// it extracted, plus the raw output for the message log.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentTurn {
    pub reply: String,
    pub snapshot: Option<StructuredData>,
    pub raw: String,
}

/// Splits a completion on the REPLY:/JSON: headers. Anything that fails to
/// parse degrades to a reply without a snapshot; a completely empty reply
/// degrades further to [`FALLBACK_REPLY`]. Parsing never fails outright.
pub fn parse_agent_output(content: &str) -> AgentTurn {
    let raw = content.to_owned();

    let Some((reply_part, json_part)) = split_sections(content) else {
        let reply = content.trim();
        return AgentTurn {
            reply: if reply.is_empty() { FALLBACK_REPLY.to_owned() } else { reply.to_owned() },
            snapshot: None,
            raw,
        };
    };

    let reply = reply_part.trim();
    let reply =
        if reply.is_empty() { FALLBACK_REPLY.to_owned() } else { reply.to_owned() };

    AgentTurn { reply, snapshot: parse_snapshot(json_part), raw }
}

fn split_sections(content: &str) -> Option<(&str, &str)> {
    let lower = content.to_ascii_lowercase();
    let reply_start = lower.find("reply:")? + "reply:".len();
    let json_marker = lower[reply_start..].find("json:")? + reply_start;
    let reply_part = &content[reply_start..json_marker];
    let json_part = &content[json_marker + "json:".len()..];
    Some((reply_part, json_part))
}

fn parse_snapshot(json_part: &str) -> Option<StructuredData> {
    let cleaned = strip_code_fence(json_part.trim());

    let value: serde_json::Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(error) => {
            debug!(event_name = "extraction.invalid_json", error = %error, "snapshot discarded");
            return None;
        }
    };

    // The model signals extraction failure with an error object.
    if value.get("error").is_some() {
        return None;
    }

    serde_json::from_value(value).ok()
}

fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
