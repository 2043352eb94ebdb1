use bedrock_chat_common::Turn;

const HISTORY_LEAD_IN: &str = "Here is the previous conversation:";
const QUESTION_LEAD_IN: &str = "The user now asks:";

/// Flatten prior turns and the current message into one text input, for
/// backends that accept a single text field.
///
/// ```
/// use bedrock_chat_agents::prompt::build_prompt;
/// use bedrock_chat_common::Turn;
///
/// assert_eq!(build_prompt("hi", &[]), "hi");
/// let prompt = build_prompt("hi", &[Turn::user("earlier")]);
/// assert!(prompt.find("USER: earlier").unwrap() < prompt.rfind("hi").unwrap());
/// ```
pub fn build_prompt(message: &str, history: &[Turn]) -> String {
    if history.is_empty() {
        return message.to_string();
    }

    let transcript = history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str().to_uppercase(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{HISTORY_LEAD_IN}\n{transcript}\n\n{QUESTION_LEAD_IN}\n{message}")
}
