//! Prompt construction for drafting and revising emails.
//!
//! Everything here is a pure function of its inputs: the same username,
//! description and previous draft always produce the same prompt.

use super::model::Draft;

/// System instruction sent with every drafting request.
pub const DRAFT_SYSTEM_PROMPT: &str = "\
You are Smart Mail Bot, an assistant that writes emails on behalf of the user.
Reply with a JSON object holding exactly two string fields: \"subject\" and \"body\".
The body is plain text: no markdown, no HTML, no placeholders left for the user to fill in.";

/// Build the drafting prompt.
///
/// When `previous` is present the full previous draft is embedded so the
/// model edits it instead of starting over.
pub fn draft_prompt(username: &str, description: &str, previous: Option<&Draft>) -> String {
    let mut details = description.trim().to_string();
    if let Some(draft) = previous {
        details.push_str(&format!(
            "\n\nPrevious generated email (revise it according to the request above):\n\
             Subject: {}\n\n{}",
            draft.subject, draft.body
        ));
    }

    format!(
        "Generate an email with the following details: '{details}'. \
         Please ensure the email is professional and concise. \
         The user's name is {username}. \
         Make sure to include a clear subject line and a polite closing. \
         The email should be suitable for sending to a professional contact if the tone is not specified. \
         Make the email in paragraphs, well spaced and easy to read."
    )
}

/// JSON schema for the structured `{subject, body}` reply.
pub fn draft_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "subject": { "type": "STRING" },
            "body": { "type": "STRING" }
        },
        "required": ["subject", "body"],
        "propertyOrdering": ["subject", "body"]
    })
}
