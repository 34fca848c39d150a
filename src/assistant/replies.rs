//! User-facing reply texts.

use crate::draft::Draft;
use crate::error::DeliveryError;
use crate::mailer::Recipients;

pub const SETUP_ADDRESS_PROMPT: &str =
    "Let's set up your sender account. Please enter the email address you want to send from.";

pub const BLANK_ADDRESS: &str = "Please enter a sender email address, or /setup to start over.";

pub const BLANK_SECRET: &str =
    "Please enter the SMTP password (or app password) for your sender address.";

pub const SETUP_REQUIRED: &str =
    "You need to set up your sender account first. Use /setup to enter your email address and SMTP password.";

pub const GENERATING: &str = "Generating your email, please wait...";

pub const GENERATION_FAILED: &str =
    "Sorry, I couldn't generate your email. Please try again or /compose to restart.";

pub const REVISION_FAILED: &str =
    "Sorry, I couldn't modify your email. Please try again or /compose to restart.";

pub const BLANK_DESCRIPTION: &str =
    "Please describe the email you'd like to send, or /compose to restart.";

pub const RECIPIENTS_PROMPT: &str = "Please enter the recipient email address(es), separated by commas if sending to multiple people.";

pub const ALREADY_AWAITING_RECIPIENTS: &str =
    "I'm already waiting for recipient email addresses. Please enter them, separated by commas.";

pub const NOTHING_TO_CONFIRM: &str = "Please compose and review your email first using /compose.";

pub const NO_RECIPIENTS: &str =
    "No valid recipient emails detected. Please enter at least one email address.";

pub const SENDING: &str = "Sending email...";

pub const FALLBACK: &str = "I'm not sure what to do with that message. Use /compose to start a new email or /help for instructions.";

pub const UNKNOWN_COMMAND: &str = "I don't know that command. Use /help to see what I can do.";

pub const UNEXPECTED_ERROR: &str =
    "An unexpected error occurred. Please use /compose to start over.";

pub fn help(username: &str) -> String {
    format!(
        "Hello {username}! I'm Smart Mail Bot.\n\n\
         How to use me:\n\
         1. Use /setup to enter the email address you send from and its SMTP password.\n\
         2. Use /compose to start writing a professional email.\n\
         3. I'll ask for the subject or a brief description.\n\
         4. I'll generate a draft. You can modify it by sending a new prompt, or use /confirm when ready.\n\
         5. When you use /confirm, I'll ask for recipient email(s).\n\
         6. Enter one or more emails (comma-separated). I'll send your email and confirm.\n\
         You can restart anytime with /compose."
    )
}

pub fn secret_prompt(address: &str) -> String {
    format!(
        "Got it, I'll send from {address}. Now enter the SMTP password (or app password) for that account. \
         I'll delete your message once I've read it."
    )
}

pub fn setup_complete(address: &str) -> String {
    format!("✅ Setup complete. Emails will be sent from {address}. Use /compose to write one.")
}

pub fn compose_prompt(username: &str) -> String {
    format!(
        "Great, {username}! Please provide the subject or a brief description of the email you'd like to send in any tone."
    )
}

pub fn draft_ready(draft: &Draft) -> String {
    format!(
        "Here is your generated email:\n\n{}\n\n\
         If you'd like to modify it, just send a new prompt/description. When you're ready to send, use /confirm.",
        draft.preview()
    )
}

pub fn draft_revised(draft: &Draft) -> String {
    format!(
        "Here is your revised email:\n\n{}\n\n\
         Send another prompt to modify again, or use /confirm when you're ready to send.",
        draft.preview()
    )
}

pub fn sent(recipients: &Recipients) -> String {
    format!("✅ Email sent to: {recipients}")
}

pub fn delivery_failed(err: &DeliveryError) -> String {
    let hint = match err {
        DeliveryError::Configuration { .. } => {
            "the sender or recipient addresses, or the SMTP server settings, look wrong"
        }
        DeliveryError::Protocol { .. } => {
            "the mail server rejected the login or the message; check your sender password with /setup"
        }
        DeliveryError::Network { .. } => "the mail server could not be reached",
    };
    format!("❌ Failed to send email: {hint}. Use /compose to write it again.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_addresses_user_and_lists_commands() {
        let text = help("Ana");
        assert!(text.starts_with("Hello Ana!"));
        for command in ["/setup", "/compose", "/confirm"] {
            assert!(text.contains(command), "missing {command}");
        }
    }

    #[test]
    fn draft_replies_include_preview() {
        let draft = Draft::new("Thanks", "Dear team");
        assert!(draft_ready(&draft).contains("Subject: Thanks\n\nDear team"));
        assert!(draft_revised(&draft).contains("Subject: Thanks\n\nDear team"));
    }

    #[test]
    fn sent_lists_recipients() {
        let recipients = Recipients::parse("a@x.com, b@x.com").unwrap();
        assert_eq!(sent(&recipients), "✅ Email sent to: a@x.com, b@x.com");
    }

    #[test]
    fn delivery_failure_names_the_class() {
        let network = delivery_failed(&DeliveryError::Network {
            reason: "timed out".into(),
        });
        assert!(network.contains("could not be reached"));
        assert!(!network.contains("timed out"));

        let protocol = delivery_failed(&DeliveryError::Protocol {
            reason: "535".into(),
        });
        assert!(protocol.contains("rejected"));
    }
}
