//! Workflow phases: which input a session accepts next.

use serde::{Deserialize, Serialize};

use crate::draft::Draft;

/// Where a user is in the setup → compose → revise → confirm → send workflow.
///
/// Phases that need a draft carry it, so a session can never wait for
/// recipients without something to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    /// No workflow in progress.
    #[default]
    Idle,
    /// `/setup` started; next text is the sender address.
    AwaitingSetupAddress,
    /// Address captured; next text is the transport secret.
    AwaitingSetupSecret { address: String },
    /// `/compose` started; next text describes the email.
    AwaitingContent,
    /// A draft exists; next text revises it, `/confirm` moves on.
    AwaitingRevisionOrSend { draft: Draft },
    /// Confirmed; next text is the recipient list.
    AwaitingRecipients { draft: Draft },
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Self::Idle => PhaseKind::Idle,
            Self::AwaitingSetupAddress => PhaseKind::AwaitingSetupAddress,
            Self::AwaitingSetupSecret { .. } => PhaseKind::AwaitingSetupSecret,
            Self::AwaitingContent => PhaseKind::AwaitingContent,
            Self::AwaitingRevisionOrSend { .. } => PhaseKind::AwaitingRevisionOrSend,
            Self::AwaitingRecipients { .. } => PhaseKind::AwaitingRecipients,
        }
    }

    /// Whether the next text is raw setup input (address or secret), so
    /// slash-prefixed text that is not a known command is taken as input.
    pub fn takes_raw_input(&self) -> bool {
        matches!(
            self,
            Self::AwaitingSetupAddress | Self::AwaitingSetupSecret { .. }
        )
    }

    /// The draft carried by this phase, if any.
    pub fn draft(&self) -> Option<&Draft> {
        match self {
            Self::AwaitingRevisionOrSend { draft } | Self::AwaitingRecipients { draft } => {
                Some(draft)
            }
            Self::Idle
            | Self::AwaitingSetupAddress
            | Self::AwaitingSetupSecret { .. }
            | Self::AwaitingContent => None,
        }
    }
}

/// Payload-free mirror of [`Phase`] for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Idle,
    AwaitingSetupAddress,
    AwaitingSetupSecret,
    AwaitingContent,
    AwaitingRevisionOrSend,
    AwaitingRecipients,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingSetupAddress => "awaiting_setup_address",
            Self::AwaitingSetupSecret => "awaiting_setup_secret",
            Self::AwaitingContent => "awaiting_content",
            Self::AwaitingRevisionOrSend => "awaiting_revision_or_send",
            Self::AwaitingRecipients => "awaiting_recipients",
        };
        write!(f, "{s}")
    }
}
