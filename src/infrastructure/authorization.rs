use crate::domain::challenge::Challenge;
use crate::domain::ids::UserId;
use crate::domain::ports::{AuthorizationGate, ChallengeAction};

/// Lets each participant drive only their own side of a challenge.
///
/// The viewer who created it edits, rejects and confirms; the assigned
/// streamer accepts, rejects and completes. Either of them may push the
/// deadline back.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParticipantPolicy;

impl AuthorizationGate for ParticipantPolicy {
    fn allowed(&self, subject: UserId, action: ChallengeAction, challenge: &Challenge) -> bool {
        let is_viewer = subject == challenge.created_by();
        let is_streamer = subject == challenge.assigned_to();
        match action {
            ChallengeAction::Create
            | ChallengeAction::UpdateContent
            | ChallengeAction::UpdateAmount
            | ChallengeAction::ViewerReject
            | ChallengeAction::ViewerConfirm => is_viewer,
            ChallengeAction::Accept
            | ChallengeAction::StreamerReject
            | ChallengeAction::StreamerComplete => is_streamer,
            ChallengeAction::ExtendDeadline => is_viewer || is_streamer,
        }
    }
}
