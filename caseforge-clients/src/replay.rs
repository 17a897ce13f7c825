// caseforge-clients/src/replay.rs
// ============================================================================
// Module: Mock Replay Client
// Description: Deterministic stand-in for a trajectory-to-video vendor.
// Purpose: Implement ReplayClient without a network dependency.
// Dependencies: async-trait, caseforge-core
// ============================================================================

use async_trait::async_trait;
use caseforge_core::interfaces::clients::Perspective;
use caseforge_core::interfaces::clients::ReplayClient;
use caseforge_core::interfaces::clients::ReplayInput;
use caseforge_core::interfaces::clients::ReplayOutput;
use caseforge_core::ClientError;

use crate::common::FailureTriggers;

/// Deterministic [`ReplayClient`] mock.
pub struct MockReplayClient {
    triggers: FailureTriggers,
}

impl MockReplayClient {
    /// Builds a mock with no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self { triggers: FailureTriggers::new() }
    }

    /// Builds a mock with a custom failure-trigger table, scanned against
    /// the input's free-text scene description, if any.
    #[must_use]
    pub fn with_triggers(triggers: FailureTriggers) -> Self {
        Self { triggers }
    }
}

impl Default for MockReplayClient {
    fn default() -> Self {
        Self::new()
    }
}

fn perspective_label(perspective: Perspective) -> &'static str {
    match perspective {
        Perspective::FirstPerson => "first-person",
        Perspective::ThirdPerson => "third-person",
    }
}

#[async_trait]
impl ReplayClient for MockReplayClient {
    async fn generate_replay(&self, input: ReplayInput) -> Result<ReplayOutput, ClientError> {
        if input.trajectory_id.is_empty() {
            return Err(ClientError::InvalidInput("trajectory_id must be non-empty".to_string()));
        }
        if let Some(description) = &input.scene_description {
            if let Some(error) = self.triggers.check(description) {
                return Err(error);
            }
        }

        let label = perspective_label(input.perspective);
        Ok(ReplayOutput {
            video_asset_key: format!("replays/{}/{}-{label}.mp4", input.case_id, input.trajectory_id),
            thumbnail_asset_key: format!("replays/{}/{}-{label}_thumb.png", input.case_id, input.trajectory_id),
            frame_count: input.frame_count,
            fps: 25,
            duration_ms: u64::from(input.frame_count) * 1000 / 25,
            resolution: input.resolution,
            model_used: "mock-replay-v1".to_string(),
            generation_time_ms: 3000,
        })
    }
}

#[cfg(test)]
mod tests {
    use caseforge_core::domain::identifiers::CaseId;
    use caseforge_core::interfaces::clients::DEFAULT_REPLAY_FRAME_COUNT;

    use super::*;

    fn input(trajectory_id: &str) -> ReplayInput {
        ReplayInput {
            case_id: CaseId::new("case-1"),
            trajectory_id: trajectory_id.to_string(),
            perspective: Perspective::ThirdPerson,
            frame_count: DEFAULT_REPLAY_FRAME_COUNT,
            resolution: "720p".to_string(),
            reference_image_key: None,
            scene_description: None,
            camera_pose_hint: None,
        }
    }

    #[tokio::test]
    async fn generate_replay_rejects_empty_trajectory_id() {
        let client = MockReplayClient::new();
        let result = client.generate_replay(input("")).await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn generate_replay_derives_duration_from_frame_count() {
        let client = MockReplayClient::new();
        let output = client.generate_replay(input("traj-1")).await.expect("generation succeeds");
        assert_eq!(output.frame_count, DEFAULT_REPLAY_FRAME_COUNT);
        assert_eq!(output.duration_ms, 5000);
    }

    #[tokio::test]
    async fn generate_replay_honors_failure_triggers_on_scene_description() {
        let triggers = FailureTriggers::new().with_trigger("server-error", ClientError::VendorFatal("HTTP 500".to_string()));
        let client = MockReplayClient::with_triggers(triggers);
        let mut replay_input = input("traj-1");
        replay_input.scene_description = Some("a server-error occurred upstream".to_string());
        let result = client.generate_replay(replay_input).await;
        assert!(matches!(result, Err(ClientError::VendorFatal(_))));
    }
}
