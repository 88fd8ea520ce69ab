use std::sync::Arc;

use async_trait::async_trait;
use smart_login_gate::{SignalSink, SignalSource};
use smart_login_types::{ConditionId, FailureKind, RemediationTarget};
use tracing::{debug, info};

use crate::config::VoiceConfig;
use crate::platform::{
    PermissionAuthority, RecognitionOutcome, SpeechRecognizer, MICROPHONE_PERMISSIONS,
};

/// Case-insensitive containment. An empty password never matches.
pub fn password_matches(transcript: &str, password: &str) -> bool {
    if password.is_empty() {
        return false;
    }
    transcript
        .to_lowercase()
        .contains(&password.to_lowercase())
}

/// Spoken-password check.
///
/// Each tap runs one recognition round trip. A cancelled recognition
/// leaves the condition untouched.
pub struct VoiceSource {
    permissions: Arc<dyn PermissionAuthority>,
    recognizer: Arc<dyn SpeechRecognizer>,
    config: VoiceConfig,
}

impl VoiceSource {
    pub fn new(
        permissions: Arc<dyn PermissionAuthority>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: VoiceConfig,
    ) -> Self {
        Self {
            permissions,
            recognizer,
            config,
        }
    }

    async fn ensure_microphone(&self, sink: &SignalSink) -> bool {
        if self.permissions.has_permissions(MICROPHONE_PERMISSIONS) {
            return true;
        }

        let grant = self.permissions.request(MICROPHONE_PERMISSIONS).await;
        if grant.all_granted() {
            return true;
        }

        info!(denied = ?grant.denied, "Microphone permission denied");
        sink.fail("❌ Microphone Permission Denied", FailureKind::PermissionDenied)
            .await;
        sink.remediate(
            RemediationTarget::AppSettings,
            "Permissions Required",
            "Microphone permission is required to verify your voice password.",
        )
        .await;
        false
    }
}

#[async_trait]
impl SignalSource for VoiceSource {
    fn condition(&self) -> ConditionId {
        ConditionId::VoiceCommand
    }

    async fn start(&self, sink: SignalSink) {
        if !self.ensure_microphone(&sink).await {
            return;
        }

        let outcome = self
            .recognizer
            .recognize(&self.config.password, &self.config.locale)
            .await;

        match outcome {
            RecognitionOutcome::Transcript(transcript) => {
                if password_matches(&transcript, &self.config.password) {
                    info!("Voice password matched");
                    sink.pass("✔ Password matched").await;
                } else {
                    debug!("Voice password mismatch");
                    sink.fail("❌ Wrong Password", FailureKind::NotFound).await;
                }
            }
            RecognitionOutcome::Cancelled => {
                debug!("Recognition cancelled");
            }
            RecognitionOutcome::Unavailable => {
                sink.toast("Speech recognition not supported").await;
            }
        }
    }

    // One-shot round trip: nothing stays registered.
    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Permission;
    use crate::simulated::{SimulatedPermissions, SimulatedRecognizer};
    use smart_login_gate::SourceOutput;
    use smart_login_types::Notice;
    use tokio::sync::mpsc;

    #[test]
    fn matching_is_case_insensitive_containment() {
        assert!(password_matches("my password is Password123", "Password"));
        assert!(password_matches("PASSWORD", "password"));
        assert!(!password_matches("pass", "Password"));
        assert!(!password_matches("anything", ""));
    }

    async fn run(source: &VoiceSource) -> Vec<SourceOutput> {
        let (tx, mut rx) = mpsc::channel(8);
        source
            .start(SignalSink::new(ConditionId::VoiceCommand, tx))
            .await;
        let mut out = Vec::new();
        while let Some(output) = rx.recv().await {
            out.push(output);
        }
        out
    }

    #[tokio::test]
    async fn transcript_containing_password_passes() {
        let source = VoiceSource::new(
            Arc::new(SimulatedPermissions::granting_all()),
            Arc::new(SimulatedRecognizer::new(vec![RecognitionOutcome::Transcript(
                "my password is Password123".into(),
            )])),
            VoiceConfig::default(),
        );

        let out = run(&source).await;
        assert!(matches!(&out[..], [SourceOutput::Signal(e)] if e.passed));
    }

    #[tokio::test]
    async fn cancelled_recognition_changes_nothing() {
        let source = VoiceSource::new(
            Arc::new(SimulatedPermissions::granting_all()),
            Arc::new(SimulatedRecognizer::new(vec![RecognitionOutcome::Cancelled])),
            VoiceConfig::default(),
        );

        assert!(run(&source).await.is_empty());
    }

    #[tokio::test]
    async fn denied_microphone_prompts_settings() {
        let permissions = Arc::new(SimulatedPermissions::denying(&[Permission::RecordAudio]));
        let recognizer = Arc::new(SimulatedRecognizer::new(vec![]));
        let source = VoiceSource::new(permissions, recognizer.clone(), VoiceConfig::default());

        let out = run(&source).await;
        assert_eq!(out.len(), 2);
        assert!(matches!(
            &out[0],
            SourceOutput::Signal(e) if e.failure == Some(FailureKind::PermissionDenied)
        ));
        assert!(matches!(
            &out[1],
            SourceOutput::Notice(Notice::Remediation {
                target: RemediationTarget::AppSettings,
                ..
            })
        ));
        assert_eq!(recognizer.calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_recognizer_raises_toast_only() {
        let source = VoiceSource::new(
            Arc::new(SimulatedPermissions::granting_all()),
            Arc::new(SimulatedRecognizer::new(vec![RecognitionOutcome::Unavailable])),
            VoiceConfig::default(),
        );

        let out = run(&source).await;
        assert!(matches!(
            &out[..],
            [SourceOutput::Notice(Notice::Toast { message, .. })]
                if message == "Speech recognition not supported"
        ));
    }

    #[tokio::test]
    async fn granted_prompt_recognizes_once() {
        let permissions = Arc::new(SimulatedPermissions::prompting());
        let recognizer = Arc::new(SimulatedRecognizer::new(vec![RecognitionOutcome::Transcript(
            "password".into(),
        )]));
        let source = VoiceSource::new(permissions.clone(), recognizer.clone(), VoiceConfig::default());

        let out = run(&source).await;
        assert!(matches!(&out[..], [SourceOutput::Signal(e)] if e.passed));
        assert_eq!(permissions.requests(), 1);
        assert_eq!(recognizer.calls(), 1);
    }
}
