/// Wake-word session state machine.
///
/// Tracks whether the assistant is waiting for a wake phrase, armed for a
/// command, or done, and picks the capture profile (model + window) for the
/// next cycle. Pure: callers feed it filtered transcripts and act on the
/// returned events, so transitions are testable without audio hardware.

use crate::config::SessionConfig;
use crate::constants::session::MIN_INLINE_COMMAND_CHARS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    IdleWaitingForWake,
    ArmedForCommand,
    Exited,
}

/// Capture settings for the next cycle, chosen by session state.
/// Wake probing runs unboundedly, so it gets the fast model and a short
/// window; command capture runs rarely and gets the accurate model.
#[derive(Debug, Clone)]
pub struct CaptureProfile {
    pub model: String,
    pub window_secs: u64,
}

/// What the state machine decided about one filtered transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Wake phrase heard; the next cycle captures a command.
    Armed { wake_phrase: String },
    /// A command is ready for classification.
    Command(String),
    /// Exit phrase heard; the loop should stop.
    Exit,
    /// Transcript had no effect on the session.
    Ignored,
}

pub struct SessionMachine {
    state: SessionState,
    wake_phrases: Vec<String>,
    exit_phrases: Vec<String>,
    require_wake: bool,
    active_wake_phrase: Option<String>,
    wake_profile: CaptureProfile,
    command_profile: CaptureProfile,
}

impl SessionMachine {
    pub fn new(
        config: &SessionConfig,
        wake_profile: CaptureProfile,
        command_profile: CaptureProfile,
    ) -> Self {
        SessionMachine {
            state: SessionState::IdleWaitingForWake,
            wake_phrases: config.wake_phrases.iter().map(|p| p.to_lowercase()).collect(),
            exit_phrases: config.exit_phrases.iter().map(|p| p.to_lowercase()).collect(),
            require_wake: config.require_wake,
            active_wake_phrase: None,
            wake_profile,
            command_profile,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The wake phrase that armed the current command capture, if any.
    pub fn active_wake_phrase(&self) -> Option<&str> {
        self.active_wake_phrase.as_deref()
    }

    /// Whether the next capture is expected to hold a command (armed, or
    /// every cycle in no-wake mode) rather than a wake probe.
    pub fn is_command_cycle(&self) -> bool {
        self.state == SessionState::ArmedForCommand || !self.require_wake
    }

    pub fn capture_profile(&self) -> &CaptureProfile {
        if self.is_command_cycle() {
            &self.command_profile
        } else {
            &self.wake_profile
        }
    }

    /// External interrupt: finish the current cycle, then stop.
    pub fn shutdown(&mut self) {
        self.state = SessionState::Exited;
    }

    /// Feed one filtered, non-empty transcript and advance the machine.
    pub fn observe(&mut self, text: &str) -> SessionEvent {
        if self.state == SessionState::Exited {
            return SessionEvent::Ignored;
        }

        let lowered = text.trim().to_lowercase();

        // Exit phrases win from any state
        if self.exit_phrases.iter().any(|p| lowered.contains(p.as_str())) {
            self.state = SessionState::Exited;
            return SessionEvent::Exit;
        }

        if self.state == SessionState::ArmedForCommand {
            // Single-shot arming: one command per wake
            self.state = SessionState::IdleWaitingForWake;
            self.active_wake_phrase = None;
            return SessionEvent::Command(text.trim().to_string());
        }

        if !self.require_wake {
            return SessionEvent::Command(text.trim().to_string());
        }

        if let Some(wake) = self
            .wake_phrases
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .cloned()
        {
            let remainder = lowered.replace(&wake, "").trim().to_string();
            if remainder.chars().count() >= MIN_INLINE_COMMAND_CHARS {
                // The command arrived in the same breath as the wake phrase:
                // skip the arming acknowledgment and classify it now
                return SessionEvent::Command(remainder);
            }
            self.state = SessionState::ArmedForCommand;
            self.active_wake_phrase = Some(wake.clone());
            return SessionEvent::Armed { wake_phrase: wake };
        }

        SessionEvent::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(require_wake: bool) -> SessionMachine {
        let config = SessionConfig {
            wake_phrases: vec!["hey computer".to_string()],
            exit_phrases: vec!["goodbye computer".to_string(), "stop listening".to_string()],
            require_wake,
        };
        SessionMachine::new(
            &config,
            CaptureProfile { model: "tiny".to_string(), window_secs: 3 },
            CaptureProfile { model: "base".to_string(), window_secs: 8 },
        )
    }

    #[test]
    fn idle_ignores_plain_speech() {
        let mut m = machine(true);
        assert_eq!(m.observe("what a nice day"), SessionEvent::Ignored);
        assert_eq!(m.state(), SessionState::IdleWaitingForWake);
    }

    #[test]
    fn wake_phrase_arms() {
        let mut m = machine(true);
        let event = m.observe("Hey Computer");
        assert_eq!(event, SessionEvent::Armed { wake_phrase: "hey computer".to_string() });
        assert_eq!(m.state(), SessionState::ArmedForCommand);
        assert_eq!(m.active_wake_phrase(), Some("hey computer"));
    }

    #[test]
    fn armed_transcript_becomes_command_then_reidles() {
        let mut m = machine(true);
        m.observe("hey computer");
        let event = m.observe("list files");
        assert_eq!(event, SessionEvent::Command("list files".to_string()));
        // Single-shot: the user must wake again for the next command
        assert_eq!(m.state(), SessionState::IdleWaitingForWake);
        assert_eq!(m.active_wake_phrase(), None);
    }

    #[test]
    fn wake_with_trailing_text_is_an_inline_command() {
        let mut m = machine(true);
        let event = m.observe("hey computer go to desktop");
        assert_eq!(event, SessionEvent::Command("go to desktop".to_string()));
        // No separate armed cycle was spent
        assert_eq!(m.state(), SessionState::IdleWaitingForWake);
    }

    #[test]
    fn wake_with_tiny_trailing_text_just_arms() {
        let mut m = machine(true);
        // Three or fewer leftover chars are transcription residue, not a command
        let event = m.observe("hey computer um");
        assert!(matches!(event, SessionEvent::Armed { .. }));
    }

    #[test]
    fn exit_phrase_wins_from_idle_and_armed() {
        let mut m = machine(true);
        assert_eq!(m.observe("goodbye computer"), SessionEvent::Exit);
        assert_eq!(m.state(), SessionState::Exited);

        let mut m = machine(true);
        m.observe("hey computer");
        assert_eq!(m.observe("stop listening please"), SessionEvent::Exit);
        assert_eq!(m.state(), SessionState::Exited);
    }

    #[test]
    fn exited_is_terminal() {
        let mut m = machine(true);
        m.observe("goodbye computer");
        assert_eq!(m.observe("hey computer"), SessionEvent::Ignored);
        assert_eq!(m.state(), SessionState::Exited);
    }

    #[test]
    fn no_wake_mode_treats_every_transcript_as_command() {
        let mut m = machine(false);
        assert!(m.is_command_cycle());
        assert_eq!(m.observe("list files"), SessionEvent::Command("list files".to_string()));
        // And captures with the accurate profile every cycle
        assert_eq!(m.capture_profile().model, "base");
    }

    #[test]
    fn profile_follows_state() {
        let mut m = machine(true);
        assert_eq!(m.capture_profile().model, "tiny");
        assert_eq!(m.capture_profile().window_secs, 3);

        m.observe("hey computer");
        assert_eq!(m.capture_profile().model, "base");
        assert_eq!(m.capture_profile().window_secs, 8);
    }

    #[test]
    fn shutdown_moves_to_exited() {
        let mut m = machine(true);
        m.shutdown();
        assert_eq!(m.state(), SessionState::Exited);
    }
}
