/// Command dispatch: handler registry, destructive-action confirmation,
/// and outcome recording.
///
/// The dispatcher knows nothing about what a handler does - only that it
/// takes the command's parameters and returns text, nothing, or an error.
/// Handler failures become spoken error text; they never escape past this
/// boundary and never stop the session loop.

use anyhow::Result;
use std::collections::HashMap;

use crate::history::HistoryLog;
use crate::intent::Command;

/// Handler invoked for one action. Returns optional response text.
pub type Handler = Box<dyn FnMut(&HashMap<String, String>) -> Result<Option<String>>>;

/// Fixed response for unmatched input or unregistered actions.
pub const DONT_UNDERSTAND: &str = "I didn't understand that command. Say 'help' for options.";

/// Fixed response for a declined or silent confirmation.
pub const CANCELLED: &str = "Cancelled";

/// Shell verbs that trigger the confirmation sub-protocol. Matched per
/// whitespace-separated word so "warm" never trips the "rm" entry.
const DESTRUCTIVE_VERBS: &[&str] = &[
    "rm", "rmdir", "del", "delete", "format", "kill", "shutdown", "reboot", "restart",
];

/// Transient confirmation state for a destructive command, resolved by a
/// yes/no utterance within the same dispatch call.
struct ConfirmationRequest {
    description: String,
    awaiting: bool,
}

impl ConfirmationRequest {
    fn new(description: String) -> Self {
        ConfirmationRequest {
            description,
            awaiting: true,
        }
    }

    /// An utterance containing "yes" approves; anything else, silence and
    /// timeout included, declines.
    fn resolve(&mut self, reply: Option<&str>) -> bool {
        debug_assert!(self.awaiting, "confirmation resolved twice");
        self.awaiting = false;
        matches!(reply, Some(text) if text.to_lowercase().contains("yes"))
    }
}

pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
    history: HistoryLog,
    confirm_destructive: bool,
    spoken_limit: usize,
}

impl Dispatcher {
    pub fn new(history: HistoryLog, confirm_destructive: bool, spoken_limit: usize) -> Self {
        Dispatcher {
            handlers: HashMap::new(),
            history,
            confirm_destructive,
            spoken_limit,
        }
    }

    pub fn register<F>(&mut self, action: &str, handler: F)
    where
        F: FnMut(&HashMap<String, String>) -> Result<Option<String>> + 'static,
    {
        self.handlers.insert(action.to_string(), Box::new(handler));
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Truncate a response for spoken output. The history always keeps
    /// the full text.
    pub fn spoken(&self, text: &str) -> String {
        if text.chars().count() <= self.spoken_limit {
            return text.to_string();
        }
        let cut: String = text.chars().take(self.spoken_limit).collect();
        format!("{cut}... Full response is in the command history.")
    }

    /// Route one classified command and record the outcome.
    ///
    /// `confirm` runs one extra listen cycle for the destructive-action
    /// sub-protocol: it receives a description of the pending action and
    /// returns the user's utterance, or None for silence/timeout.
    pub fn dispatch(
        &mut self,
        input_text: &str,
        command: &Command,
        confirm: &mut dyn FnMut(&str) -> Option<String>,
    ) -> String {
        // Repeat needs the history, so it lives here rather than in a handler
        if command.action == "repeat" {
            let response = match self.history.last() {
                Some(entry) => entry.result.clone(),
                None => "Nothing to repeat yet.".to_string(),
            };
            self.history.append(input_text, &response);
            return response;
        }

        if self.confirm_destructive {
            if let Some(mut request) = describe_destructive(command) {
                let reply = confirm(&request.description);
                if !request.resolve(reply.as_deref()) {
                    self.history.append(input_text, CANCELLED);
                    return CANCELLED.to_string();
                }
            }
        }

        let response = match self.handlers.get_mut(&command.action) {
            None => DONT_UNDERSTAND.to_string(),
            Some(handler) => match handler(&command.parameters) {
                Ok(Some(text)) => text,
                Ok(None) => "Command completed".to_string(),
                Err(e) => format!("Error: {e:#}"),
            },
        };

        self.history.append(input_text, &response);
        response
    }
}

/// Describe the pending action if the command is destructive.
fn describe_destructive(command: &Command) -> Option<ConfirmationRequest> {
    let description = match command.action.as_str() {
        "delete" => {
            let filename = command.param("filename").unwrap_or("the file");
            format!("About to delete {filename}")
        }
        "shell" => {
            let shell_command = command.param("command")?;
            let destructive = shell_command
                .split_whitespace()
                .any(|word| DESTRUCTIVE_VERBS.contains(&word));
            if !destructive {
                return None;
            }
            format!("About to run potentially destructive command: {shell_command}")
        }
        _ => return None,
    };

    Some(ConfirmationRequest::new(description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Command;

    fn no_confirm() -> impl FnMut(&str) -> Option<String> {
        |_: &str| panic!("confirmation requested unexpectedly")
    }

    #[test]
    fn unknown_action_gets_fixed_response() {
        let mut dispatcher = Dispatcher::new(HistoryLog::in_memory(), true, 200);
        let command = Command::with_param("unknown", "text", "what's the weather");
        let response = dispatcher.dispatch("what's the weather", &command, &mut no_confirm());
        assert_eq!(response, DONT_UNDERSTAND);
    }

    #[test]
    fn handler_result_is_returned_and_recorded() {
        let mut dispatcher = Dispatcher::new(HistoryLog::in_memory(), true, 200);
        dispatcher.register("pwd", |_| Ok(Some("You are in /tmp".to_string())));

        let response = dispatcher.dispatch("where am i", &Command::new("pwd"), &mut no_confirm());
        assert_eq!(response, "You are in /tmp");

        let entry = dispatcher.history().last().unwrap();
        assert_eq!(entry.input, "where am i");
        assert_eq!(entry.result, "You are in /tmp");
    }

    #[test]
    fn handler_error_becomes_spoken_error() {
        let mut dispatcher = Dispatcher::new(HistoryLog::in_memory(), true, 200);
        dispatcher.register("read", |_| Err(anyhow::anyhow!("permission denied")));

        let response = dispatcher.dispatch("read file x", &Command::new("read"), &mut no_confirm());
        assert!(response.starts_with("Error:"));
        assert!(response.contains("permission denied"));
    }

    #[test]
    fn repeat_replays_last_result() {
        let mut dispatcher = Dispatcher::new(HistoryLog::in_memory(), true, 200);
        dispatcher.register("pwd", |_| Ok(Some("You are in /tmp".to_string())));

        dispatcher.dispatch("where am i", &Command::new("pwd"), &mut no_confirm());
        let response =
            dispatcher.dispatch("repeat that", &Command::new("repeat"), &mut no_confirm());
        assert_eq!(response, "You are in /tmp");
    }

    #[test]
    fn repeat_with_empty_history() {
        let mut dispatcher = Dispatcher::new(HistoryLog::in_memory(), true, 200);
        let response = dispatcher.dispatch("repeat", &Command::new("repeat"), &mut no_confirm());
        assert_eq!(response, "Nothing to repeat yet.");
    }

    #[test]
    fn spoken_output_is_truncated_but_history_is_not() {
        let long = "x".repeat(500);
        let mut dispatcher = Dispatcher::new(HistoryLog::in_memory(), true, 200);
        let result = long.clone();
        dispatcher.register("read", move |_| Ok(Some(result.clone())));

        let response = dispatcher.dispatch("read file big", &Command::new("read"), &mut no_confirm());
        assert_eq!(dispatcher.history().last().unwrap().result, long);
        assert!(dispatcher.spoken(&response).chars().count() < 300);
    }

    #[test]
    fn destructive_shell_matches_whole_words_only() {
        let rm = Command::with_param("shell", "command", "rm -rf build");
        assert!(describe_destructive(&rm).is_some());

        let benign = Command::with_param("shell", "command", "echo warm milk");
        assert!(describe_destructive(&benign).is_none());
    }

    #[test]
    fn plain_shell_command_needs_no_confirmation() {
        let mut dispatcher = Dispatcher::new(HistoryLog::in_memory(), true, 200);
        dispatcher.register("shell", |_| Ok(Some("done".to_string())));

        let command = Command::with_param("shell", "command", "ls -la");
        let response = dispatcher.dispatch("run ls -la", &command, &mut no_confirm());
        assert_eq!(response, "done");
    }
}
