/// Intent classification: ordered first-match rules over filtered text.
///
/// This is deliberately not a natural-language model. Each rule is a
/// substring predicate plus a bounded capture; the first match wins and
/// rule order encodes priority (the exit rule must outrank the free-text
/// `run` rule or a spoken "quit" would become a shell argument).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Canonical command: the sole artifact handed to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: String,
    pub parameters: HashMap<String, String>,
}

impl Command {
    pub fn new(action: &str) -> Self {
        Command {
            action: action.to_string(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_param(action: &str, key: &str, value: &str) -> Self {
        let mut parameters = HashMap::new();
        parameters.insert(key.to_string(), value.to_string());
        Command {
            action: action.to_string(),
            parameters,
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// One classification rule. `matches` gates the rule; `build` extracts
/// parameters and may decline (e.g. "delete file" with no filename), in
/// which case evaluation falls through to later rules.
struct Rule {
    matches: fn(&str) -> bool,
    build: fn(&str) -> Option<Command>,
}

static CD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:change directory to|go to)\s+(.+)").unwrap());
static CREATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"create file\s+(.+)").unwrap());
static DELETE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"delete file\s+(.+)").unwrap());
static READ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:read|open)\s+file\s+(.+)").unwrap());
static RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"run\s+(.+)").unwrap());

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn capture(re: &Regex, text: &str, action: &str, key: &str) -> Option<Command> {
    re.captures(text)
        .map(|caps| Command::with_param(action, key, caps[1].trim()))
}

fn is_exit(t: &str) -> bool {
    contains_any(t, &["exit", "quit", "goodbye", "stop"])
}
fn build_exit(_: &str) -> Option<Command> {
    Some(Command::new("exit"))
}

fn is_help(t: &str) -> bool {
    contains_any(t, &["help", "what can i do"])
}
fn build_help(_: &str) -> Option<Command> {
    Some(Command::new("help"))
}

fn is_repeat(t: &str) -> bool {
    contains_any(t, &["repeat", "say again"])
}
fn build_repeat(_: &str) -> Option<Command> {
    Some(Command::new("repeat"))
}

fn is_list(t: &str) -> bool {
    contains_any(t, &["list files", "show directory"])
}
fn build_list(_: &str) -> Option<Command> {
    Some(Command::new("list"))
}

fn is_cd(t: &str) -> bool {
    contains_any(t, &["change directory", "go to"])
}
fn build_cd(t: &str) -> Option<Command> {
    capture(&CD_RE, t, "cd", "path")
}

fn is_cd_back(t: &str) -> bool {
    contains_any(t, &["go back", "parent directory"])
}
fn build_cd_back(_: &str) -> Option<Command> {
    Some(Command::with_param("cd", "path", ".."))
}

fn is_pwd(t: &str) -> bool {
    contains_any(t, &["what directory", "where am i"])
}
fn build_pwd(_: &str) -> Option<Command> {
    Some(Command::new("pwd"))
}

fn is_create(t: &str) -> bool {
    t.contains("create file")
}
fn build_create(t: &str) -> Option<Command> {
    capture(&CREATE_RE, t, "create", "filename")
}

fn is_delete(t: &str) -> bool {
    t.contains("delete file")
}
fn build_delete(t: &str) -> Option<Command> {
    capture(&DELETE_RE, t, "delete", "filename")
}

fn is_read(t: &str) -> bool {
    contains_any(t, &["read file", "open file"])
}
fn build_read(t: &str) -> Option<Command> {
    capture(&READ_RE, t, "read", "filename")
}

fn is_shell(t: &str) -> bool {
    t.contains("run ")
}
fn build_shell(t: &str) -> Option<Command> {
    capture(&RUN_RE, t, "shell", "command")
}

/// Rule order is priority. Evaluated top to bottom, first match wins,
/// no backtracking, no scoring.
const RULES: &[Rule] = &[
    Rule { matches: is_exit, build: build_exit },
    Rule { matches: is_help, build: build_help },
    Rule { matches: is_repeat, build: build_repeat },
    Rule { matches: is_list, build: build_list },
    Rule { matches: is_cd, build: build_cd },
    Rule { matches: is_cd_back, build: build_cd_back },
    Rule { matches: is_pwd, build: build_pwd },
    Rule { matches: is_create, build: build_create },
    Rule { matches: is_delete, build: build_delete },
    Rule { matches: is_read, build: build_read },
    Rule { matches: is_shell, build: build_shell },
];

/// Map filtered text to a canonical command. Case-insensitive, pure.
/// Unmatched text yields the `unknown` sentinel carrying the original
/// utterance, which the dispatcher turns into a "didn't understand"
/// response rather than silently dropping it.
pub fn classify(text: &str) -> Command {
    let lowered = text.trim().to_lowercase();

    for rule in RULES {
        if (rule.matches)(&lowered) {
            if let Some(command) = (rule.build)(&lowered) {
                return command;
            }
        }
    }

    Command::with_param("unknown", "text", text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_to_desktop_is_cd() {
        let command = classify("go to desktop");
        assert_eq!(command.action, "cd");
        assert_eq!(command.param("path"), Some("desktop"));
    }

    #[test]
    fn change_directory_is_cd() {
        let command = classify("Change directory to projects");
        assert_eq!(command.action, "cd");
        assert_eq!(command.param("path"), Some("projects"));
    }

    #[test]
    fn go_back_is_parent_cd() {
        let command = classify("go back");
        assert_eq!(command.action, "cd");
        assert_eq!(command.param("path"), Some(".."));
    }

    #[test]
    fn run_extracts_free_text() {
        let command = classify("run cargo build --release");
        assert_eq!(command.action, "shell");
        assert_eq!(command.param("command"), Some("cargo build --release"));
    }

    #[test]
    fn exit_outranks_run() {
        // "quit" spoken inside a run-like utterance must not be swallowed
        // as a shell argument
        let command = classify("run the quit sequence");
        assert_eq!(command.action, "exit");
    }

    #[test]
    fn delete_file_extracts_filename() {
        let command = classify("delete file notes.txt");
        assert_eq!(command.action, "delete");
        assert_eq!(command.param("filename"), Some("notes.txt"));
    }

    #[test]
    fn read_and_open_are_equivalent() {
        assert_eq!(classify("read file log.txt").action, "read");
        assert_eq!(classify("open file log.txt").action, "read");
    }

    #[test]
    fn unmatched_text_is_unknown_with_original() {
        let command = classify("What's The Weather Like");
        assert_eq!(command.action, "unknown");
        assert_eq!(command.param("text"), Some("What's The Weather Like"));
    }

    #[test]
    fn create_without_filename_falls_through_to_unknown() {
        let command = classify("create file");
        assert_eq!(command.action, "unknown");
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("LIST FILES").action, "list");
        assert_eq!(classify("Where am I").action, "pwd");
    }
}
