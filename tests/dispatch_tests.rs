// Dispatcher protocol tests: destructive-action confirmation, history
// round-trips, and handler failure containment.

use std::cell::Cell;
use std::rc::Rc;

use voice_command::dispatch::{Dispatcher, CANCELLED, DONT_UNDERSTAND};
use voice_command::history::HistoryLog;
use voice_command::intent;

fn dispatcher(confirm_destructive: bool) -> Dispatcher {
    Dispatcher::new(HistoryLog::in_memory(), confirm_destructive, 200)
}

#[test]
fn delete_is_cancelled_by_a_non_yes_reply() {
    let mut dispatcher = dispatcher(true);

    let invoked = Rc::new(Cell::new(false));
    let flag = Rc::clone(&invoked);
    dispatcher.register("delete", move |_| {
        flag.set(true);
        Ok(Some("Deleted notes.txt".to_string()))
    });

    let command = intent::classify("delete file notes.txt");
    let mut confirm = |description: &str| {
        assert!(description.contains("notes.txt"));
        Some("no thanks".to_string())
    };

    let response = dispatcher.dispatch("delete file notes.txt", &command, &mut confirm);
    assert_eq!(response, CANCELLED);
    assert!(!invoked.get(), "delete handler ran despite cancellation");

    // The cancellation itself is auditable
    assert_eq!(dispatcher.history().last().unwrap().result, CANCELLED);
}

#[test]
fn delete_is_cancelled_by_silence() {
    let mut dispatcher = dispatcher(true);

    let invoked = Rc::new(Cell::new(false));
    let flag = Rc::clone(&invoked);
    dispatcher.register("delete", move |_| {
        flag.set(true);
        Ok(None)
    });

    let command = intent::classify("delete file notes.txt");
    let mut confirm = |_: &str| None;

    let response = dispatcher.dispatch("delete file notes.txt", &command, &mut confirm);
    assert_eq!(response, CANCELLED);
    assert!(!invoked.get());
}

#[test]
fn delete_proceeds_on_yes() {
    let mut dispatcher = dispatcher(true);
    dispatcher.register("delete", |params| {
        Ok(Some(format!("Deleted {}", params.get("filename").unwrap())))
    });

    let command = intent::classify("delete file notes.txt");
    let mut confirm = |_: &str| Some("yes please".to_string());

    let response = dispatcher.dispatch("delete file notes.txt", &command, &mut confirm);
    assert_eq!(response, "Deleted notes.txt");
}

#[test]
fn destructive_shell_command_requires_confirmation() {
    let mut dispatcher = dispatcher(true);
    dispatcher.register("shell", |_| Ok(Some("done".to_string())));

    let command = intent::classify("run rm -rf target");
    let mut confirm = |_: &str| Some("absolutely not".to_string());

    let response = dispatcher.dispatch("run rm -rf target", &command, &mut confirm);
    assert_eq!(response, CANCELLED);
}

#[test]
fn confirmation_can_be_disabled_for_unattended_use() {
    let mut dispatcher = dispatcher(false);
    dispatcher.register("delete", |_| Ok(Some("Deleted notes.txt".to_string())));

    let command = intent::classify("delete file notes.txt");
    let mut confirm = |_: &str| -> Option<String> {
        panic!("confirmation requested while disabled")
    };

    let response = dispatcher.dispatch("delete file notes.txt", &command, &mut confirm);
    assert_eq!(response, "Deleted notes.txt");
}

#[test]
fn handler_result_round_trips_into_history_verbatim() {
    let mut dispatcher = dispatcher(true);
    let long_result = "line ".repeat(100);
    let result = long_result.clone();
    dispatcher.register("read", move |_| Ok(Some(result.clone())));

    let command = intent::classify("read file big.log");
    let response = dispatcher.dispatch("read file big.log", &command, &mut |_| None);

    // History keeps the full text; only the spoken rendering is truncated
    assert_eq!(dispatcher.history().last().unwrap().result, long_result);
    assert_eq!(response, long_result);
    assert!(dispatcher.spoken(&response).chars().count() < long_result.chars().count());
}

#[test]
fn unknown_utterance_is_surfaced_not_dropped() {
    let mut dispatcher = dispatcher(true);

    let command = intent::classify("please order me a pizza");
    let response = dispatcher.dispatch("please order me a pizza", &command, &mut |_| None);

    assert_eq!(response, DONT_UNDERSTAND);
    assert_eq!(dispatcher.history().last().unwrap().input, "please order me a pizza");
}

#[test]
fn handler_failure_is_contained() {
    let mut dispatcher = dispatcher(true);
    dispatcher.register("read", |_| anyhow::bail!("disk on fire"));

    let command = intent::classify("read file anything.txt");
    let response = dispatcher.dispatch("read file anything.txt", &command, &mut |_| None);

    assert!(response.contains("disk on fire"));
    // A second dispatch still works; the failure never poisons the loop
    let response = dispatcher.dispatch("repeat that", &intent::classify("repeat that"), &mut |_| None);
    assert!(response.contains("disk on fire"));
}
