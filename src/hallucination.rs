/// Heuristic filter for speech-model hallucinations.
///
/// Whisper invents plausible short phrases when handed silence or noise.
/// On an always-on channel, dispatching every transcript would trigger
/// spurious actions continuously, so everything passes through this filter
/// before it can influence session state or command classification. The
/// trade is a small false-negative rate: a real utterance that happens to
/// match the denylist is dropped.

/// Phrases the model is known to emit on silence or pure noise.
const DENYLIST: &[&str] = &[
    "thank you",
    "thanks for watching",
    "subscribe",
    "like and subscribe",
    "see you next time",
    "bye",
    "goodbye",
    "thank you for watching",
    "please subscribe",
    "...",
    "you",
    "the",
    "?!?!",
    "a&m",
    "techn bi",
    "。",
    "!",
    "?",
];

/// Classify a transcript as noise. Any rule matching means noise:
/// too short, mostly punctuation, or an exact denylist hit
/// (case-insensitive, trailing period tolerated).
pub fn is_noise(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();

    if lowered.chars().count() < 3 {
        return true;
    }

    let stripped: String = lowered
        .chars()
        .filter(|c| !matches!(c, '.' | '?' | '!'))
        .collect();
    if stripped.trim().chars().count() < 2 {
        return true;
    }

    DENYLIST
        .iter()
        .any(|h| lowered == *h || lowered == format!("{h}."))
}
