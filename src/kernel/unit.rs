use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Local};
use rand::Rng;
use tracing::debug;

use crate::script::{Expander, Token};

/// A short `\wN` tick is N x 50ms.
const SHORT_WAIT_MS: u64 = 50;

/// The scheduler's execution atom, derived from tokens at submit time.
///
/// Text decomposes into one `Char` per character (the typing effect)
/// unless quick mode is active, which collapses a run into one `Chunk`.
/// Generic commands become `Action` units: their effects are enqueued in
/// place and applied only when popped in turn, which is what makes a
/// command written after a line of text run after the line has finished
/// typing.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUnit {
    Char(char),
    Chunk(String),
    Newline,
    Scope(usize),
    Surface(i64),
    Wait(Duration),
    /// Wait until `time_base + offset`; zero when that point has passed.
    WaitUntil(Duration),
    ResetTimeBase,
    ClickGate { keep_text: bool },
    Animation { id: i64, wait: bool },
    /// Park until the animation completes (or turns out not to be live).
    AnimationWait(i64),
    SyncWait { name: String, timeout_ms: i64 },
    SyncSignal(String),
    Action { name: String, args: Vec<String> },
    End,
}

/// Expand a token stream into the unit queue.
///
/// `quick` is the scheduler's quick-mode flag: `\_q` toggles it here, at
/// expansion time, so the toggle affects exactly the text that follows it
/// in the same script. Percent variables in text payloads are resolved
/// through the expander at this point.
pub fn expand_tokens<R: Rng>(
    tokens: Vec<Token>,
    quick: &mut bool,
    expander: &Expander,
    now: DateTime<Local>,
    rng: &mut R,
) -> VecDeque<PlaybackUnit> {
    let mut units = VecDeque::new();
    for token in tokens {
        match token {
            Token::Text(text) => {
                let expanded = expander.expand(&text, now, &mut *rng);
                if *quick {
                    if !expanded.is_empty() {
                        units.push_back(PlaybackUnit::Chunk(expanded));
                    }
                } else {
                    for ch in expanded.chars() {
                        units.push_back(PlaybackUnit::Char(ch));
                    }
                }
            }
            Token::Scope(n) => units.push_back(PlaybackUnit::Scope(n)),
            Token::Surface(id) => units.push_back(PlaybackUnit::Surface(id)),
            Token::Animation { id, wait } => {
                units.push_back(PlaybackUnit::Animation { id, wait })
            }
            Token::Newline | Token::NewlineVariation(_) => {
                units.push_back(PlaybackUnit::Newline)
            }
            Token::End => units.push_back(PlaybackUnit::End),
            Token::Command { name, args } => expand_command(&mut units, quick, name, args),
        }
    }
    units
}

fn expand_command(
    units: &mut VecDeque<PlaybackUnit>,
    quick: &mut bool,
    name: String,
    args: Vec<String>,
) {
    match name.as_str() {
        // Short wait. The first digit is the tick count; any remaining
        // digits fall through as literal text. That makes `\w10` a 50ms
        // wait followed by the character "0" — a historical quirk scripts
        // depend on, reproduced here on purpose.
        "w" => {
            let Some(arg) = args.first() else {
                return;
            };
            let mut chars = arg.chars();
            let Some(ticks) = chars.next().and_then(|c| c.to_digit(10)) else {
                debug!(%arg, "non-numeric \\w argument ignored");
                return;
            };
            units.push_back(PlaybackUnit::Wait(Duration::from_millis(
                u64::from(ticks) * SHORT_WAIT_MS,
            )));
            let rest: String = chars.collect();
            if !rest.is_empty() {
                units.push_back(PlaybackUnit::Chunk(rest));
            }
        }
        // Millisecond wait.
        "_w" => match args.first().and_then(|a| a.parse::<u64>().ok()) {
            Some(ms) => units.push_back(PlaybackUnit::Wait(Duration::from_millis(ms))),
            None => debug!("\\_w without a millisecond argument ignored"),
        },
        // Absolute waits against the script time base, plus the
        // animation-complete wait spelling.
        "__w" => match args.first().map(String::as_str) {
            Some("clear") => units.push_back(PlaybackUnit::ResetTimeBase),
            Some("animation") => match args.get(1).and_then(|a| a.parse::<i64>().ok()) {
                Some(id) => units.push_back(PlaybackUnit::AnimationWait(id)),
                None => debug!("\\__w[animation] without an id ignored"),
            },
            Some(ms) => match ms.parse::<u64>() {
                Ok(ms) => {
                    units.push_back(PlaybackUnit::WaitUntil(Duration::from_millis(ms)))
                }
                Err(_) => debug!(arg = ms, "unrecognized \\__w argument ignored"),
            },
            None => debug!("\\__w without arguments ignored"),
        },
        // Quick-mode toggle, applied at expansion time.
        "_q" => *quick = !*quick,
        // Click gates. `\x` clears the balloon when clicked through,
        // `\x[noclear]` and `\t` keep it.
        "x" => units.push_back(PlaybackUnit::ClickGate {
            keep_text: args.first().is_some_and(|a| a.eq_ignore_ascii_case("noclear")),
        }),
        "t" => units.push_back(PlaybackUnit::ClickGate { keep_text: true }),
        // Synchronization verbs suspend the queue, so they must become
        // dedicated units rather than registry actions.
        "!" if args.first().map(String::as_str) == Some("sync") => {
            match args.get(1).map(String::as_str) {
                Some("wait") => match args.get(2) {
                    Some(name) => units.push_back(PlaybackUnit::SyncWait {
                        name: name.clone(),
                        timeout_ms: args
                            .get(3)
                            .and_then(|a| a.parse::<i64>().ok())
                            .unwrap_or(0),
                    }),
                    None => debug!("sync wait without a name ignored"),
                },
                Some("signal") => match args.get(2) {
                    Some(name) => units.push_back(PlaybackUnit::SyncSignal(name.clone())),
                    None => debug!("sync signal without a name ignored"),
                },
                other => debug!(?other, "unrecognized sync verb ignored"),
            }
        }
        // Everything else is dispatched through the command registry when
        // its unit pops.
        _ => units.push_back(PlaybackUnit::Action { name, args }),
    }
}
