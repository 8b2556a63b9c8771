use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;

/// External dotted-key property lookup, injected at construction.
/// Implementations live outside the core (settings store, platform info).
pub trait PropertyAccessor: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// Expands `%key` / `%key[arg]` variables inside plain text segments.
///
/// - Calendar fields: `%month %day %hour %minute %second` (no zero padding).
/// - Names: `%username` (falls back to the OS login name), `%selfname`,
///   `%selfname2`, `%keroname`, `%charname[N]`.
/// - Screen metrics: `%screenwidth`, `%screenheight`.
/// - `%property[dotted.key]` delegates to the injected accessor.
/// - Word classes (`%ms %mz %ml %mc %mh %mt %me %mp %m? %dms`) pick
///   uniformly at random from the configured lexicon.
/// - Unknown keys are kept as-is so later layers may expand them.
///
/// Expansion is a pure function of (text, now, accessor, rng). Matches are
/// located against the original text and replaced in reverse order, so
/// earlier substitutions can never shift later match ranges.
pub struct Expander {
    pub username: Option<String>,
    pub selfname: Option<String>,
    pub selfname2: Option<String>,
    pub keroname: Option<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub lexicon: HashMap<String, Vec<String>>,
    props: Arc<dyn PropertyAccessor>,
}

const WORD_CLASSES: [&str; 10] = ["ms", "mz", "ml", "mc", "mh", "mt", "me", "mp", "m?", "dms"];

struct Match {
    start: usize,
    end: usize,
    key: String,
    arg: Option<String>,
}

impl Expander {
    pub fn new(props: Arc<dyn PropertyAccessor>) -> Self {
        Self {
            username: None,
            selfname: None,
            selfname2: None,
            keroname: None,
            screen_width: 0,
            screen_height: 0,
            lexicon: HashMap::new(),
            props,
        }
    }

    pub fn expand<R: Rng>(&self, text: &str, now: DateTime<Local>, rng: &mut R) -> String {
        if text.is_empty() || !text.contains('%') {
            return text.to_string();
        }

        let matches = scan_variables(text);
        let mut result = text.to_string();
        for m in matches.iter().rev() {
            if let Some(replacement) = self.resolve(&m.key, m.arg.as_deref(), now, &mut *rng) {
                result.replace_range(m.start..m.end, &replacement);
            }
            // Unknown key: leave the original `%key[arg]` text untouched.
        }
        result
    }

    /// Resolve one variable; None means "unknown, keep verbatim".
    fn resolve<R: Rng>(
        &self,
        key: &str,
        arg: Option<&str>,
        now: DateTime<Local>,
        rng: &mut R,
    ) -> Option<String> {
        let key = key.to_ascii_lowercase();
        let value = match key.as_str() {
            "month" => now.month().to_string(),
            "day" => now.day().to_string(),
            "hour" => now.hour().to_string(),
            "minute" => now.minute().to_string(),
            "second" => now.second().to_string(),
            "username" => match &self.username {
                Some(v) if !v.is_empty() => v.clone(),
                _ => os_login_name(),
            },
            "selfname" => self.selfname.clone().unwrap_or_default(),
            "selfname2" => self.selfname2.clone().unwrap_or_default(),
            "keroname" => self.keroname.clone().unwrap_or_default(),
            "charname" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(0) => self.selfname.clone().unwrap_or_default(),
                Some(1) => self.keroname.clone().unwrap_or_default(),
                _ => String::new(),
            },
            "screenwidth" => self.screen_width.to_string(),
            "screenheight" => self.screen_height.to_string(),
            "property" => match arg {
                Some(name) => self.props.get(name).unwrap_or_default(),
                None => String::new(),
            },
            k if WORD_CLASSES.contains(&k) => self
                .lexicon
                .get(k)
                .and_then(|items| items.choose(rng))
                .cloned()
                .unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }
}

/// Scan for `%key` / `%key[arg]` occurrences. Keys are runs of letters and
/// digits plus `?` and `*`; the bracket argument must be non-empty to count
/// (an empty `[]` stays in the text).
fn scan_variables(text: &str) -> Vec<Match> {
    let bytes = text.as_bytes();
    let mut matches = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let key_start = i + 1;
        let mut j = key_start;
        while j < bytes.len()
            && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'?' || bytes[j] == b'*')
        {
            j += 1;
        }
        if j == key_start {
            i += 1;
            continue;
        }
        let key = text[key_start..j].to_string();
        let mut end = j;
        let mut arg = None;
        if j < bytes.len() && bytes[j] == b'[' {
            if let Some(close) = text[j + 1..].find(']').map(|p| j + 1 + p) {
                if close > j + 1 {
                    arg = Some(text[j + 1..close].to_string());
                    end = close + 1;
                }
            }
        }
        matches.push(Match {
            start: i,
            end,
            key,
            arg,
        });
        i = end;
    }
    matches
}

fn os_login_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
