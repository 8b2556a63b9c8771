use tracing::debug;

/// One frame of an animation: which overlay surface to show, for how long,
/// and at what offset. A negative `surface_id` means "end/wait" and emits
/// nothing when the frame is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationPattern {
    pub surface_id: i64,
    pub duration_ms: u64,
    pub x: i32,
    pub y: i32,
}

/// When an animation is allowed to trigger. Only `RunOnce` terminates on
/// its own; every other kind loops its pattern list until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerInterval {
    Always,
    Sometimes,
    Rarely,
    RunOnce,
    Never,
    Random(u32),
    Periodic(u32),
}

impl TriggerInterval {
    fn parse(parts: &[&str]) -> TriggerInterval {
        match parts.first().map(|s| s.trim()) {
            Some("always") => TriggerInterval::Always,
            Some("sometimes") => TriggerInterval::Sometimes,
            Some("rarely") => TriggerInterval::Rarely,
            Some("runonce") => TriggerInterval::RunOnce,
            Some("never") => TriggerInterval::Never,
            Some("random") => TriggerInterval::Random(parse_or_zero(parts.get(1))),
            Some("periodic") => TriggerInterval::Periodic(parse_or_zero(parts.get(1))),
            Some(other) => match other.parse::<u32>() {
                Ok(n) => TriggerInterval::Periodic(n),
                Err(_) => TriggerInterval::Never,
            },
            None => TriggerInterval::Never,
        }
    }
}

fn parse_or_zero(s: Option<&&str>) -> u32 {
    s.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Immutable animation definition, loaded once from the character
/// package's surface table. Ids are unique within one surface context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationDefinition {
    pub id: i64,
    pub interval: TriggerInterval,
    pub patterns: Vec<AnimationPattern>,
}

/// Parse the line-oriented surface table dialect for one surface:
///
/// ```text
/// surface0
/// {
/// 10.interval,runonce
/// 10.pattern0,101,100,0,0
/// 10.pattern1,102,150,10,-5
/// }
/// ```
///
/// Total: unparsable lines are skipped with a debug log, never an error.
pub fn parse_surface_table(content: &str, surface_id: i64) -> Vec<AnimationDefinition> {
    let mut defs: Vec<AnimationDefinition> = Vec::new();
    let mut current_surface: Option<i64> = None;
    let mut current: Option<(i64, TriggerInterval, Vec<AnimationPattern>)> = None;

    let mut finish = |current: &mut Option<(i64, TriggerInterval, Vec<AnimationPattern>)>,
                      defs: &mut Vec<AnimationDefinition>| {
        if let Some((id, interval, patterns)) = current.take() {
            if !patterns.is_empty() {
                defs.push(AnimationDefinition {
                    id,
                    interval,
                    patterns,
                });
            }
        }
    };

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("surface") {
            finish(&mut current, &mut defs);
            current_surface = leading_digits(rest);
            continue;
        }
        if current_surface != Some(surface_id) {
            continue;
        }
        if trimmed == "}" {
            finish(&mut current, &mut defs);
            continue;
        }

        let parts: Vec<&str> = trimmed.split(',').collect();
        let head = parts[0];

        if head.contains(".interval") {
            let Some(id) = leading_digits(head) else {
                debug!(line = trimmed, "surface table: interval line without id");
                continue;
            };
            // A new id closes the previous definition.
            if current.as_ref().is_some_and(|(cur, _, _)| *cur != id) {
                finish(&mut current, &mut defs);
            }
            let interval = TriggerInterval::parse(&parts[1..]);
            match &mut current {
                Some((_, cur_interval, _)) => *cur_interval = interval,
                None => current = Some((id, interval, Vec::new())),
            }
        } else if head.contains(".pattern") {
            if parts.len() < 5 {
                debug!(line = trimmed, "surface table: short pattern line");
                continue;
            }
            let pattern = AnimationPattern {
                surface_id: parts[1].trim().parse().unwrap_or(-1),
                duration_ms: parts[2].trim().parse().unwrap_or(0),
                x: parts[3].trim().parse().unwrap_or(0),
                y: parts[4].trim().parse().unwrap_or(0),
            };
            match &mut current {
                Some((_, _, patterns)) => patterns.push(pattern),
                None => {
                    // Pattern before any interval line: adopt the line's id
                    // with the default (never auto-trigger) interval.
                    if let Some(id) = leading_digits(head) {
                        current = Some((id, TriggerInterval::Never, vec![pattern]));
                    }
                }
            }
        }
    }
    finish(&mut current, &mut defs);
    defs
}

fn leading_digits(s: &str) -> Option<i64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
