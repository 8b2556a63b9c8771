//! Interpretation of generic command tokens.
//!
//! The handful of first-class commands are dedicated units; everything
//! else lands here when its `Action` unit pops. The `!` namespace is an
//! open-ended vocabulary, dispatched through a registry built once at
//! startup — adding a command is a registry entry, not a new token kind.
//!
//! Failure policy is uniform: an unknown name or an argument list that is
//! too short is a logged no-op. Playback always proceeds to the next unit.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::debug;

use super::event::{AnimAction, Choice, ChoiceAction, SideEffect, SystemAction};
use super::scheduler::Scheduler;

type Handler = fn(&mut Scheduler, &[String], &mut Vec<SideEffect>);

pub fn dispatch(s: &mut Scheduler, name: &str, args: &[String], effects: &mut Vec<SideEffect>) {
    match name {
        "!" => {
            let Some(verb) = args.first() else {
                debug!("empty bang command skipped");
                return;
            };
            match bang_registry().get(verb.as_str()) {
                Some(handler) => handler(s, &args[1..], effects),
                None => debug!(%verb, "unknown bang command skipped"),
            }
        }
        "c" => {
            // `\c` wipes the balloon; `\c[char,N]`/`\c[line,N]` trims a
            // range, which is a balloon-layout concern passed through.
            if args.is_empty() {
                let scope = s.current_scope;
                s.clear_scope_text(scope, effects);
            } else {
                effects.push(SideEffect::TextClearedRange {
                    scope: s.current_scope,
                    args: args.to_vec(),
                });
            }
        }
        "b" => match args.first().and_then(|a| a.parse::<i64>().ok()) {
            Some(balloon) => effects.push(SideEffect::BalloonChanged {
                scope: s.current_scope,
                balloon,
            }),
            None => debug!("balloon switch without an id skipped"),
        },
        "q" => push_choice(s, args),
        "z" => s.choice_cancelable = true,
        "4" => effects.push(SideEffect::MovedAway {
            scope: s.current_scope,
        }),
        "5" => effects.push(SideEffect::MovedClose {
            scope: s.current_scope,
        }),
        "6" => effects.push(SideEffect::System(SystemAction::OpenUrl)),
        "7" => effects.push(SideEffect::System(SystemAction::OpenEmail)),
        "8" => match args.first() {
            Some(file) if !file.is_empty() => effects.push(SideEffect::SoundPlayed {
                file: file.clone(),
            }),
            _ => debug!("sound command without a file skipped"),
        },
        "v" => effects.push(SideEffect::System(SystemAction::OpenPreferences)),
        "+" => effects.push(SideEffect::System(SystemAction::BootGhost { name: None })),
        "_+" => effects.push(SideEffect::System(SystemAction::BootAllGhosts)),
        "*" => effects.push(SideEffect::MarkerShown),
        "_s" => {
            // Broadcast group toggle: `\_s` mirrors appends to every
            // scope, `\_s[0,2]` to the listed ones; a second `\_s` (or
            // script end) turns it off.
            if s.broadcast.is_some() {
                s.broadcast = None;
            } else {
                let group: Vec<usize> =
                    args.iter().filter_map(|a| a.parse().ok()).collect();
                s.broadcast = Some(group);
            }
        }
        "_n" => effects.push(SideEffect::NoWrapToggled),
        "f" => effects.push(SideEffect::FontChanged {
            args: args.to_vec(),
        }),
        "_a" => effects.push(SideEffect::AnchorChanged {
            args: args.to_vec(),
        }),
        "_b" => {
            if args.is_empty() {
                debug!("balloon image without a path skipped");
            } else {
                effects.push(SideEffect::BalloonImage {
                    args: args.to_vec(),
                });
            }
        }
        "_v" => match args.first() {
            Some(file) => effects.push(SideEffect::VoicePlayed { file: file.clone() }),
            None => debug!("voice command without a file skipped"),
        },
        "_V" => effects.push(SideEffect::VoiceStopped),
        // Passthrough section markers and similar display toggles carry no
        // kernel state; they were already honored by the tokenizer.
        "_!" | "_?" | "__v" | "__q" | "a" | "-" | "C" | "_l" => {
            debug!(name, "display-layer command passed over");
        }
        _ => debug!(name, "unknown command skipped"),
    }
}

fn push_choice(s: &mut Scheduler, args: &[String]) {
    if args.len() < 2 {
        debug!("choice command with insufficient arguments skipped");
        return;
    }
    let title = args[0].clone();
    let action = match args[1].strip_prefix("script:") {
        Some(script) => ChoiceAction::Script(script.to_string()),
        None => ChoiceAction::Event {
            id: args[1].clone(),
            references: args[2..].to_vec(),
        },
    };
    s.pending_choices.push(Choice { title, action });
}

fn bang_registry() -> &'static HashMap<&'static str, Handler> {
    static REGISTRY: OnceLock<HashMap<&'static str, Handler>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut m: HashMap<&'static str, Handler> = HashMap::new();
        m.insert("raise", bang_raise);
        m.insert("set", bang_set);
        m.insert("reset", bang_reset);
        m.insert("get", bang_get);
        m.insert("anim", bang_anim);
        m.insert("effect", bang_effect);
        m.insert("filter", bang_filter);
        m.insert("move", bang_move);
        m.insert("moveasync", bang_moveasync);
        m.insert("change", bang_change);
        m.insert("call", bang_call);
        m.insert("update", bang_update);
        m.insert("updatebymyself", bang_update_self);
        m.insert("updateother", bang_update_other);
        m.insert("execute", bang_execute);
        m.insert("executesntp", bang_sntp);
        m.insert("biff", bang_biff);
        m.insert("headline", bang_headline);
        m.insert("vanish", bang_vanish);
        m.insert("vanishbymyself", bang_vanish);
        m.insert("lock", bang_lock);
        m.insert("unlock", bang_unlock);
        m.insert("bind", bang_bind);
        m.insert("enter", bang_enter);
        m.insert("leave", bang_leave);
        m.insert("*", bang_marker);
        m
    })
}

fn bang_raise(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    let Some(id) = args.first() else {
        debug!("raise without an event id skipped");
        return;
    };
    effects.push(SideEffect::EventRaised {
        id: id.clone(),
        references: args[1..].to_vec(),
    });
}

fn bang_set(s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    let Some(key) = args.first() else {
        debug!("set without a target skipped");
        return;
    };
    let rest = &args[1..];
    match key.as_str() {
        "property" => {
            if rest.len() < 2 {
                debug!("set property with insufficient arguments skipped");
                return;
            }
            s.props.set(&rest[0], &rest[1]);
            effects.push(SideEffect::PropertyChanged {
                key: rest[0].clone(),
                value: rest[1].clone(),
            });
        }
        "scaling" => effects.push(SideEffect::ScalingChanged {
            scope: s.current_scope,
            args: rest.to_vec(),
        }),
        "alpha" => effects.push(SideEffect::AlphaChanged {
            scope: s.current_scope,
            args: rest.to_vec(),
        }),
        "position" => effects.push(SideEffect::PositionSet {
            args: rest.to_vec(),
        }),
        "zorder" => effects.push(SideEffect::ZOrderSet {
            order: rest.iter().filter_map(|a| a.parse().ok()).collect(),
        }),
        "sticky-window" => effects.push(SideEffect::StickyWindowSet {
            scopes: rest.iter().filter_map(|a| a.parse().ok()).collect(),
        }),
        "windowstate" => effects.push(SideEffect::WindowStateChanged {
            args: rest.to_vec(),
        }),
        "wallpaper" => match rest.first() {
            Some(file) => effects.push(SideEffect::System(SystemAction::Wallpaper {
                file: file.clone(),
                options: rest[1..].to_vec(),
            })),
            None => debug!("set wallpaper without a file skipped"),
        },
        "trayicon" => match rest.first() {
            Some(file) => effects.push(SideEffect::System(SystemAction::TrayIcon {
                file: file.clone(),
                text: rest.get(1).cloned().unwrap_or_default(),
            })),
            None => debug!("set trayicon without a file skipped"),
        },
        "trayballoon" => effects.push(SideEffect::System(SystemAction::TrayNotification {
            options: rest.to_vec(),
        })),
        "choicetimeout" => {
            s.choice_timeout_ms = rest.first().and_then(|a| a.parse().ok());
        }
        // Alignment, balloon offsets, autoscroll and the rest are
        // presentation settings with no kernel state of their own.
        _ => effects.push(SideEffect::SettingChanged {
            key: key.clone(),
            args: rest.to_vec(),
        }),
    }
}

fn bang_reset(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first().map(String::as_str) {
        Some("position") => effects.push(SideEffect::PositionReset),
        Some("zorder") => effects.push(SideEffect::ZOrderReset),
        Some("sticky-window") => effects.push(SideEffect::StickyWindowReset),
        Some(other) => effects.push(SideEffect::SettingChanged {
            key: format!("reset.{other}"),
            args: args[1..].to_vec(),
        }),
        None => debug!("reset without a target skipped"),
    }
}

fn bang_get(s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    if args.first().map(String::as_str) != Some("property") {
        debug!(?args, "unsupported get target skipped");
        return;
    }
    let Some(key) = args.get(1) else {
        debug!("get property without a key skipped");
        return;
    };
    effects.push(SideEffect::PropertyFetched {
        key: key.clone(),
        value: s.props.get(key),
    });
}

fn bang_anim(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    let verb = args.first().map(String::as_str);
    let id = |idx: usize| args.get(idx).and_then(|a| a.parse::<i64>().ok());
    let action = match verb {
        Some("play") => id(1).map(|id| AnimAction::Play { id }),
        Some("pause") => id(1).map(|id| AnimAction::Pause { id }),
        Some("resume") => id(1).map(|id| AnimAction::Resume { id }),
        Some("stop") | Some("clear") => id(1).map(|id| AnimAction::Clear { id }),
        Some("offset") => match (id(1), id(2), id(3)) {
            (Some(id), Some(x), Some(y)) => Some(AnimAction::Offset {
                id,
                x: x as i32,
                y: y as i32,
            }),
            _ => None,
        },
        Some("add") => match args.get(1).map(String::as_str) {
            Some("overlay") | Some("base") => id(2).map(|id| AnimAction::AddOverlay { id }),
            Some("text") => id(2).map(|id| AnimAction::AddTextOverlay {
                id,
                args: args[3..].to_vec(),
            }),
            _ => None,
        },
        _ => None,
    };
    match action {
        Some(action) => effects.push(SideEffect::AnimationRequested(action)),
        None => debug!(?args, "malformed anim command skipped"),
    }
}

fn bang_effect(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first() {
        Some(name) => effects.push(SideEffect::EffectApplied {
            name: name.clone(),
            args: args[1..].to_vec(),
        }),
        None => debug!("effect without a name skipped"),
    }
}

fn bang_filter(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first() {
        Some(name) => effects.push(SideEffect::FilterApplied {
            name: name.clone(),
            args: args[1..].to_vec(),
        }),
        None => debug!("filter without a name skipped"),
    }
}

fn bang_move(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::MoveRequested {
        args: args.to_vec(),
        asynchronous: false,
    });
}

fn bang_moveasync(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::MoveRequested {
        args: args.to_vec(),
        asynchronous: true,
    });
}

fn bang_change(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    let (Some(kind), Some(name)) = (args.first(), args.get(1)) else {
        debug!("change with insufficient arguments skipped");
        return;
    };
    let action = match kind.as_str() {
        "ghost" => SystemAction::ChangeGhost { name: name.clone() },
        "shell" => SystemAction::ChangeShell { name: name.clone() },
        "balloon" => SystemAction::ChangeBalloon { name: name.clone() },
        other => {
            debug!(kind = other, "unknown change target skipped");
            return;
        }
    };
    effects.push(SideEffect::System(action));
}

fn bang_call(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    let (Some(kind), Some(name)) = (args.first(), args.get(1)) else {
        debug!("call with insufficient arguments skipped");
        return;
    };
    if kind == "ghost" {
        effects.push(SideEffect::System(SystemAction::CallGhost {
            name: name.clone(),
        }));
    } else {
        debug!(kind = kind.as_str(), "unknown call target skipped");
    }
}

fn bang_update(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    let target = args.first().cloned().unwrap_or_else(|| "self".to_string());
    effects.push(SideEffect::System(SystemAction::UpdateCheck {
        target,
        options: args.get(1..).unwrap_or_default().to_vec(),
    }));
}

fn bang_update_self(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::System(SystemAction::UpdateCheck {
        target: "self".to_string(),
        options: args.to_vec(),
    }));
}

fn bang_update_other(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::System(SystemAction::UpdateCheck {
        target: "other".to_string(),
        options: args.to_vec(),
    }));
}

fn bang_execute(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first().map(String::as_str) {
        Some("sntp") => effects.push(SideEffect::System(SystemAction::Sntp)),
        Some("resetwindowpos") => effects.push(SideEffect::System(SystemAction::ResetWindowPos)),
        other => debug!(?other, "unknown execute target skipped"),
    }
}

fn bang_sntp(_s: &mut Scheduler, _args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::System(SystemAction::Sntp));
}

fn bang_biff(_s: &mut Scheduler, _args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::System(SystemAction::MailCheck));
}

fn bang_headline(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first() {
        Some(name) => effects.push(SideEffect::System(SystemAction::Headline {
            name: name.clone(),
        })),
        None => debug!("headline without a name skipped"),
    }
}

fn bang_vanish(_s: &mut Scheduler, _args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::System(SystemAction::Vanish));
}

fn bang_lock(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first() {
        Some(target) => effects.push(SideEffect::RepaintLock {
            target: target.clone(),
            locked: true,
        }),
        None => debug!("lock without a target skipped"),
    }
}

fn bang_unlock(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first() {
        Some(target) => effects.push(SideEffect::RepaintLock {
            target: target.clone(),
            locked: false,
        }),
        None => debug!("unlock without a target skipped"),
    }
}

fn bang_bind(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    if args.len() < 3 {
        debug!("bind with insufficient arguments skipped");
        return;
    }
    let enabled = matches!(args[2].as_str(), "1" | "true");
    effects.push(SideEffect::DressupBound {
        category: args[0].clone(),
        part: args[1].clone(),
        enabled,
    });
}

fn bang_enter(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first() {
        Some(mode) => effects.push(SideEffect::ModeChanged {
            mode: mode.clone(),
            entered: true,
        }),
        None => debug!("enter without a mode skipped"),
    }
}

fn bang_leave(_s: &mut Scheduler, args: &[String], effects: &mut Vec<SideEffect>) {
    match args.first() {
        Some(mode) => effects.push(SideEffect::ModeChanged {
            mode: mode.clone(),
            entered: false,
        }),
        None => debug!("leave without a mode skipped"),
    }
}

fn bang_marker(_s: &mut Scheduler, _args: &[String], effects: &mut Vec<SideEffect>) {
    effects.push(SideEffect::MarkerShown);
}
