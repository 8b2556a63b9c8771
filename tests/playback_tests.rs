use std::sync::Arc;
use std::time::{Duration, Instant};

use wisp::config::{GhostConfig, MemoryProperties};
use wisp::kernel::{
    AnimAction, Scheduler, SideEffect, StepOutcome, SystemAction,
};
use wisp::script::PropertyAccessor;
use wisp::sync::SyncCenter;

fn scheduler() -> Scheduler {
    scheduler_with_props(Arc::new(MemoryProperties::new()))
}

fn scheduler_with_props(props: Arc<MemoryProperties>) -> Scheduler {
    let config = GhostConfig::default();
    Scheduler::new(&config, props, SyncCenter::new())
}

/// Step until idle, collecting every side effect along the way.
fn drain(s: &mut Scheduler, effects: &mut Vec<SideEffect>) {
    loop {
        match s.step(Instant::now(), effects) {
            StepOutcome::Idle => break,
            StepOutcome::AwaitClick
            | StepOutcome::AwaitAnimation(_)
            | StepOutcome::AwaitSync { .. } => {
                panic!("unexpected suspension while draining")
            }
            _ => {}
        }
    }
}

#[test]
fn short_wait_is_fifty_ms_per_tick() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\w3", Instant::now(), &mut fx);
    let outcome = s.step(Instant::now(), &mut fx);
    assert_eq!(outcome, StepOutcome::Delay(Duration::from_millis(150)));
    // Nothing but the wait: no text was appended.
    assert!(fx.iter().all(|e| !matches!(e, SideEffect::TextAppended { .. })));
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Idle);
}

#[test]
fn wait_ten_quirk_emits_literal_zero() {
    // `\w10` is a 50ms wait followed by the character "0". Historical
    // behavior, preserved on purpose.
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\w10", Instant::now(), &mut fx);
    assert_eq!(
        s.step(Instant::now(), &mut fx),
        StepOutcome::Delay(Duration::from_millis(50))
    );
    let outcome = s.step(Instant::now(), &mut fx);
    assert_eq!(outcome, StepOutcome::Working);
    assert!(fx.contains(&SideEffect::TextAppended {
        scope: 0,
        text: "0".into()
    }));
    assert_eq!(s.displayed_text(0), "0");
}

#[test]
fn typing_decomposes_per_character() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hi", Instant::now(), &mut fx);
    // Scope switch is immediate.
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    // Each character yields for the typing interval (default 100ms).
    assert_eq!(
        s.step(Instant::now(), &mut fx),
        StepOutcome::Delay(Duration::from_millis(100))
    );
    assert_eq!(s.displayed_text(0), "H");
    assert_eq!(
        s.step(Instant::now(), &mut fx),
        StepOutcome::Delay(Duration::from_millis(100))
    );
    assert_eq!(s.displayed_text(0), "Hi");
}

#[test]
fn quick_mode_collapses_text_into_one_chunk() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\_qHello", Instant::now(), &mut fx);
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    assert_eq!(s.displayed_text(0), "Hello");
    assert!(fx.contains(&SideEffect::TextAppended {
        scope: 0,
        text: "Hello".into()
    }));
}

#[test]
fn end_to_end_scenario() {
    // The canonical script: scope, typed text, newline, surface switch,
    // waited animation, end.
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hello\n\s[1]\i[2,wait]\e", Instant::now(), &mut fx);

    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    assert_eq!(fx.last(), Some(&SideEffect::ScopeSwitched { scope: 0 }));

    for expected in ["H", "He", "Hel", "Hell", "Hello"] {
        assert_eq!(
            s.step(Instant::now(), &mut fx),
            StepOutcome::Delay(Duration::from_millis(100))
        );
        assert_eq!(s.displayed_text(0), expected);
    }

    // Newline is delay-bearing too.
    assert_eq!(
        s.step(Instant::now(), &mut fx),
        StepOutcome::Delay(Duration::from_millis(100))
    );
    assert_eq!(s.displayed_text(0), "Hello\n");

    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    assert_eq!(
        fx.last(),
        Some(&SideEffect::SurfaceChanged {
            scope: 0,
            surface: 1
        })
    );

    // The waited animation parks the scheduler.
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::AwaitAnimation(2));
    assert!(fx.contains(&SideEffect::AnimationRequested(AnimAction::Play { id: 2 })));
    assert!(s.is_awaiting_animation());

    // Completion releases it; a stray id does not.
    s.animation_done(99);
    assert!(s.is_awaiting_animation());
    s.animation_done(2);
    assert!(!s.is_awaiting_animation());

    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    assert_eq!(fx.last(), Some(&SideEffect::ScriptEnded));
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Idle);

    println!("End-to-end scenario passed: ordering and suspensions hold");
}

#[test]
fn visible_script_clears_and_replaces() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hello World", Instant::now(), &mut fx);
    // Type the first few characters.
    for _ in 0..4 {
        s.step(Instant::now(), &mut fx);
    }
    assert_eq!(s.displayed_text(0), "Hel");
    let old_generation = s.generation();

    // A new visible script discards the rest of the old queue and clears
    // every scope before its own units run.
    fx.clear();
    s.submit(r"\0Bye", Instant::now(), &mut fx);
    assert!(fx.contains(&SideEffect::TextCleared { scope: 0 }));
    assert_ne!(s.generation(), old_generation);
    assert_eq!(s.displayed_text(0), "");

    let mut fx2 = Vec::new();
    drain(&mut s, &mut fx2);
    assert_eq!(s.displayed_text(0), "Bye");
    // Nothing from the old script leaked through.
    assert!(!fx2.iter().any(
        |e| matches!(e, SideEffect::TextAppended { text, .. } if text == "l" || text == "o")
    ));
}

#[test]
fn command_only_script_does_not_clear() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hi", Instant::now(), &mut fx);
    drain(&mut s, &mut fx);
    assert_eq!(s.displayed_text(0), "Hi");
    let generation = s.generation();

    // An out-of-band command burst runs without touching displayed text.
    fx.clear();
    s.submit(r"\s[5]\![set,scaling,50]", Instant::now(), &mut fx);
    drain(&mut s, &mut fx);
    assert_eq!(s.displayed_text(0), "Hi");
    assert_eq!(s.generation(), generation);
    assert!(!fx.iter().any(|e| matches!(e, SideEffect::TextCleared { .. })));
    assert!(fx.contains(&SideEffect::SurfaceChanged {
        scope: 0,
        surface: 5
    }));
}

#[test]
fn scope_switch_clears_other_scopes() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hi\1Yo", Instant::now(), &mut fx);
    drain(&mut s, &mut fx);
    // Switching to scope 1 cleared scope 0's balloon: one speaker at a
    // time.
    assert_eq!(s.displayed_text(0), "");
    assert_eq!(s.displayed_text(1), "Yo");
    assert!(fx.contains(&SideEffect::TextCleared { scope: 0 }));
}

#[test]
fn click_gate_blocks_until_acknowledged() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hi\x", Instant::now(), &mut fx);
    // scope + "H" + "i"
    s.step(Instant::now(), &mut fx);
    s.step(Instant::now(), &mut fx);
    s.step(Instant::now(), &mut fx);

    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::AwaitClick);
    assert!(fx.contains(&SideEffect::ClickGateEntered { keep_text: false }));
    assert!(s.is_click_pending());

    // The clearing gate wipes the balloon when clicked through.
    fx.clear();
    s.click(&mut fx);
    assert!(!s.is_click_pending());
    assert!(fx.contains(&SideEffect::TextCleared { scope: 0 }));
    assert_eq!(s.displayed_text(0), "");
}

#[test]
fn noclear_gate_keeps_text() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hi\x[noclear]", Instant::now(), &mut fx);
    s.step(Instant::now(), &mut fx);
    s.step(Instant::now(), &mut fx);
    s.step(Instant::now(), &mut fx);
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::AwaitClick);
    s.click(&mut fx);
    assert_eq!(s.displayed_text(0), "Hi");
}

#[test]
fn time_base_anchors_absolute_waits() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    let t0 = Instant::now();
    s.submit(r"\__w[clear]\__w[200]", t0, &mut fx);
    // ResetTimeBase re-anchors at t0.
    assert_eq!(s.step(t0, &mut fx), StepOutcome::Working);
    // Still at t0: the full 200ms remain.
    assert_eq!(
        s.step(t0, &mut fx),
        StepOutcome::Delay(Duration::from_millis(200))
    );

    // When the target offset already passed, the wait degenerates to zero.
    let mut s = scheduler();
    s.submit(r"\__w[clear]\__w[200]", t0, &mut fx);
    assert_eq!(s.step(t0, &mut fx), StepOutcome::Working);
    let late = t0 + Duration::from_millis(500);
    assert_eq!(s.step(late, &mut fx), StepOutcome::Delay(Duration::ZERO));
}

#[test]
fn animation_wait_spelling() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\__w[animation,400]", Instant::now(), &mut fx);
    assert_eq!(
        s.step(Instant::now(), &mut fx),
        StepOutcome::AwaitAnimation(400)
    );
}

#[test]
fn sync_units_suspend_and_signal() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\![sync,wait,door,500]", Instant::now(), &mut fx);
    assert_eq!(
        s.step(Instant::now(), &mut fx),
        StepOutcome::AwaitSync {
            name: "door".into(),
            timeout_ms: 500
        }
    );

    // Signals are immediate units.
    let mut s = scheduler();
    s.submit(r"\![sync,signal,door]", Instant::now(), &mut fx);
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
}

#[test]
fn choices_fire_after_drain_not_in_place() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\q[Yes,OnYes]\q[No,OnNo]\z", Instant::now(), &mut fx);

    // The two choice units pop without presenting anything.
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Working);
    assert!(!fx.iter().any(|e| matches!(e, SideEffect::ChoicesPresented { .. })));

    // The dialog fires once the queue drains.
    assert_eq!(s.step(Instant::now(), &mut fx), StepOutcome::Idle);
    let presented = fx
        .iter()
        .find(|e| matches!(e, SideEffect::ChoicesPresented { .. }))
        .expect("choices presented at drain");
    if let SideEffect::ChoicesPresented {
        choices,
        cancelable,
        ..
    } = presented
    {
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].title, "Yes");
        assert!(cancelable);
    }
}

#[test]
fn command_registry_effects() {
    let props = Arc::new(MemoryProperties::new());
    let mut s = scheduler_with_props(props.clone());
    let mut fx = Vec::new();
    s.submit(
        r"\![raise,OnTest,ref0,ref1]\![set,scaling,50]\![anim,offset,300,40,50]\![set,property,counter,5]\8[ding.wav]",
        Instant::now(),
        &mut fx,
    );
    drain(&mut s, &mut fx);

    assert!(fx.contains(&SideEffect::EventRaised {
        id: "OnTest".into(),
        references: vec!["ref0".into(), "ref1".into()]
    }));
    assert!(fx.contains(&SideEffect::ScalingChanged {
        scope: 0,
        args: vec!["50".into()]
    }));
    assert!(fx.contains(&SideEffect::AnimationRequested(AnimAction::Offset {
        id: 300,
        x: 40,
        y: 50
    })));
    assert!(fx.contains(&SideEffect::SoundPlayed {
        file: "ding.wav".into()
    }));
    // The property write went through the injected store.
    assert_eq!(props.get("counter").as_deref(), Some("5"));
    assert!(fx.contains(&SideEffect::PropertyChanged {
        key: "counter".into(),
        value: "5".into()
    }));
}

#[test]
fn malformed_commands_are_silent_no_ops() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    // Unknown bang verb, short argument lists, unknown letter command:
    // all skipped, playback reaches the end normally.
    s.submit(
        r"\![frobnicate,1]\![raise]\![anim,offset,1]\j[2]\q[OnlyTitle]",
        Instant::now(),
        &mut fx,
    );
    drain(&mut s, &mut fx);
    assert!(fx.iter().all(|e| !matches!(
        e,
        SideEffect::EventRaised { .. } | SideEffect::AnimationRequested(_)
    )));
}

#[test]
fn vanish_surfaces_as_system_action() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\![vanishbymyself]", Instant::now(), &mut fx);
    drain(&mut s, &mut fx);
    assert!(fx.contains(&SideEffect::System(SystemAction::Vanish)));
}

#[test]
fn broadcast_group_mirrors_text() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\_s[0,1]Hey", Instant::now(), &mut fx);
    drain(&mut s, &mut fx);
    assert_eq!(s.displayed_text(0), "Hey");
    assert_eq!(s.displayed_text(1), "Hey");

    // `\e` turns the group off again.
    let mut fx = Vec::new();
    s.submit(r"\eSolo", Instant::now(), &mut fx);
    drain(&mut s, &mut fx);
    assert_eq!(s.displayed_text(0), "Solo");
    assert_eq!(s.displayed_text(1), "");
}

#[test]
fn balloon_clear_command() {
    let mut s = scheduler();
    let mut fx = Vec::new();
    s.submit(r"\0Hello\cFresh", Instant::now(), &mut fx);
    drain(&mut s, &mut fx);
    // `\c` wiped "Hello" before "Fresh" typed in.
    assert_eq!(s.displayed_text(0), "Fresh");
}
