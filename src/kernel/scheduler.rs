use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::debug;

use super::commands;
use super::event::{AnimAction, Choice, SideEffect};
use super::unit::{expand_tokens, PlaybackUnit};
use crate::config::GhostConfig;
use crate::script::{self, Expander, PropertyAccessor};
use crate::sync::SyncCenter;

/// What the driver must do after one `step()`:
/// idle, keep going, or suspend on a timer, a click, an animation or a
/// synchronization wait. These are the scheduler's only suspension points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// An immediate unit was applied; continue without yielding.
    Working,
    /// A delay-bearing unit was applied; resume after the delay.
    Delay(Duration),
    /// Parked until an external click acknowledgement.
    AwaitClick,
    /// Parked until the animation with this id reports completion.
    AwaitAnimation(i64),
    /// Parked inside a named synchronization wait.
    AwaitSync { name: String, timeout_ms: i64 },
    /// Queue empty; nothing to do until the next script arrives.
    Idle,
}

/// The playback scheduler: one per ghost, single logical thread of
/// control. `submit` turns a raw script into the pending unit queue;
/// `step` drains it one unit at a time, pushing side effects in strict
/// playback order and returning how to suspend. `step` never blocks and
/// performs no I/O — all waiting is done by the driver.
pub struct Scheduler {
    pub(crate) scopes: Vec<String>,
    pub(crate) current_scope: usize,
    queue: VecDeque<PlaybackUnit>,
    playing: bool,
    quick: bool,
    typing_interval: Duration,
    /// Monotonic anchor for `WaitUntil`, re-armed by `ResetTimeBase` and
    /// at the start of every new visible script.
    time_base: Instant,
    waiting_animation: Option<i64>,
    /// `Some(keep_text)` while parked on a click gate.
    pending_click: Option<bool>,
    /// Deferred dialog state: `\q` accumulates here, the dialog fires once
    /// when the queue drains (or `End` pops), never at the point of the
    /// command itself.
    pub(crate) pending_choices: Vec<Choice>,
    pub(crate) choice_cancelable: bool,
    pub(crate) choice_timeout_ms: Option<u64>,
    /// Cross-scope broadcast group (`\_s`): while set, text appends to
    /// every scope in the group. Reset by `End`.
    pub(crate) broadcast: Option<Vec<usize>>,
    /// Bumped whenever a new visible script replaces the queue; the driver
    /// uses it to abandon in-flight suspensions.
    generation: u64,
    pub(crate) expander: Expander,
    pub(crate) props: Arc<dyn PropertyAccessor>,
    pub(crate) sync: Arc<SyncCenter>,
}

impl Scheduler {
    pub fn new(
        config: &GhostConfig,
        props: Arc<dyn PropertyAccessor>,
        sync: Arc<SyncCenter>,
    ) -> Self {
        let mut expander = Expander::new(props.clone());
        expander.username = config.username.clone();
        expander.selfname = config.selfname.clone();
        expander.selfname2 = config.selfname2.clone();
        expander.keroname = config.keroname.clone();
        expander.screen_width = config.screen_width;
        expander.screen_height = config.screen_height;
        expander.lexicon = config.lexicon.clone();

        Self {
            scopes: vec![String::new(); config.scopes.max(1)],
            current_scope: 0,
            queue: VecDeque::new(),
            playing: false,
            quick: false,
            typing_interval: Duration::from_millis(config.typing_interval_ms),
            time_base: Instant::now(),
            waiting_animation: None,
            pending_click: None,
            pending_choices: Vec::new(),
            choice_cancelable: false,
            choice_timeout_ms: None,
            broadcast: None,
            generation: 0,
            expander,
            props,
            sync,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_click_pending(&self) -> bool {
        self.pending_click.is_some()
    }

    pub fn is_awaiting_animation(&self) -> bool {
        self.waiting_animation.is_some()
    }

    /// Displayed text of one scope (tests and balloon snapshots).
    pub fn displayed_text(&self, scope: usize) -> &str {
        self.scopes.get(scope).map(String::as_str).unwrap_or("")
    }

    /// Accept a new script.
    ///
    /// A script with visible text cancels the current queue outright:
    /// every scope's displayed text is cleared, quick mode and the time
    /// base reset, and the old queue's remaining units are discarded
    /// before the new units are enqueued. A command-only script is
    /// appended without clearing anything, so an out-of-band surface
    /// change can never interrupt a line of dialogue.
    pub fn submit(&mut self, raw: &str, now: Instant, effects: &mut Vec<SideEffect>) {
        let tokens = script::parse(raw);
        let visible = tokens
            .iter()
            .any(|t| matches!(t, crate::script::Token::Text(s) if !s.is_empty()));

        if visible {
            self.queue.clear();
            for scope in 0..self.scopes.len() {
                self.clear_scope_text(scope, effects);
            }
            self.quick = false;
            self.time_base = now;
            self.waiting_animation = None;
            self.pending_click = None;
            self.pending_choices.clear();
            self.choice_cancelable = false;
            self.broadcast = None;
            self.generation += 1;
        }

        let mut rng = rand::thread_rng();
        let units = expand_tokens(tokens, &mut self.quick, &self.expander, Local::now(), &mut rng);
        self.queue.extend(units);
        if !self.queue.is_empty() {
            self.playing = true;
        }
    }

    /// External click acknowledgement: release the gate. A clearing gate
    /// wipes the current scope's balloon before playback resumes.
    pub fn click(&mut self, effects: &mut Vec<SideEffect>) {
        if let Some(keep_text) = self.pending_click.take() {
            if !keep_text {
                let scope = self.current_scope;
                self.clear_scope_text(scope, effects);
            }
        }
    }

    /// Animation-complete callback; releases a matching animation wait.
    pub fn animation_done(&mut self, id: i64) {
        if self.waiting_animation == Some(id) {
            self.waiting_animation = None;
        }
    }

    /// Teardown: discard pending work and release wait state. The driver
    /// is responsible for stopping this ghost's animations.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.playing = false;
        self.pending_click = None;
        self.waiting_animation = None;
        self.pending_choices.clear();
    }

    /// One drain iteration. Pops the next unit, applies its side effects,
    /// and reports how the driver should proceed. Immediate units return
    /// `Working` and must never introduce a visible delay.
    pub fn step(&mut self, now: Instant, effects: &mut Vec<SideEffect>) -> StepOutcome {
        let unit = match self.queue.pop_front() {
            Some(u) => u,
            None => {
                self.finish_script(effects);
                return StepOutcome::Idle;
            }
        };

        match unit {
            PlaybackUnit::Scope(n) => {
                self.switch_scope(n, effects);
                StepOutcome::Working
            }
            PlaybackUnit::Surface(surface) => {
                effects.push(SideEffect::SurfaceChanged {
                    scope: self.current_scope,
                    surface,
                });
                StepOutcome::Working
            }
            PlaybackUnit::ResetTimeBase => {
                self.time_base = now;
                StepOutcome::Working
            }
            PlaybackUnit::End => {
                // Script lifetime ends here: quick mode and the broadcast
                // group reset for whatever comes next.
                self.quick = false;
                self.broadcast = None;
                self.present_choices(effects);
                effects.push(SideEffect::ScriptEnded);
                StepOutcome::Working
            }
            PlaybackUnit::Action { name, args } => {
                commands::dispatch(self, &name, &args, effects);
                StepOutcome::Working
            }
            PlaybackUnit::Char(c) => {
                let mut buf = [0u8; 4];
                self.append_text(c.encode_utf8(&mut buf), effects);
                StepOutcome::Delay(self.typing_interval)
            }
            PlaybackUnit::Chunk(s) => {
                self.append_text(&s, effects);
                StepOutcome::Working
            }
            PlaybackUnit::Newline => {
                self.append_text("\n", effects);
                StepOutcome::Delay(self.typing_interval)
            }
            PlaybackUnit::Wait(d) => StepOutcome::Delay(d),
            PlaybackUnit::WaitUntil(offset) => {
                let deadline = self.time_base + offset;
                StepOutcome::Delay(deadline.saturating_duration_since(now))
            }
            PlaybackUnit::ClickGate { keep_text } => {
                self.pending_click = Some(keep_text);
                effects.push(SideEffect::ClickGateEntered { keep_text });
                StepOutcome::AwaitClick
            }
            PlaybackUnit::Animation { id, wait } => {
                effects.push(SideEffect::AnimationRequested(AnimAction::Play { id }));
                if wait {
                    self.waiting_animation = Some(id);
                    StepOutcome::AwaitAnimation(id)
                } else {
                    StepOutcome::Working
                }
            }
            PlaybackUnit::AnimationWait(id) => {
                self.waiting_animation = Some(id);
                StepOutcome::AwaitAnimation(id)
            }
            PlaybackUnit::SyncWait { name, timeout_ms } => {
                StepOutcome::AwaitSync { name, timeout_ms }
            }
            PlaybackUnit::SyncSignal(name) => {
                self.sync.signal(&name);
                StepOutcome::Working
            }
        }
    }

    /// Queue drained: back to idle. A pending choice dialog fires now —
    /// after the whole script, never in the middle of it.
    fn finish_script(&mut self, effects: &mut Vec<SideEffect>) {
        self.present_choices(effects);
        self.playing = false;
    }

    fn present_choices(&mut self, effects: &mut Vec<SideEffect>) {
        if self.pending_choices.is_empty() {
            return;
        }
        effects.push(SideEffect::ChoicesPresented {
            choices: std::mem::take(&mut self.pending_choices),
            cancelable: self.choice_cancelable,
            timeout_ms: self.choice_timeout_ms,
        });
        self.choice_cancelable = false;
    }

    /// Only one speaker is visible at a time: switching scope clears every
    /// other scope's balloon and brings the new scope's window forward.
    fn switch_scope(&mut self, scope: usize, effects: &mut Vec<SideEffect>) {
        if scope >= self.scopes.len() {
            self.scopes.resize(scope + 1, String::new());
        }
        self.current_scope = scope;
        for other in 0..self.scopes.len() {
            if other != scope {
                self.clear_scope_text(other, effects);
            }
        }
        effects.push(SideEffect::ScopeSwitched { scope });
    }

    pub(crate) fn append_text(&mut self, text: &str, effects: &mut Vec<SideEffect>) {
        let targets: Vec<usize> = match &self.broadcast {
            Some(group) if !group.is_empty() => group.clone(),
            Some(_) => (0..self.scopes.len()).collect(),
            None => vec![self.current_scope],
        };
        for scope in targets {
            if scope >= self.scopes.len() {
                debug!(scope, "text append to unknown scope skipped");
                continue;
            }
            self.scopes[scope].push_str(text);
            effects.push(SideEffect::TextAppended {
                scope,
                text: text.to_string(),
            });
        }
    }

    pub(crate) fn clear_scope_text(&mut self, scope: usize, effects: &mut Vec<SideEffect>) {
        if let Some(text) = self.scopes.get_mut(scope) {
            if !text.is_empty() {
                text.clear();
                effects.push(SideEffect::TextCleared { scope });
            }
        }
    }
}
