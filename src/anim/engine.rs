use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::catalog::{AnimationDefinition, AnimationPattern, TriggerInterval};

/// One ghost instance, used to key active animations so teardown of a
/// single ghost cannot orphan instances belonging to another.
pub type GhostId = usize;

const TICK: Duration = Duration::from_micros(1_000_000 / 60);

/// Per-frame report for one active animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub owner: GhostId,
    pub id: i64,
    pub surface_id: i64,
    pub x: i32,
    pub y: i32,
}

/// Mutable per-play state. The definition is shared, never owned.
struct ActiveAnimation {
    def: Arc<AnimationDefinition>,
    pattern_index: usize,
    time_base: Instant,
    paused: bool,
    offset: (i32, i32),
}

impl ActiveAnimation {
    fn new(def: Arc<AnimationDefinition>, now: Instant) -> Self {
        Self {
            def,
            pattern_index: 0,
            time_base: now,
            paused: false,
            offset: (0, 0),
        }
    }

    fn current_pattern(&self) -> Option<&AnimationPattern> {
        self.def.patterns.get(self.pattern_index)
    }

    /// Advance past the current pattern when its duration has elapsed.
    /// Returns true when a `RunOnce` animation ran off the end of its list.
    fn update(&mut self, now: Instant) -> bool {
        if self.paused {
            return false;
        }
        let duration_ms = match self.current_pattern() {
            Some(p) => p.duration_ms,
            None => return false,
        };
        let elapsed = now.saturating_duration_since(self.time_base);
        if elapsed.as_millis() as u64 >= duration_ms {
            self.pattern_index += 1;
            self.time_base = now;
            if self.pattern_index >= self.def.patterns.len() {
                if self.def.interval == TriggerInterval::RunOnce {
                    return true;
                }
                self.pattern_index = 0;
            }
        }
        false
    }
}

/// The synchronous animation core: catalogs plus the active-instance set.
/// All timing comes in through `now` parameters so tests can drive it with
/// fabricated instants; the async engine task owns the real clock.
#[derive(Default)]
pub struct AnimationSet {
    catalogs: HashMap<GhostId, HashMap<i64, Arc<AnimationDefinition>>>,
    active: HashMap<(GhostId, i64), ActiveAnimation>,
}

impl AnimationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (replace) the catalog for one owner.
    pub fn load(&mut self, owner: GhostId, defs: Vec<AnimationDefinition>) {
        let table = defs.into_iter().map(|d| (d.id, Arc::new(d))).collect();
        self.catalogs.insert(owner, table);
    }

    /// Start (or restart) an animation. Replaces any existing instance for
    /// the same id. Returns false when the id is not in the catalog.
    pub fn play(&mut self, owner: GhostId, id: i64, now: Instant) -> bool {
        let def = match self.catalogs.get(&owner).and_then(|t| t.get(&id)) {
            Some(d) => d.clone(),
            None => {
                warn!(owner, id, "animation not found in catalog");
                return false;
            }
        };
        self.active
            .insert((owner, id), ActiveAnimation::new(def, now));
        true
    }

    pub fn pause(&mut self, owner: GhostId, id: i64) {
        if let Some(a) = self.active.get_mut(&(owner, id)) {
            a.paused = true;
        }
    }

    pub fn resume(&mut self, owner: GhostId, id: i64) {
        if let Some(a) = self.active.get_mut(&(owner, id)) {
            a.paused = false;
        }
    }

    /// Persistent additive offset applied to all subsequent frames.
    pub fn offset(&mut self, owner: GhostId, id: i64, x: i32, y: i32) {
        if let Some(a) = self.active.get_mut(&(owner, id)) {
            a.offset = (x, y);
        }
    }

    /// Remove an instance immediately. Returns true when it existed, in
    /// which case the caller reports the same completion as a natural end.
    pub fn clear(&mut self, owner: GhostId, id: i64) -> bool {
        self.active.remove(&(owner, id)).is_some()
    }

    /// Drop every instance belonging to one owner (actor teardown).
    pub fn stop_all(&mut self, owner: GhostId) {
        self.active.retain(|(o, _), _| *o != owner);
        self.catalogs.remove(&owner);
    }

    pub fn is_active(&self, owner: GhostId, id: i64) -> bool {
        self.active.contains_key(&(owner, id))
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// One engine tick: advance every running, unpaused instance, report a
    /// frame for each current pattern with a non-negative surface id, and
    /// return the instances that completed naturally (already removed).
    pub fn update(&mut self, now: Instant) -> (Vec<Frame>, Vec<(GhostId, i64)>) {
        let mut frames = Vec::new();
        let mut completed = Vec::new();
        for (&(owner, id), anim) in self.active.iter_mut() {
            let done = anim.update(now);
            if let Some(p) = anim.current_pattern() {
                if p.surface_id >= 0 {
                    frames.push(Frame {
                        owner,
                        id,
                        surface_id: p.surface_id,
                        x: p.x + anim.offset.0,
                        y: p.y + anim.offset.1,
                    });
                }
            }
            if done {
                completed.push((owner, id));
            }
        }
        for key in &completed {
            self.active.remove(key);
        }
        (frames, completed)
    }
}

/// Commands into the engine task. All mutation of the shared active set
/// flows through this one channel (single-writer discipline).
#[derive(Debug)]
pub enum AnimCommand {
    Load {
        owner: GhostId,
        defs: Vec<AnimationDefinition>,
    },
    Play {
        owner: GhostId,
        id: i64,
    },
    Pause {
        owner: GhostId,
        id: i64,
    },
    Resume {
        owner: GhostId,
        id: i64,
    },
    Clear {
        owner: GhostId,
        id: i64,
    },
    Offset {
        owner: GhostId,
        id: i64,
        x: i32,
        y: i32,
    },
    StopAll {
        owner: GhostId,
    },
    IsActive {
        owner: GhostId,
        id: i64,
        reply: oneshot::Sender<bool>,
    },
}

/// Events out of the engine task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimEvent {
    Frame(Frame),
    /// Fired on natural `RunOnce` completion and on explicit clear — the
    /// two paths are indistinguishable to callers, so a scheduler parked
    /// on an animation wait resumes either way.
    Completed { owner: GhostId, id: i64 },
}

/// Cloneable handle to the engine task.
#[derive(Clone)]
pub struct AnimationHandle {
    tx: mpsc::UnboundedSender<AnimCommand>,
}

impl AnimationHandle {
    pub fn send(&self, cmd: AnimCommand) {
        if self.tx.send(cmd).is_err() {
            debug!("animation engine is gone, command dropped");
        }
    }

    pub fn stop_all(&self, owner: GhostId) {
        self.send(AnimCommand::StopAll { owner });
    }

    /// Query whether an instance is live. Commands are processed in send
    /// order, so a query issued after `Play` observes its result. Returns
    /// false when the engine task has already shut down.
    pub async fn is_active(&self, owner: GhostId, id: i64) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(AnimCommand::IsActive { owner, id, reply });
        rx.await.unwrap_or(false)
    }
}

/// The engine task: owns the `AnimationSet`, drains its command channel,
/// and ticks at 60 Hz — but only while at least one instance is running,
/// so an idle ghost costs no timer wakeups.
pub struct AnimationEngine {
    set: AnimationSet,
    rx: mpsc::UnboundedReceiver<AnimCommand>,
    events: mpsc::UnboundedSender<AnimEvent>,
}

impl AnimationEngine {
    pub fn spawn(events: mpsc::UnboundedSender<AnimEvent>) -> AnimationHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            set: AnimationSet::new(),
            rx,
            events,
        };
        tokio::spawn(engine.run());
        AnimationHandle { tx }
    }

    async fn run(mut self) {
        loop {
            if self.set.is_empty() {
                // Idle: park on the command channel, no timer.
                match self.rx.recv().await {
                    Some(cmd) => self.apply(cmd),
                    None => return,
                }
                continue;
            }
            let mut ticker = tokio::time::interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            while !self.set.is_empty() {
                tokio::select! {
                    cmd = self.rx.recv() => match cmd {
                        Some(cmd) => self.apply(cmd),
                        None => return,
                    },
                    _ = ticker.tick() => self.tick(),
                }
            }
        }
    }

    fn tick(&mut self) {
        let (frames, completed) = self.set.update(Instant::now());
        for frame in frames {
            let _ = self.events.send(AnimEvent::Frame(frame));
        }
        for (owner, id) in completed {
            let _ = self.events.send(AnimEvent::Completed { owner, id });
        }
    }

    fn apply(&mut self, cmd: AnimCommand) {
        match cmd {
            AnimCommand::Load { owner, defs } => self.set.load(owner, defs),
            AnimCommand::Play { owner, id } => {
                self.set.play(owner, id, Instant::now());
            }
            AnimCommand::Pause { owner, id } => self.set.pause(owner, id),
            AnimCommand::Resume { owner, id } => self.set.resume(owner, id),
            AnimCommand::Clear { owner, id } => {
                // Explicit clear converges on the natural completion path.
                if self.set.clear(owner, id) {
                    let _ = self.events.send(AnimEvent::Completed { owner, id });
                }
            }
            AnimCommand::Offset { owner, id, x, y } => self.set.offset(owner, id, x, y),
            AnimCommand::StopAll { owner } => self.set.stop_all(owner),
            AnimCommand::IsActive { owner, id, reply } => {
                let _ = reply.send(self.set.is_active(owner, id));
            }
        }
    }
}
