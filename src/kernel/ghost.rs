use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::{AnimAction, SideEffect};
use super::scheduler::{Scheduler, StepOutcome};
use crate::anim::{AnimCommand, AnimationHandle, GhostId};
use crate::config::GhostConfig;
use crate::script::PropertyAccessor;
use crate::sync::SyncCenter;

/// Control messages into a ghost's driver task. Applied strictly between
/// scheduler steps, which is what makes a new script's clear-and-replace
/// atomic with respect to in-flight unit processing.
#[derive(Debug)]
pub enum Control {
    Script(String),
    Click,
    AnimationDone(i64),
}

/// One side effect, tagged with the ghost that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostOutput {
    pub ghost: GhostId,
    pub effect: SideEffect,
}

/// Cloneable handle to a running ghost.
#[derive(Clone)]
pub struct GhostHandle {
    id: GhostId,
    tx: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
}

impl GhostHandle {
    pub fn id(&self) -> GhostId {
        self.id
    }

    /// Hand a raw script to the playback scheduler. The caller sources the
    /// text (protocol listener, boot sequence, test); the kernel does not
    /// fetch anything itself.
    pub fn submit_script(&self, script: &str) {
        let _ = self.tx.send(Control::Script(script.to_string()));
    }

    /// External click acknowledgement; resumes a scheduler parked on a
    /// click gate, no-op otherwise.
    pub fn click(&self) {
        let _ = self.tx.send(Control::Click);
    }

    /// Animation-complete notification, routed from the engine's event
    /// stream by the application.
    pub fn animation_done(&self, id: i64) {
        let _ = self.tx.send(Control::AnimationDone(id));
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// The per-ghost driver: owns the scheduler and executes its suspensions.
/// Exactly one drain iteration runs at a time; every wait selects over the
/// control channel so a new visible script can cancel it.
pub struct Ghost {
    id: GhostId,
    scheduler: Scheduler,
    rx: mpsc::UnboundedReceiver<Control>,
    anim: AnimationHandle,
    sync: Arc<SyncCenter>,
    out: mpsc::UnboundedSender<GhostOutput>,
    cancel: CancellationToken,
}

impl Ghost {
    pub fn spawn(
        id: GhostId,
        config: &GhostConfig,
        props: Arc<dyn PropertyAccessor>,
        anim: AnimationHandle,
        sync: Arc<SyncCenter>,
        out: mpsc::UnboundedSender<GhostOutput>,
    ) -> GhostHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let ghost = Ghost {
            id,
            scheduler: Scheduler::new(config, props, sync.clone()),
            rx,
            anim,
            sync,
            out,
            cancel: cancel.clone(),
        };
        tokio::spawn(ghost.run());
        GhostHandle { id, tx, cancel }
    }

    async fn run(mut self) {
        loop {
            // Drain every control message that arrived since the last
            // step; scripts, clicks and completions only land here.
            loop {
                match self.rx.try_recv() {
                    Ok(ctrl) => self.apply_control(ctrl),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        self.teardown();
                        return;
                    }
                }
            }
            if self.cancel.is_cancelled() {
                self.teardown();
                return;
            }

            let mut effects = Vec::new();
            let outcome = self.scheduler.step(Instant::now(), &mut effects);
            self.emit(effects);

            let keep_going = match outcome {
                StepOutcome::Working => true,
                StepOutcome::Delay(d) => self.pause_for(d).await,
                StepOutcome::AwaitClick => self.await_click().await,
                StepOutcome::AwaitAnimation(id) => self.await_animation(id).await,
                StepOutcome::AwaitSync { name, timeout_ms } => {
                    self.await_sync(name, timeout_ms).await
                }
                StepOutcome::Idle => self.park().await,
            };
            if !keep_going {
                self.teardown();
                return;
            }
        }
    }

    fn apply_control(&mut self, ctrl: Control) {
        match ctrl {
            Control::Script(script) => {
                let mut effects = Vec::new();
                self.scheduler.submit(&script, Instant::now(), &mut effects);
                self.emit(effects);
            }
            Control::Click => {
                let mut effects = Vec::new();
                self.scheduler.click(&mut effects);
                self.emit(effects);
            }
            Control::AnimationDone(id) => self.scheduler.animation_done(id),
        }
    }

    fn emit(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            if let SideEffect::AnimationRequested(action) = &effect {
                self.forward_anim(action.clone());
            }
            let _ = self.out.send(GhostOutput {
                ghost: self.id,
                effect,
            });
        }
    }

    fn forward_anim(&self, action: AnimAction) {
        let owner = self.id;
        match action {
            AnimAction::Play { id } => self.anim.send(AnimCommand::Play { owner, id }),
            AnimAction::Pause { id } => self.anim.send(AnimCommand::Pause { owner, id }),
            AnimAction::Resume { id } => self.anim.send(AnimCommand::Resume { owner, id }),
            AnimAction::Clear { id } => self.anim.send(AnimCommand::Clear { owner, id }),
            AnimAction::Offset { id, x, y } => {
                self.anim.send(AnimCommand::Offset { owner, id, x, y })
            }
            // Overlay composition is a presentation concern; the sink
            // already received the effect.
            AnimAction::AddOverlay { .. } | AnimAction::AddTextOverlay { .. } => {}
        }
    }

    /// Queue empty: sleep until something arrives.
    async fn park(&mut self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            ctrl = self.rx.recv() => match ctrl {
                Some(ctrl) => {
                    self.apply_control(ctrl);
                    true
                }
                None => false,
            }
        }
    }

    /// Timed suspension. A new visible script (generation bump) abandons
    /// the remaining delay; other control traffic is applied and the
    /// delay keeps running.
    async fn pause_for(&mut self, delay: Duration) -> bool {
        let generation = self.scheduler.generation();
        let deadline = tokio::time::Instant::now() + delay;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep_until(deadline) => return true,
                ctrl = self.rx.recv() => match ctrl {
                    Some(ctrl) => {
                        self.apply_control(ctrl);
                        if self.scheduler.generation() != generation {
                            return true;
                        }
                    }
                    None => return false,
                }
            }
        }
    }

    /// Parked on a click gate. No auto-resume: only a click (or a new
    /// visible script) moves playback forward again.
    async fn await_click(&mut self) -> bool {
        let generation = self.scheduler.generation();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                ctrl = self.rx.recv() => match ctrl {
                    Some(ctrl) => {
                        self.apply_control(ctrl);
                        if !self.scheduler.is_click_pending()
                            || self.scheduler.generation() != generation
                        {
                            return true;
                        }
                    }
                    None => return false,
                }
            }
        }
    }

    /// Parked until the animation completes. An id that is not live in
    /// the engine resolves immediately — a missing animation degrades to
    /// a skipped wait, never a stuck scheduler.
    async fn await_animation(&mut self, id: i64) -> bool {
        if !self.anim.is_active(self.id, id).await {
            debug!(ghost = self.id, id, "animation wait skipped, id not active");
            self.scheduler.animation_done(id);
            return true;
        }
        let generation = self.scheduler.generation();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                ctrl = self.rx.recv() => match ctrl {
                    Some(ctrl) => {
                        self.apply_control(ctrl);
                        if !self.scheduler.is_awaiting_animation()
                            || self.scheduler.generation() != generation
                        {
                            return true;
                        }
                    }
                    None => return false,
                }
            }
        }
    }

    /// Parked inside a named synchronization wait. Timeout is a normal
    /// early continuation; a new visible script abandons the wait.
    async fn await_sync(&mut self, name: String, timeout_ms: i64) -> bool {
        let generation = self.scheduler.generation();
        let timeout = if timeout_ms <= 0 {
            None
        } else {
            Some(Duration::from_millis(timeout_ms as u64))
        };
        let sync = self.sync.clone();
        let wait = sync.wait(&name, timeout);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                elapsed = &mut wait => {
                    debug!(ghost = self.id, name = name.as_str(), ?elapsed, "sync wait released");
                    return true;
                }
                ctrl = self.rx.recv() => match ctrl {
                    Some(ctrl) => {
                        self.apply_control(ctrl);
                        if self.scheduler.generation() != generation {
                            return true;
                        }
                    }
                    None => return false,
                }
            }
        }
    }

    /// Actor shutdown: discard the queue and make sure the engine holds no
    /// instance keyed to this ghost.
    fn teardown(&mut self) {
        self.scheduler.stop();
        self.anim.stop_all(self.id);
        debug!(ghost = self.id, "ghost stopped");
    }
}
