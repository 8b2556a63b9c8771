use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wisp::anim::{parse_surface_table, AnimCommand, AnimEvent, AnimationEngine};
use wisp::config::{GhostConfig, MemoryProperties};
use wisp::kernel::{Ghost, GhostOutput, SideEffect};
use wisp::sync::SyncCenter;

/// Built-in demo catalog: one run-once blink animation on surface 0.
const DEMO_SURFACES: &str = "\
surface0
{
10.interval,runonce
10.pattern0,101,80,0,0
10.pattern1,102,80,0,0
10.pattern2,-1,0,0,0
}
";

const DEMO_SCRIPTS: &[&str] = &[
    "\\0\\s[0]Hello, I'm awake.\\w5 It is %hour:%minute.\\n\\i[10,wait]\\1Took you long enough.\\e",
    "\\![set,scaling,80]",
    "\\0\\_qQuick mode skips the typing delay entirely.\\_q\\nDone.\\e",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    tracing::info!("ghost kernel booting");

    let sync = SyncCenter::new();
    let props = Arc::new(MemoryProperties::new());

    // Shared engines and the presentation sink channel.
    let (anim_events_tx, mut anim_events) = mpsc::unbounded_channel();
    let anim = AnimationEngine::spawn(anim_events_tx);
    let (out_tx, mut out) = mpsc::unbounded_channel::<GhostOutput>();

    let mut config = GhostConfig::default();
    config.selfname = Some("Wisp".to_string());
    config.keroname = Some("Mote".to_string());

    let ghost = Ghost::spawn(0, &config, props, anim.clone(), sync.clone(), out_tx);
    anim.send(AnimCommand::Load {
        owner: ghost.id(),
        defs: parse_surface_table(DEMO_SURFACES, 0),
    });

    // Feed the demo scripts on a timer, like an external listener would.
    let feeder = ghost.clone();
    tokio::spawn(async move {
        for script in DEMO_SCRIPTS {
            feeder.submit_script(script);
            tokio::time::sleep(Duration::from_secs(4)).await;
        }
    });

    tracing::info!("ghost active, press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = anim_events.recv() => match event {
                // The engine reports frames and completions; completions
                // route back to the owning ghost so an `\i[N,wait]` parked
                // scheduler resumes.
                Some(AnimEvent::Frame(frame)) => {
                    tracing::debug!(?frame, "animation frame");
                }
                Some(AnimEvent::Completed { owner, id }) => {
                    if owner == ghost.id() {
                        ghost.animation_done(id);
                    }
                }
                None => break,
            },
            output = out.recv() => match output {
                Some(GhostOutput { ghost: id, effect }) => render(id, effect),
                None => break,
            },
        }
    }

    ghost.shutdown();
    tracing::info!("ghost kernel stopped");
    Ok(())
}

/// Stand-in presentation sink: a real shell would draw; the harness logs.
fn render(ghost: usize, effect: SideEffect) {
    match effect {
        SideEffect::TextAppended { scope, text } => {
            print!("{}", text);
            use std::io::Write;
            let _ = std::io::stdout().flush();
            let _ = (ghost, scope);
        }
        SideEffect::TextCleared { scope } => {
            tracing::debug!(ghost, scope, "balloon cleared");
        }
        SideEffect::ScopeSwitched { scope } => {
            println!();
            tracing::info!(ghost, scope, "scope to front");
        }
        SideEffect::SurfaceChanged { scope, surface } => {
            tracing::info!(ghost, scope, surface, "surface changed");
        }
        SideEffect::ClickGateEntered { keep_text } => {
            tracing::info!(ghost, keep_text, "waiting for click");
        }
        SideEffect::ScriptEnded => {
            println!();
            tracing::info!(ghost, "script ended");
        }
        other => tracing::info!(ghost, effect = ?other, "presentation event"),
    }
}
