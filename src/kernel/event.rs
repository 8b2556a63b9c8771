//! Side effects emitted by the playback scheduler.
//!
//! The kernel never draws pixels or touches windows; it describes what the
//! presentation layer should do as a typed event stream, in strict playback
//! order. The harness (or a real shell) consumes these.

/// One balloon choice accumulated by `\q`, presented as a dialog after the
/// script drains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub title: String,
    pub action: ChoiceAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceAction {
    /// Raise a named event with positional references on selection.
    Event { id: String, references: Vec<String> },
    /// Run an inline script on selection (`script:` form).
    Script(String),
}

/// Animation control requested by a script; the ghost driver forwards these
/// to the animation engine keyed with its own id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimAction {
    Play { id: i64 },
    Pause { id: i64 },
    Resume { id: i64 },
    Clear { id: i64 },
    Offset { id: i64, x: i32, y: i32 },
    AddOverlay { id: i64 },
    AddTextOverlay { id: i64, args: Vec<String> },
}

/// Out-of-band actions aimed at the surrounding application rather than a
/// balloon or a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemAction {
    Wallpaper { file: String, options: Vec<String> },
    TrayIcon { file: String, text: String },
    TrayNotification { options: Vec<String> },
    Sntp,
    Headline { name: String },
    MailCheck,
    UpdateCheck { target: String, options: Vec<String> },
    /// Self-termination of this ghost.
    Vanish,
    BootGhost { name: Option<String> },
    BootAllGhosts,
    ChangeGhost { name: String },
    ChangeShell { name: String },
    ChangeBalloon { name: String },
    CallGhost { name: String },
    OpenPreferences,
    OpenUrl,
    OpenEmail,
    ResetWindowPos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    // Balloon content
    TextAppended { scope: usize, text: String },
    TextCleared { scope: usize },
    /// Ranged balloon clear: `\c[char,3]` / `\c[line,1,2]`.
    TextClearedRange { scope: usize, args: Vec<String> },
    ClickGateEntered { keep_text: bool },
    ScriptEnded,

    // Scope / surface choreography
    ScopeSwitched { scope: usize },
    SurfaceChanged { scope: usize, surface: i64 },
    BalloonChanged { scope: usize, balloon: i64 },
    MovedAway { scope: usize },
    MovedClose { scope: usize },

    // Generic command surface
    EventRaised { id: String, references: Vec<String> },
    PropertyChanged { key: String, value: String },
    PropertyFetched { key: String, value: Option<String> },
    ChoicesPresented {
        choices: Vec<Choice>,
        cancelable: bool,
        timeout_ms: Option<u64>,
    },
    AnimationRequested(AnimAction),
    EffectApplied { name: String, args: Vec<String> },
    FilterApplied { name: String, args: Vec<String> },
    MoveRequested { args: Vec<String>, asynchronous: bool },

    // Window state
    ScalingChanged { scope: usize, args: Vec<String> },
    AlphaChanged { scope: usize, args: Vec<String> },
    PositionSet { args: Vec<String> },
    PositionReset,
    ZOrderSet { order: Vec<i64> },
    ZOrderReset,
    StickyWindowSet { scopes: Vec<i64> },
    StickyWindowReset,
    WindowStateChanged { args: Vec<String> },
    RepaintLock { target: String, locked: bool },

    // Presentation details passed through to the balloon/shell
    FontChanged { args: Vec<String> },
    BalloonImage { args: Vec<String> },
    AnchorChanged { args: Vec<String> },
    MarkerShown,
    NoWrapToggled,
    DressupBound {
        category: String,
        part: String,
        enabled: bool,
    },
    SoundPlayed { file: String },
    VoicePlayed { file: String },
    VoiceStopped,
    ModeChanged { mode: String, entered: bool },
    /// Catch-all for `\![set,...]` targets without a dedicated variant.
    SettingChanged { key: String, args: Vec<String> },

    System(SystemAction),
}
