/// One parsed element of a ghost script.
///
/// The first-class commands (scope, surface, animation, newline, end) get
/// their own variants; every other backslash command is carried as
/// `Command` with its raw name and bracket arguments and is interpreted
/// later by the playback scheduler. Argument arity is NOT validated here.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Plain text. Percent variables are kept verbatim in the payload and
    /// resolved by the environment expander at playback time.
    Text(String),
    /// Actor switch: `\0`/`\h`, `\1`/`\u`, `\p2`, `\p[N]`.
    Scope(usize),
    /// Surface (pose) switch: `\s3`, `\s[N]`.
    Surface(i64),
    /// Animation start: `\i[N]` or `\i[N,wait]`.
    Animation { id: i64, wait: bool },
    /// Line break: `\n`.
    Newline,
    /// Line break variation: `\n[half]`, `\n[150]`.
    NewlineVariation(String),
    /// Script end: `\e`.
    End,
    /// Any other command, e.g. `\w5` => ("w", ["5"]),
    /// `\![raise,OnTest]` => ("!", ["raise", "OnTest"]).
    Command { name: String, args: Vec<String> },
}

impl Token {
    pub fn command(name: &str, args: Vec<String>) -> Self {
        Token::Command {
            name: name.to_string(),
            args,
        }
    }

    /// True if this token contributes visible balloon content.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            Token::Text(_) | Token::Newline | Token::NewlineVariation(_)
        )
    }
}
