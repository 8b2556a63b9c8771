use super::token::Token;

/// Tokenizer for the backslash/percent ghost-script markup.
///
/// The parse is total: malformed or unknown command syntax degrades to a
/// generic `Command` token (or literal text) instead of failing, so one bad
/// command never stops the rest of the script from playing.
///
/// Escape sequences:
/// - `\\` -> literal backslash
/// - `\%` -> literal percent
/// - `\]` / `\[` -> literal bracket, only inside a `[...]` argument list
///
/// Argument lists are comma separated; an argument wrapped in `"` may
/// contain commas, and `""` inside a quoted run is a literal quote.
pub fn parse(script: &str) -> Vec<Token> {
    Parser::new(script).run()
}

/// Quick check whether the script contains any visible text token.
/// Used by the scheduler's new-script arrival policy: only scripts with
/// visible text cancel and replace the queue in flight.
pub fn contains_text(script: &str) -> bool {
    parse(script)
        .iter()
        .any(|t| matches!(t, Token::Text(s) if !s.is_empty()))
}

/// Multi-letter command vocabulary, matched longest-first after `\`.
/// `_V` (voice stop) is distinct from `_v` (voice play).
const UNDERSCORE_COMMANDS: [&str; 15] = [
    "__w", "__v", "__q", "_!", "_?", "_+", "_a", "_b", "_l", "_n", "_q", "_s", "_v", "_V", "_w",
];

struct Parser {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
    buffer: String,
}

impl Parser {
    fn new(script: &str) -> Self {
        Self {
            chars: script.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
            buffer: String::new(),
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let text = std::mem::take(&mut self.buffer);
            self.tokens.push(Token::Text(text));
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Read a `[...]` body starting at `start` (the char after `[`).
    /// Returns the unescaped body and the position after the closing `]`,
    /// or None when the bracket never closes.
    fn read_bracket(&self, start: usize) -> Option<(String, usize)> {
        let mut j = start;
        let mut out = String::new();
        while j < self.chars.len() {
            let c = self.chars[j];
            if c == '\\' && j + 1 < self.chars.len() {
                let next = self.chars[j + 1];
                if next == ']' || next == '[' {
                    out.push(next);
                    j += 2;
                    continue;
                }
            }
            if c == ']' {
                return Some((out, j + 1));
            }
            out.push(c);
            j += 1;
        }
        None
    }

    /// Read raw characters until `closing` (e.g. `\_!`) is found.
    /// Used by the tag-passthrough sections, whose body must stay unparsed.
    fn read_until_closing_tag(&self, start: usize, closing: &str) -> Option<(String, usize)> {
        let closing: Vec<char> = closing.chars().collect();
        let mut j = start;
        let mut out = String::new();
        while j < self.chars.len() {
            if j + closing.len() <= self.chars.len() && self.chars[j..j + closing.len()] == closing[..]
            {
                return Some((out, j + closing.len()));
            }
            out.push(self.chars[j]);
            j += 1;
        }
        None
    }

    /// Numeric run immediately after a command letter (`\s3`, `\p2`).
    fn read_digits(&self, start: usize) -> (String, usize) {
        let mut j = start;
        let mut num = String::new();
        while j < self.chars.len() && self.chars[j].is_ascii_digit() {
            num.push(self.chars[j]);
            j += 1;
        }
        (num, j)
    }

    /// Either `[body]` or an immediate digit run; commands like `\s` and
    /// `\p` accept both spellings.
    fn read_numeric_or_bracket(&self, start: usize) -> (String, usize) {
        if self.peek_at(start) == Some('[') {
            if let Some((body, end)) = self.read_bracket(start + 1) {
                return (body, end);
            }
            // Unterminated bracket: no argument, rescan from the `[` as text.
            return (String::new(), start);
        }
        self.read_digits(start)
    }

    fn read_bracket_args(&self, start: usize) -> (Vec<String>, usize) {
        if self.peek_at(start) == Some('[') {
            if let Some((body, end)) = self.read_bracket(start + 1) {
                return (parse_arguments(&body), end);
            }
            return (Vec::new(), start);
        }
        (Vec::new(), start)
    }

    fn peek_at(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).copied()
    }

    fn matches_at(&self, idx: usize, pat: &str) -> bool {
        let pat: Vec<char> = pat.chars().collect();
        idx + pat.len() <= self.chars.len() && self.chars[idx..idx + pat.len()] == pat[..]
    }

    fn run(mut self) -> Vec<Token> {
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            if ch == '%' {
                // `%*` is the one percent form handled at parse time; it is
                // equivalent to the `\![*]` marker command. Everything else
                // stays in the text payload for the expander.
                if self.peek(1) == Some('*') {
                    self.flush();
                    self.tokens.push(Token::command("!", vec!["*".into()]));
                    self.pos += 2;
                    continue;
                }
                self.buffer.push('%');
                self.pos += 1;
            } else if ch == '\\' {
                self.scan_command();
            } else {
                self.buffer.push(ch);
                self.pos += 1;
            }
        }
        self.flush();
        self.tokens
    }

    fn scan_command(&mut self) {
        // A trailing lone backslash is literal text.
        let next = match self.peek(1) {
            Some(c) => c,
            None => {
                self.buffer.push('\\');
                self.pos += 1;
                return;
            }
        };

        // Escapes resolve into the running text buffer.
        if next == '\\' || next == '%' {
            self.buffer.push(next);
            self.pos += 2;
            return;
        }

        self.flush();
        match next {
            '0' | 'h' => {
                self.tokens.push(Token::Scope(0));
                self.pos += 2;
            }
            '1' | 'u' => {
                self.tokens.push(Token::Scope(1));
                self.pos += 2;
            }
            'p' => {
                let (num, end) = self.read_numeric_or_bracket(self.pos + 2);
                self.tokens.push(Token::Scope(num.parse().unwrap_or(0)));
                self.pos = end;
            }
            's' => {
                let (num, end) = self.read_numeric_or_bracket(self.pos + 2);
                self.tokens.push(Token::Surface(num.parse().unwrap_or(0)));
                self.pos = end;
            }
            'i' => {
                let (args, end) = self.read_animation_args(self.pos + 2);
                match args.first().and_then(|a| a.parse::<i64>().ok()) {
                    Some(id) => {
                        let wait = args.get(1).is_some_and(|a| a.eq_ignore_ascii_case("wait"));
                        self.tokens.push(Token::Animation { id, wait });
                    }
                    // No numeric id: degrade to a generic command and let
                    // the scheduler decide what to do with it.
                    None => self.tokens.push(Token::command("i", args)),
                }
                self.pos = end;
            }
            'n' => {
                if self.peek(2) == Some('[') {
                    if let Some((body, end)) = self.read_bracket(self.pos + 3) {
                        self.tokens.push(Token::NewlineVariation(body));
                        self.pos = end;
                    } else {
                        self.tokens.push(Token::Newline);
                        self.pos += 2;
                    }
                } else {
                    self.tokens.push(Token::Newline);
                    self.pos += 2;
                }
            }
            'e' => {
                self.tokens.push(Token::End);
                self.pos += 2;
            }
            'w' => {
                // Kept as a command: `\w5` waits, but `\w10` has a
                // historical splitting quirk the scheduler reproduces.
                let (num, end) = self.read_numeric_or_bracket(self.pos + 2);
                let args = if num.is_empty() { vec![] } else { vec![num] };
                self.tokens.push(Token::command("w", args));
                self.pos = end;
            }
            'b' => {
                // Balloon id: `\b2`, `\b[2]`, `\b[-1]`, `\b[2,--fallback=0]`.
                self.scan_balloon();
            }
            '_' => {
                self.scan_underscore_command();
            }
            _ => {
                let (args, end) = self.read_bracket_args(self.pos + 2);
                self.tokens.push(Token::command(&next.to_string(), args));
                self.pos = end;
            }
        }
    }

    fn read_animation_args(&self, start: usize) -> (Vec<String>, usize) {
        if self.peek_at(start) == Some('[') {
            return self.read_bracket_args(start);
        }
        let (num, end) = self.read_digits(start);
        if num.is_empty() {
            (Vec::new(), end)
        } else {
            (vec![num], end)
        }
    }

    fn scan_balloon(&mut self) {
        let start = self.pos + 2;
        let mut id = String::new();
        let mut end = start;
        if self.peek_at(start) == Some('[') {
            if let Some((body, after)) = self.read_bracket(start + 1) {
                // Fallback lists (`2,--fallback=0`) resolve to the first id.
                id = body
                    .split(',')
                    .next()
                    .unwrap_or("0")
                    .trim()
                    .to_string();
                end = after;
            }
        } else {
            let mut j = start;
            while self
                .peek_at(j)
                .is_some_and(|c| c.is_ascii_digit() || c == '-')
            {
                id.push(self.chars[j]);
                j += 1;
            }
            end = j;
        }
        if id.parse::<i64>().is_ok() {
            self.tokens.push(Token::command("b", vec![id]));
        } else {
            let args = if id.is_empty() { vec![] } else { vec![id] };
            self.tokens.push(Token::command("b", args));
        }
        self.pos = end;
    }

    fn scan_underscore_command(&mut self) {
        // Longest match against the known multi-letter vocabulary, so that
        // `\_qQuick` is the quick marker followed by text rather than a
        // bogus `_qQuick` command.
        let mut name = String::new();
        for candidate in UNDERSCORE_COMMANDS {
            if candidate.len() > name.len() && self.matches_at(self.pos + 1, candidate) {
                name = candidate.to_string();
            }
        }
        let mut j;
        if name.is_empty() {
            // Unknown underscore command: scan letters and underscores and
            // let the scheduler log it away.
            j = self.pos + 2;
            name.push('_');
            while let Some(c) = self.peek_at(j) {
                if c.is_alphabetic() || c == '_' {
                    name.push(c);
                    j += 1;
                } else {
                    break;
                }
            }
        } else {
            j = self.pos + 1 + name.len();
        }

        // `\_!...\_!` and `\_?...\_?` are passthrough sections: the body is
        // emitted as one raw text token, commands inside left unparsed.
        if name == "_!" || name == "_?" {
            self.tokens.push(Token::command(&name, vec![]));
            let closing = format!("\\{}", name);
            if let Some((body, end)) = self.read_until_closing_tag(j, &closing) {
                if !body.is_empty() {
                    self.tokens.push(Token::Text(body));
                }
                self.tokens.push(Token::command(&name, vec![]));
                self.pos = end;
            } else {
                self.pos = j;
            }
            return;
        }

        let (args, end) = self.read_bracket_args(j);
        self.tokens.push(Token::Command { name, args });
        self.pos = end;
    }
}

/// Split a comma separated argument string with the quoting rules:
/// commas separate, `"` groups, `""` inside a group is a literal quote.
pub fn parse_arguments(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if quoted {
                if chars.get(i + 1) == Some(&'"') {
                    current.push('"');
                    i += 1;
                } else {
                    quoted = false;
                }
            } else {
                quoted = true;
            }
        } else if ch == ',' && !quoted {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
        i += 1;
    }
    if !current.is_empty() || !result.is_empty() {
        result.push(current);
    }
    result
}
