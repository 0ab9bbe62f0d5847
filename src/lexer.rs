//! Lexical analysis for the command language.
//!
//! The lexer is a small finite state machine over the characters of the
//! whole source text. It produces words (sequences of [`WordPart`]s) and
//! operator tokens, each tagged with the line it starts on.

use crate::error::ParseError;
use thiserror::Error;

/// A piece of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Unquoted text. Only unquoted words can be reserved words or assignments.
    Literal(String),
    /// Text that came from quotes or a backslash escape.
    Quoted(String),
    /// Parameter substitution: `$NAME`, `${NAME}` or a special parameter such as `$?`.
    Param(String),
    /// Command substitution, `$(...)`. Contains the text inside the parentheses.
    CmdSubst(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(Vec<WordPart>),
    /// A line break outside quotes.
    Newline,
    /// `;`
    Semi,
    /// `&&`
    AndIf,
    /// `||`
    OrIf,
    /// `|`
    Pipe,
    /// `&`
    Amp,
    /// `<`
    RedirectLeft,
    /// `>`
    RedirectRight,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
}

/// A token and the 1-based line where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexingError {
    #[error("unterminated single quote")]
    UnfinishedSingleQuote,
    #[error("unterminated double quote")]
    UnfinishedDoubleQuote,
    #[error("unterminated command substitution")]
    UnfinishedCmdSubst,
    #[error("unterminated parameter substitution")]
    UnfinishedParamSubst,
    #[error("backslash at end of input")]
    TrailingBackslash,
    #[error("bad substitution: ${{{text}}}")]
    BadSubstitution { line: usize, text: String },
}

impl From<LexingError> for ParseError {
    fn from(e: LexingError) -> Self {
        match e {
            LexingError::BadSubstitution { line, .. } => ParseError::Invalid {
                line,
                message: e.to_string(),
            },
            other => ParseError::Incomplete(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
    ReadingComment,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    line: usize,
    word_line: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
}

impl LexingFSM {
    fn new(source: &str) -> Self {
        LexingFSM {
            input: source.chars().collect(),
            pos: 0,
            line: 1,
            word_line: 1,
            state: LexingState::Start,
            current_word: Vec::new(),
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<Spanned>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_unquoted(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
                LexingState::ReadingComment => {
                    if ch == '\n' {
                        self.push(&mut out, Token::Newline, self.line - 1);
                        self.state = LexingState::Start;
                    }
                }
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(LexingError::UnfinishedSingleQuote),
            LexingState::ReadingDoubleQuote => return Err(LexingError::UnfinishedDoubleQuote),
            _ => {}
        }
        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
            }
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn push(&self, out: &mut Vec<Spanned>, token: Token, line: usize) {
        out.push(Spanned { token, line });
    }

    fn start_word(&mut self) {
        if self.state != LexingState::ReadingWord {
            self.state = LexingState::ReadingWord;
            self.word_line = self.line;
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Spanned>) {
        if self.state == LexingState::ReadingWord {
            let parts = std::mem::take(&mut self.current_word);
            self.push(out, Token::Word(parts), self.word_line);
            self.state = LexingState::Start;
        }
    }

    fn push_text(&mut self, ch: char, quoted: bool) {
        match self.current_word.last_mut() {
            Some(WordPart::Literal(s)) if !quoted => s.push(ch),
            Some(WordPart::Quoted(s)) if quoted => s.push(ch),
            _ if quoted => self.current_word.push(WordPart::Quoted(ch.to_string())),
            _ => self.current_word.push(WordPart::Literal(ch.to_string())),
        }
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<Spanned>) -> Result<(), LexingError> {
        let line = self.line;
        match ch {
            ' ' | '\t' | '\r' => self.finish_word(out),
            '\n' => {
                self.finish_word(out);
                self.push(out, Token::Newline, line - 1);
            }
            '#' if self.state == LexingState::Start => self.state = LexingState::ReadingComment,
            ';' | '&' | '|' | '<' | '>' | '(' | ')' => {
                self.finish_word(out);
                let token = match ch {
                    ';' => Token::Semi,
                    '&' if self.peek_char() == Some('&') => {
                        self.read_char();
                        Token::AndIf
                    }
                    '&' => Token::Amp,
                    '|' if self.peek_char() == Some('|') => {
                        self.read_char();
                        Token::OrIf
                    }
                    '|' => Token::Pipe,
                    '<' => Token::RedirectLeft,
                    '>' => Token::RedirectRight,
                    '(' => Token::LeftParen,
                    _ => Token::RightParen,
                };
                self.push(out, token, line);
            }
            '\\' => match self.read_char() {
                // Line continuation
                Some('\n') => {}
                Some(c) => {
                    self.start_word();
                    self.push_text(c, true);
                }
                None => return Err(LexingError::TrailingBackslash),
            },
            '\'' => {
                self.start_word();
                self.current_word.push(WordPart::Quoted(String::new()));
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.start_word();
                self.current_word.push(WordPart::Quoted(String::new()));
                self.state = LexingState::ReadingDoubleQuote;
            }
            '$' => {
                self.start_word();
                self.read_dollar(false)?;
            }
            c => {
                self.start_word();
                self.push_text(c, false);
            }
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.push_text(c, true),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.peek_char() {
                Some('\n') => {
                    self.read_char();
                }
                Some(c @ ('$' | '"' | '\\' | '`')) => {
                    self.read_char();
                    self.push_text(c, true);
                }
                _ => self.push_text('\\', true),
            },
            '$' => self.read_dollar(true)?,
            c => self.push_text(c, true),
        }
        Ok(())
    }

    /// Handle the text following a `$`.
    fn read_dollar(&mut self, quoted: bool) -> Result<(), LexingError> {
        match self.peek_char() {
            Some('{') => {
                self.read_char();
                let line = self.line;
                let text = self.collect_until('}', LexingError::UnfinishedParamSubst)?;
                if !is_param_name(&text) {
                    return Err(LexingError::BadSubstitution { line, text });
                }
                self.current_word.push(WordPart::Param(text));
            }
            Some('(') => {
                self.read_char();
                let nested = self.collect_cmdsubst()?;
                self.current_word.push(WordPart::CmdSubst(nested));
            }
            Some(c @ ('?' | '#' | '@' | '*' | '0'..='9')) => {
                self.read_char();
                self.current_word.push(WordPart::Param(c.to_string()));
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    self.read_char();
                }
                self.current_word.push(WordPart::Param(name));
            }
            _ => self.push_text('$', quoted),
        }
        Ok(())
    }

    fn collect_until(&mut self, end: char, err: LexingError) -> Result<String, LexingError> {
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            if ch == end {
                return Ok(s);
            }
            s.push(ch);
        }
        Err(err)
    }

    /// Collects characters within a command substitution block `$(...)`.
    /// Handles nested parentheses by tracking the depth.
    fn collect_cmdsubst(&mut self) -> Result<String, LexingError> {
        let mut depth = 1;
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(s);
                    }
                }
                _ => {}
            }
            s.push(ch);
        }
        Err(LexingError::UnfinishedCmdSubst)
    }
}

/// Names accepted inside `${...}`.
fn is_param_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some('?' | '#' | '@' | '*') => text.len() == 1,
        Some(c) if c.is_ascii_digit() => text.chars().all(|c| c.is_ascii_digit()),
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexingError> {
    LexingFSM::new(source).make_tokens()
}
