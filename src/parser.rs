//! Recursive-descent parser turning tokens into a [`Program`].
//!
//! Every syntax error is classified: [`ParseError::Incomplete`] when the
//! text so far is a valid prefix of a longer program (the interactive loop
//! asks for another line), [`ParseError::Invalid`] otherwise.

use crate::error::ParseError;
use crate::lexer::{self, Spanned, Token, WordPart};

/// A shell word: parts concatenated after expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word(pub Vec<WordPart>);

impl Word {
    /// The word's text when it is a single unquoted literal.
    fn as_plain(&self) -> Option<&str> {
        match self.0.as_slice() {
            [WordPart::Literal(s)] => Some(s),
            _ => None,
        }
    }
}

/// `NAME=value` in front of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand {
    pub assignments: Vec<Assignment>,
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    Until,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Simple(SimpleCommand),
    /// `if`/`elif` branches as (condition, body) pairs, then the `else` body.
    If {
        branches: Vec<(Vec<AndOr>, Vec<AndOr>)>,
        otherwise: Option<Vec<AndOr>>,
    },
    Loop {
        kind: LoopKind,
        condition: Vec<AndOr>,
        body: Vec<AndOr>,
    },
    /// `items` is `None` when the `in` clause is absent: iterate over `$@`.
    For {
        variable: String,
        items: Option<Vec<Word>>,
        body: Vec<AndOr>,
    },
}

/// A command, optionally negated with `!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub negated: bool,
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Statements joined by `&&` and `||`, evaluated left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndOr {
    pub first: Statement,
    pub rest: Vec<(Connector, Statement)>,
}

/// A parsed program: the top-level list of commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub body: Vec<AndOr>,
}

impl Program {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

const RESERVED: [&str; 6] = ["then", "elif", "else", "fi", "do", "done"];

struct AstBuilder {
    tokens: Vec<Spanned>,
    pos: usize,
    last_line: usize,
}

type ParseResult<T> = Result<T, ParseError>;

impl AstBuilder {
    fn from(tokens: Vec<Spanned>) -> Self {
        let last_line = tokens.last().map_or(1, |t| t.line);
        AstBuilder {
            tokens,
            pos: 0,
            last_line,
        }
    }

    fn build_ast(mut self) -> ParseResult<Program> {
        let body = self.parse_list(&[])?;
        Ok(Program { body })
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn consume(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// The reserved word at the current position, if any.
    fn peek_keyword(&self) -> Option<&str> {
        match self.peek_token() {
            Some(Token::Word(parts)) => match parts.as_slice() {
                [WordPart::Literal(s)] => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    fn skip_newlines(&mut self) {
        while let Some(Token::Newline) = self.peek_token() {
            self.pos += 1;
        }
    }

    fn invalid(&self, message: impl Into<String>) -> ParseError {
        let line = self.peek().map_or(self.last_line, |t| t.line);
        ParseError::Invalid {
            line,
            message: message.into(),
        }
    }

    /// Error for a token that cannot appear where it was found.
    fn unexpected(&self) -> ParseError {
        let Some(spanned) = self.peek() else {
            return ParseError::Incomplete("expected a command".to_string());
        };
        let message = match &spanned.token {
            Token::Pipe => "pipelines are not supported".to_string(),
            Token::Amp => "background jobs are not supported".to_string(),
            Token::RedirectLeft | Token::RedirectRight => {
                "redirections are not supported".to_string()
            }
            Token::LeftParen | Token::RightParen => "subshells are not supported".to_string(),
            Token::Semi => "syntax error near unexpected token `;'".to_string(),
            Token::AndIf => "syntax error near unexpected token `&&'".to_string(),
            Token::OrIf => "syntax error near unexpected token `||'".to_string(),
            Token::Newline => "syntax error near unexpected newline".to_string(),
            Token::Word(parts) => {
                let word = Word(parts.clone());
                match word.as_plain() {
                    Some(text) => format!("syntax error near unexpected token `{text}'"),
                    None => "syntax error near unexpected word".to_string(),
                }
            }
        };
        self.invalid(message)
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        match self.peek_keyword() {
            Some(k) if k == keyword => {
                self.pos += 1;
                Ok(())
            }
            _ if self.peek().is_none() => Err(ParseError::Incomplete(format!("expected `{keyword}'"))),
            _ => Err(self.unexpected()),
        }
    }

    /// Parse and-or lists separated by `;` or newlines until one of
    /// `terminators` is seen at command position (or the end of input when
    /// there are none).
    fn parse_list(&mut self, terminators: &[&str]) -> ParseResult<Vec<AndOr>> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                if terminators.is_empty() {
                    break;
                }
                return Err(ParseError::Incomplete(format!(
                    "expected `{}'",
                    terminators.join("' or `")
                )));
            }
            if let Some(keyword) = self.peek_keyword() {
                if terminators.contains(&keyword) {
                    if items.is_empty() {
                        return Err(self.unexpected());
                    }
                    break;
                }
            }

            items.push(self.parse_and_or()?);

            match self.peek_token() {
                None => {}
                Some(Token::Semi | Token::Newline) => self.pos += 1,
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(items)
    }

    /// and_or: statement (('&&' | '||') linebreak statement)*
    fn parse_and_or(&mut self) -> ParseResult<AndOr> {
        let first = self.parse_statement()?;
        let mut rest = Vec::new();
        loop {
            let connector = match self.peek_token() {
                Some(Token::AndIf) => Connector::And,
                Some(Token::OrIf) => Connector::Or,
                _ => break,
            };
            self.pos += 1;
            self.skip_newlines();
            if self.peek().is_none() {
                return Err(ParseError::Incomplete(
                    "expected a command after `&&' or `||'".to_string(),
                ));
            }
            rest.push((connector, self.parse_statement()?));
        }
        Ok(AndOr { first, rest })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let negated = self.peek_keyword() == Some("!");
        if negated {
            self.pos += 1;
        }
        let command = self.parse_command()?;
        Ok(Statement { negated, command })
    }

    fn parse_command(&mut self) -> ParseResult<Command> {
        match self.peek_keyword() {
            Some("if") => return self.parse_if(),
            Some("while") => return self.parse_loop(LoopKind::While),
            Some("until") => return self.parse_loop(LoopKind::Until),
            Some("for") => return self.parse_for(),
            Some(k) if RESERVED.contains(&k) => return Err(self.unexpected()),
            _ => {}
        }
        match self.peek_token() {
            Some(Token::Word(_)) => self.parse_simple().map(Command::Simple),
            _ => Err(self.unexpected()),
        }
    }

    /// simple_command: assignment* word*
    fn parse_simple(&mut self) -> ParseResult<SimpleCommand> {
        let mut assignments = Vec::new();
        let mut words = Vec::new();
        while let Some(Token::Word(_)) = self.peek_token() {
            let word = self.parse_word()?;
            if words.is_empty() {
                if let Some(assignment) = as_assignment(&word) {
                    assignments.push(assignment);
                    continue;
                }
            }
            words.push(word);
        }
        Ok(SimpleCommand { assignments, words })
    }

    fn parse_word(&mut self) -> ParseResult<Word> {
        let Some(Spanned {
            token: Token::Word(parts),
            line,
        }) = self.consume()
        else {
            return Err(self.unexpected());
        };
        if parts.iter().any(|p| matches!(p, WordPart::CmdSubst(_))) {
            return Err(ParseError::Invalid {
                line,
                message: "command substitution is not supported".to_string(),
            });
        }
        Ok(Word(parts))
    }

    /// if_clause: 'if' list 'then' list ('elif' list 'then' list)* ('else' list)? 'fi'
    fn parse_if(&mut self) -> ParseResult<Command> {
        self.expect_keyword("if")?;
        let mut branches = Vec::new();
        let mut otherwise = None;
        loop {
            let condition = self.parse_list(&["then"])?;
            self.expect_keyword("then")?;
            let body = self.parse_list(&["elif", "else", "fi"])?;
            branches.push((condition, body));
            match self.peek_keyword() {
                Some("elif") => self.pos += 1,
                Some("else") => {
                    self.pos += 1;
                    otherwise = Some(self.parse_list(&["fi"])?);
                    self.expect_keyword("fi")?;
                    break;
                }
                _ => {
                    self.expect_keyword("fi")?;
                    break;
                }
            }
        }
        Ok(Command::If { branches, otherwise })
    }

    /// while_clause / until_clause: ('while' | 'until') list 'do' list 'done'
    fn parse_loop(&mut self, kind: LoopKind) -> ParseResult<Command> {
        self.pos += 1;
        let condition = self.parse_list(&["do"])?;
        self.expect_keyword("do")?;
        let body = self.parse_list(&["done"])?;
        self.expect_keyword("done")?;
        Ok(Command::Loop {
            kind,
            condition,
            body,
        })
    }

    /// for_clause: 'for' NAME ('in' word*)? (';' | newline)? linebreak 'do' list 'done'
    fn parse_for(&mut self) -> ParseResult<Command> {
        self.expect_keyword("for")?;
        let variable = match self.peek_keyword() {
            Some(name) if is_name(name) => name.to_string(),
            _ if self.peek().is_none() => {
                return Err(ParseError::Incomplete("expected a variable name".to_string()));
            }
            _ => return Err(self.invalid("`for' needs a variable name")),
        };
        self.pos += 1;

        let mut items = None;
        self.skip_newlines();
        if self.peek_keyword() == Some("in") {
            self.pos += 1;
            let mut words = Vec::new();
            while let Some(Token::Word(_)) = self.peek_token() {
                words.push(self.parse_word()?);
            }
            match self.peek_token() {
                Some(Token::Semi | Token::Newline) => self.pos += 1,
                None => return Err(ParseError::Incomplete("expected `do'".to_string())),
                Some(_) => return Err(self.unexpected()),
            }
            items = Some(words);
        } else if let Some(Token::Semi) = self.peek_token() {
            self.pos += 1;
        }

        self.skip_newlines();
        self.expect_keyword("do")?;
        let body = self.parse_list(&["done"])?;
        self.expect_keyword("done")?;
        Ok(Command::For {
            variable,
            items,
            body,
        })
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Recognize `NAME=value`: the name must be unquoted and valid.
fn as_assignment(word: &Word) -> Option<Assignment> {
    let Some(WordPart::Literal(head)) = word.0.first() else {
        return None;
    };
    let (name, value) = head.split_once('=')?;
    if !is_name(name) {
        return None;
    }
    let mut parts = Vec::new();
    if !value.is_empty() {
        parts.push(WordPart::Literal(value.to_string()));
    }
    parts.extend(word.0[1..].iter().cloned());
    Some(Assignment {
        name: name.to_string(),
        value: Word(parts),
    })
}

/// Parse source text into a [`Program`].
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = lexer::tokenize(source)?;
    AstBuilder::from(tokens).build_ast()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> WordPart {
        WordPart::Literal(s.to_string())
    }

    fn plain(s: &str) -> Word {
        Word(vec![lit(s)])
    }

    fn simple(words: &[&str]) -> Command {
        Command::Simple(SimpleCommand {
            assignments: vec![],
            words: words.iter().map(|w| plain(w)).collect(),
        })
    }

    fn single(command: Command) -> AndOr {
        AndOr {
            first: Statement {
                negated: false,
                command,
            },
            rest: vec![],
        }
    }

    fn invalid_message(source: &str) -> String {
        match parse(source) {
            Err(ParseError::Invalid { message, .. }) => message,
            other => panic!("{source:?}: expected an invalid program, got {other:?}"),
        }
    }

    #[test]
    fn empty_and_blank_sources_are_empty_programs() {
        for source in ["", "\n\n", "   # only a comment\n"] {
            assert!(parse(source).unwrap().is_empty(), "{source:?}");
        }
        assert_eq!(
            invalid_message(";"),
            "syntax error near unexpected token `;'"
        );
    }

    #[test]
    fn commands_split_on_separators() {
        let program = parse("echo a; echo b\npwd").unwrap();
        assert_eq!(
            program.body,
            vec![
                single(simple(&["echo", "a"])),
                single(simple(&["echo", "b"])),
                single(simple(&["pwd"])),
            ]
        );
    }

    #[test]
    fn and_or_chains_and_negation() {
        let program = parse("! false && true ||\n echo x").unwrap();
        let and_or = &program.body[0];
        assert!(and_or.first.negated);
        assert_eq!(and_or.first.command, simple(&["false"]));
        assert_eq!(
            and_or.rest,
            vec![
                (
                    Connector::And,
                    Statement {
                        negated: false,
                        command: simple(&["true"])
                    }
                ),
                (
                    Connector::Or,
                    Statement {
                        negated: false,
                        command: simple(&["echo", "x"])
                    }
                ),
            ]
        );
    }

    #[test]
    fn assignments_only_before_the_command_name() {
        let program = parse("A=1 B= cmd C=3").unwrap();
        let Command::Simple(cmd) = &program.body[0].first.command else {
            panic!("expected a simple command");
        };
        assert_eq!(
            cmd.assignments,
            vec![
                Assignment {
                    name: "A".into(),
                    value: plain("1")
                },
                Assignment {
                    name: "B".into(),
                    value: Word(vec![])
                },
            ]
        );
        assert_eq!(cmd.words, vec![plain("cmd"), plain("C=3")]);
    }

    #[test]
    fn quoted_name_is_not_an_assignment() {
        let program = parse("'A'=1").unwrap();
        let Command::Simple(cmd) = &program.body[0].first.command else {
            panic!("expected a simple command");
        };
        assert!(cmd.assignments.is_empty());
        assert_eq!(cmd.words.len(), 1);
    }

    #[test]
    fn if_elif_else() {
        let program = parse("if a; then b; elif c\nthen d\nelse e; fi").unwrap();
        assert_eq!(
            program.body,
            vec![single(Command::If {
                branches: vec![
                    (vec![single(simple(&["a"]))], vec![single(simple(&["b"]))]),
                    (vec![single(simple(&["c"]))], vec![single(simple(&["d"]))]),
                ],
                otherwise: Some(vec![single(simple(&["e"]))]),
            })]
        );
    }

    #[test]
    fn loops() {
        let program = parse("while a; do b; done; until c\ndo\nd\ndone").unwrap();
        assert_eq!(
            program.body,
            vec![
                single(Command::Loop {
                    kind: LoopKind::While,
                    condition: vec![single(simple(&["a"]))],
                    body: vec![single(simple(&["b"]))],
                }),
                single(Command::Loop {
                    kind: LoopKind::Until,
                    condition: vec![single(simple(&["c"]))],
                    body: vec![single(simple(&["d"]))],
                }),
            ]
        );
    }

    #[test]
    fn for_with_and_without_items() {
        let program = parse("for x in a b; do echo $x; done\nfor y do echo; done").unwrap();
        let Command::For {
            variable, items, ..
        } = &program.body[0].first.command
        else {
            panic!("expected for");
        };
        assert_eq!(variable, "x");
        assert_eq!(items.as_deref(), Some(&[plain("a"), plain("b")][..]));

        let Command::For { items, .. } = &program.body[1].first.command else {
            panic!("expected for");
        };
        assert!(items.is_none());
    }

    #[test]
    fn reserved_words_are_plain_arguments() {
        let program = parse("echo if then fi").unwrap();
        assert_eq!(program.body, vec![single(simple(&["echo", "if", "then", "fi"]))]);
    }

    #[test]
    fn unfinished_programs_are_incomplete() {
        for source in [
            "if true; then",
            "if true; then echo a",
            "if true\n",
            "while true; do echo",
            "for x in a b",
            "for x in a b; do",
            "true &&",
            "false ||\n",
            "echo 'open",
            "echo \\",
            "if true; then if false; then echo; fi",
        ] {
            let err = parse(source).unwrap_err();
            assert!(err.is_incomplete(), "{source:?} gave {err:?}");
        }
    }

    #[test]
    fn malformed_programs_are_invalid() {
        assert_eq!(
            invalid_message("fi"),
            "syntax error near unexpected token `fi'"
        );
        assert_eq!(
            invalid_message("if then fi"),
            "syntax error near unexpected token `then'"
        );
        assert_eq!(
            invalid_message("echo a && && b"),
            "syntax error near unexpected token `&&'"
        );
        assert_eq!(
            invalid_message("if true; then echo; fi echo"),
            "syntax error near unexpected token `echo'"
        );
        assert_eq!(invalid_message("ls | wc"), "pipelines are not supported");
        assert_eq!(invalid_message("echo > out"), "redirections are not supported");
        assert_eq!(invalid_message("sleep 1 &"), "background jobs are not supported");
        assert_eq!(
            invalid_message("echo $(pwd)"),
            "command substitution is not supported"
        );
        assert_eq!(invalid_message("for 1x in a; do echo; done"), "`for' needs a variable name");
    }

    #[test]
    fn invalid_errors_carry_the_line() {
        let err = parse("echo ok\n\necho a ; ; b").unwrap_err();
        assert_eq!(
            err,
            ParseError::Invalid {
                line: 3,
                message: "syntax error near unexpected token `;'".to_string()
            }
        );
    }
}
