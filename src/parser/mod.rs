//! Line parser for CAM path text
//! Converts lexer tokens into an ordered list of path commands

use crate::ast::*;
use crate::lexer::{self, Token, Word};
use logos::Span;
use thiserror::Error;

/// Problems found while reading path text. None of them stop parsing:
/// the offending word or token is dropped and the rest of the path survives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unrecognised input {text:?}")]
    InvalidToken { text: String, span: Span },

    #[error("malformed value {text:?} for address {letter}")]
    MalformedValue {
        letter: char,
        text: String,
        span: Span,
    },

    #[error("parameters without a preceding motion command")]
    OrphanParameters { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::InvalidToken { span, .. }
            | ParseError::MalformedValue { span, .. }
            | ParseError::OrphanParameters { span } => span.clone(),
        }
    }
}

/// Result of parsing one operation's path text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPath {
    pub commands: Vec<PathCommand>,
    pub errors: Vec<ParseError>,
}

pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token, Span)>,
    position: usize,
    last_motion: Option<CommandKind>,
    output: ParsedPath,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let (tokens, invalid) = lexer::lex(source);
        let errors = invalid
            .into_iter()
            .map(|span| ParseError::InvalidToken {
                text: source[span.clone()].to_string(),
                span,
            })
            .collect();
        Self {
            source,
            tokens,
            position: 0,
            last_motion: None,
            output: ParsedPath {
                commands: Vec::new(),
                errors,
            },
        }
    }

    /// Parse the full path
    pub fn parse(mut self) -> ParsedPath {
        while self.position < self.tokens.len() {
            self.parse_line();
        }
        // Lexer errors come first; keep the report in source order
        self.output.errors.sort_by_key(|e| e.span().start);
        self.output
    }

    fn parse_line(&mut self) {
        let mut words: Vec<(Word, Span)> = Vec::new();

        while let Some((token, span)) = self.tokens.get(self.position).cloned() {
            self.position += 1;
            match token {
                Token::Newline => break,
                Token::Comment(text) => {
                    self.push(CommandKind::Other(text.to_uppercase()), Params::default())
                }
                Token::Word(word) => words.push((word, span)),
                Token::Skipped => {}
            }
        }

        if words.is_empty() {
            return;
        }

        let mut codes = Vec::new();
        let mut params = Params::default();
        let mut param_span: Option<Span> = None;

        for (word, span) in words {
            if word.letter == 'G' || word.letter == 'M' {
                match code_name(&word) {
                    Some(name) => codes.push(name),
                    None => self.malformed(&word, span),
                }
                continue;
            }

            let value = word.value();
            if value.is_none() {
                self.malformed(&word, span.clone());
            }
            params.set(word.letter, value);
            param_span = Some(match param_span {
                Some(s) => s.start..span.end,
                None => span,
            });
        }

        let Some(last) = codes.pop() else {
            match (self.last_motion.clone(), param_span) {
                // `N10`, `S1000` and the like carry nothing a motion can use
                (Some(_), _) if params.is_empty() => {}
                (Some(kind), _) => self.push(kind, params),
                (None, Some(span)) if !params.is_empty() => {
                    self.output.errors.push(ParseError::OrphanParameters { span })
                }
                _ => {}
            }
            return;
        };

        for name in codes {
            self.push(CommandKind::from_name(&name), Params::default());
        }
        self.push(CommandKind::from_name(&last), params);
    }

    fn push(&mut self, kind: CommandKind, params: Params) {
        if kind.is_motion() {
            self.last_motion = Some(kind.clone());
        } else if kind == CommandKind::CycleCancel {
            self.last_motion = None;
        }
        self.output.commands.push(PathCommand::new(kind, params));
    }

    fn malformed(&mut self, word: &Word, span: Span) {
        self.output.errors.push(ParseError::MalformedValue {
            letter: word.letter,
            text: self.source[span.clone()].to_string(),
            span,
        });
    }
}

/// `G00` -> `G0`, `M03` -> `M3`
fn code_name(word: &Word) -> Option<String> {
    if let Ok(n) = word.text.parse::<u32>() {
        return Some(format!("{}{}", word.letter, n));
    }
    // Sub-codes such as G38.2 keep their text
    word.value().map(|_| format!("{}{}", word.letter, word.text))
}

/// Parse path text into commands
pub fn parse_path(source: &str) -> ParsedPath {
    Parser::new(source).parse()
}
