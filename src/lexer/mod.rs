use logos::Logos;

/// Tokens for CAM path text
/// One command per line: `G1 X10.000 Y-2.5 F8.333`, `(BEGIN DRILLING)`

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r]+")] // Skip whitespace
#[logos(error = LexerError)]
pub enum Token {
    // Address letter plus raw value text, e.g. `G01`, `X-1.5`
    #[regex(r"[A-Za-z][^\sA-Za-z();%]*", word)]
    Word(Word),

    // Parenthesised comments are kept: they mark drilling blocks
    #[regex(r"\([^)\n]*\)", |lex| lex.slice().to_string())]
    Comment(String),

    #[token("\n")]
    Newline,

    // Line comments and program delimiters
    #[regex(r";[^\n]*", logos::skip)]
    #[regex(r"%[^\n]*", logos::skip)]
    Skipped,
}

/// One address word, letter upper-cased
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub letter: char,
    pub text: String,
}

impl Word {
    /// Numeric value of the word, absent when the text is not a finite number
    pub fn value(&self) -> Option<f64> {
        self.text.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

fn word(lex: &mut logos::Lexer<Token>) -> Option<Word> {
    let mut chars = lex.slice().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    Some(Word {
        letter,
        text: chars.as_str().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LexerError;

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lexer error")
    }
}

impl std::error::Error for LexerError {}

/// Lex the input string into tokens, collecting the spans that failed to lex
pub fn lex(input: &str) -> (Vec<(Token, logos::Span)>, Vec<logos::Span>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for (result, span) in Token::lexer(input).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => errors.push(span),
        }
    }
    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(letter: char, text: &str) -> Token {
        Token::Word(Word {
            letter,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_basic_words() {
        let (tokens, errors) = lex("G1 X10 y-2.5 F8.3");
        let tokens: Vec<_> = tokens.into_iter().map(|(t, _)| t).collect();

        assert!(errors.is_empty());
        assert_eq!(
            tokens,
            vec![w('G', "1"), w('X', "10"), w('Y', "-2.5"), w('F', "8.3")]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        let (tokens, _) = lex("(BEGIN DRILLING)\nG80 ; cancel\n%\n");
        let tokens: Vec<_> = tokens.into_iter().map(|(t, _)| t).collect();

        assert_eq!(
            tokens,
            vec![
                Token::Comment("(BEGIN DRILLING)".to_string()),
                Token::Newline,
                w('G', "80"),
                Token::Newline,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_malformed_value_has_no_number() {
        let (tokens, _) = lex("X1.2.3");
        match &tokens[0].0 {
            Token::Word(word) => assert_eq!(word.value(), None),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_unlexable_input_is_reported() {
        let (tokens, errors) = lex("G0 X1 # Y2");
        assert_eq!(errors, vec![6..7]);
        assert_eq!(tokens.len(), 3);
    }
}
