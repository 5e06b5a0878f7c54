//! Tokenizer for the shell's script language.

use crate::error::{EvalError, EvalResult};

/// Multi-character punctuators, longest first so that `===` wins over `==`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "=>", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}", ",",
    ".", ";", ":", "?", "=", "+", "-", "*", "/", "%", "<", ">", "!",
];

/// Words that can never be used as variable names.
pub const KEYWORDS: &[&str] = &[
    "var",
    "let",
    "const",
    "function",
    "return",
    "if",
    "else",
    "await",
    "true",
    "false",
    "null",
    "undefined",
    "class",
    "new",
];

/// Kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal.
    Number(f64),
    /// String literal with escapes already resolved.
    Str(String),
    /// Identifier or keyword.
    Ident(String),
    /// Operator or punctuation.
    Punct(&'static str),
    /// End of input.
    Eof,
}

/// A token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// True if this token is the given punctuator.
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }

    /// True if this token is the given identifier or keyword.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(w) if w == word)
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Ident(w) => format!("'{}'", w),
            TokenKind::Punct(p) => format!("'{}'", p),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// True for characters that may start an identifier.
pub fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

/// True for characters that may continue an identifier.
pub fn is_ident_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

/// Split source text into tokens. The last token is always [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> EvalResult<Vec<Token>> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_trivia(&mut self) -> EvalResult<()> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.input[self.pos..].find("*/") {
                        Some(close) => self.pos += close + 2,
                        None => return Err(EvalError::syntax("unterminated comment", start)),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> EvalResult<Token> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                start,
                end: start,
            });
        };

        let kind = if c.is_ascii_digit()
            || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit()))
        {
            self.number()?
        } else if c == '"' || c == '\'' {
            self.string(c)?
        } else if is_ident_start(c) {
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            TokenKind::Ident(self.input[start..self.pos].to_string())
        } else {
            let rest = &self.input[self.pos..];
            match PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
                Some(p) => {
                    self.pos += p.len();
                    TokenKind::Punct(p)
                }
                None => {
                    return Err(EvalError::syntax(
                        format!("unexpected character '{}'", c),
                        start,
                    ))
                }
            }
        };

        Ok(Token {
            kind,
            start,
            end: self.pos,
        })
    }

    fn number(&mut self) -> EvalResult<TokenKind> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        } else if self.peek() == Some('.') && start == self.pos {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            } else {
                self.pos = save;
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| EvalError::syntax(format!("invalid number '{}'", text), start))
    }

    fn string(&mut self, quote: char) -> EvalResult<TokenKind> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(EvalError::syntax("unterminated string literal", start))
                }
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some('\n') => {}
                    Some(other) => value.push(other),
                    None => return Err(EvalError::syntax("unterminated string literal", start)),
                },
                Some(c) => value.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_call_expression_tokens() {
        assert_eq!(
            kinds("db.test.find()"),
            vec![
                TokenKind::Ident("db".into()),
                TokenKind::Punct("."),
                TokenKind::Ident("test".into()),
                TokenKind::Punct("."),
                TokenKind::Ident("find".into()),
                TokenKind::Punct("("),
                TokenKind::Punct(")"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("  x = 'ab'").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (2, 3));
        assert_eq!((tokens[2].start, tokens[2].end), (6, 10));
    }

    #[test]
    fn test_longest_punctuator_wins() {
        assert_eq!(
            kinds("a === b => c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("==="),
                TokenKind::Ident("b".into()),
                TokenKind::Punct("=>"),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb""#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("a\nb".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("a // trailing\n/* block */ b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dollar_identifiers() {
        assert_eq!(
            kinds("$set"),
            vec![TokenKind::Ident("$set".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert!(matches!(err, EvalError::Syntax { offset: 0, .. }));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("a # b").is_err());
    }
}
