//! Lexer: tokenizes workflow DSL source
//!
//! Keywords are upper case. Node ids, node types and logic operators
//! are plain identifiers; models, names and guard expressions are
//! double-quoted strings.

use crate::errors::{DslError, DslResult};

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text; string literals are unquoted and unescaped
    pub text: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            col,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Workflow,
    Id,
    Model,
    Description,
    MaxCounter,
    Sequence,
    Condition,
    Inactive,
    Node,
    Type,
    Name,
    Join,
    Split,
    Action,
    Transitions,
    When,
    As,

    // Identifiers and literals
    Identifier,
    StringLiteral,
    NumberLiteral,

    // Structural
    OpenBrace,
    CloseBrace,
    Arrow,

    Eof,
}

impl TokenKind {
    fn keyword(text: &str) -> Option<Self> {
        let kind = match text {
            "WORKFLOW" => Self::Workflow,
            "ID" => Self::Id,
            "MODEL" => Self::Model,
            "DESCRIPTION" => Self::Description,
            "MAX_COUNTER" => Self::MaxCounter,
            "SEQUENCE" => Self::Sequence,
            "CONDITION" => Self::Condition,
            "INACTIVE" => Self::Inactive,
            "NODE" => Self::Node,
            "TYPE" => Self::Type,
            "NAME" => Self::Name,
            "JOIN" => Self::Join,
            "SPLIT" => Self::Split,
            "ACTION" => Self::Action,
            "TRANSITIONS" => Self::Transitions,
            "WHEN" => Self::When,
            "AS" => Self::As,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Workflow => write!(f, "WORKFLOW"),
            Self::Id => write!(f, "ID"),
            Self::Model => write!(f, "MODEL"),
            Self::Description => write!(f, "DESCRIPTION"),
            Self::MaxCounter => write!(f, "MAX_COUNTER"),
            Self::Sequence => write!(f, "SEQUENCE"),
            Self::Condition => write!(f, "CONDITION"),
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Node => write!(f, "NODE"),
            Self::Type => write!(f, "TYPE"),
            Self::Name => write!(f, "NAME"),
            Self::Join => write!(f, "JOIN"),
            Self::Split => write!(f, "SPLIT"),
            Self::Action => write!(f, "ACTION"),
            Self::Transitions => write!(f, "TRANSITIONS"),
            Self::When => write!(f, "WHEN"),
            Self::As => write!(f, "AS"),
            Self::Identifier => write!(f, "identifier"),
            Self::StringLiteral => write!(f, "string literal"),
            Self::NumberLiteral => write!(f, "number"),
            Self::OpenBrace => write!(f, "{{"),
            Self::CloseBrace => write!(f, "}}"),
            Self::Arrow => write!(f, "->"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer for the workflow DSL
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input. The last token is always [`TokenKind::Eof`].
    pub fn tokenize(&mut self) -> DslResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
                break;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> DslResult<Token> {
        let ch = self.input[self.pos];
        let line = self.line;
        let col = self.col;

        match ch {
            '{' => {
                self.advance();
                Ok(Token::new(TokenKind::OpenBrace, "{", line, col))
            }
            '}' => {
                self.advance();
                Ok(Token::new(TokenKind::CloseBrace, "}", line, col))
            }
            '-' if self.peek_at(1) == Some('>') => {
                self.advance();
                self.advance();
                Ok(Token::new(TokenKind::Arrow, "->", line, col))
            }
            '-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '"' => self.read_string_literal(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier_or_keyword()),
            _ => Err(DslError::ParseError {
                line,
                col,
                message: format!("Unexpected character: '{}'", ch),
            }),
        }
    }

    fn read_string_literal(&mut self) -> DslResult<Token> {
        let line = self.line;
        let col = self.col;
        self.advance(); // opening quote

        let mut text = String::new();
        while self.pos < self.input.len() && self.input[self.pos] != '"' {
            match (self.input[self.pos], self.peek_at(1)) {
                ('\\', Some(escaped @ ('"' | '\\'))) => {
                    self.advance();
                    text.push(escaped);
                }
                ('\\', Some('n')) => {
                    self.advance();
                    text.push('\n');
                }
                (c, _) => text.push(c),
            }
            self.advance();
        }

        if self.pos >= self.input.len() {
            return Err(DslError::ParseError {
                line,
                col,
                message: "Unterminated string literal".into(),
            });
        }

        self.advance(); // closing quote
        Ok(Token::new(TokenKind::StringLiteral, text, line, col))
    }

    fn read_number(&mut self) -> DslResult<Token> {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        if self.input[self.pos] == '-' {
            text.push('-');
            self.advance();
        }
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
            text.push(self.input[self.pos]);
            self.advance();
        }

        if self
            .input
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_')
        {
            return Err(DslError::ParseError {
                line,
                col,
                message: format!("Identifiers cannot start with a digit: '{}...'", text),
            });
        }

        Ok(Token::new(TokenKind::NumberLiteral, text, line, col))
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_alphanumeric() || self.input[self.pos] == '_')
        {
            text.push(self.input[self.pos]);
            self.advance();
        }

        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, line, col)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' || (ch == '/' && self.peek_at(1) == Some('/')) {
                while self.pos < self.input.len() && self.input[self.pos] != '\n' {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            if self.input[self.pos] == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        let tokens = Lexer::new("WORKFLOW \"test\" { }").tokenize().unwrap();

        assert_eq!(tokens[0].kind, TokenKind::Workflow);
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].text, "test");
        assert_eq!(tokens[2].kind, TokenKind::OpenBrace);
        assert_eq!(tokens[3].kind, TokenKind::CloseBrace);
        assert_eq!(tokens[4].kind, TokenKind::Eof);
    }

    #[test]
    fn test_arrow_without_spaces() {
        let tokens = Lexer::new("start->end").tokenize().unwrap();

        assert_eq!(tokens[0].text, "start");
        assert_eq!(tokens[1].kind, TokenKind::Arrow);
        assert_eq!(tokens[2].text, "end");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("ID MODEL MAX_COUNTER SEQUENCE CONDITION INACTIVE JOIN SPLIT ACTION TRANSITIONS WHEN AS NAME"),
            vec![
                TokenKind::Id,
                TokenKind::Model,
                TokenKind::MaxCounter,
                TokenKind::Sequence,
                TokenKind::Condition,
                TokenKind::Inactive,
                TokenKind::Join,
                TokenKind::Split,
                TokenKind::Action,
                TokenKind::Transitions,
                TokenKind::When,
                TokenKind::As,
                TokenKind::Name,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        let tokens = Lexer::new("and or start").tokenize().unwrap();
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Identifier));
    }

    #[test]
    fn test_negative_number() {
        let tokens = Lexer::new("SEQUENCE -5").tokenize().unwrap();
        assert_eq!(tokens[1].kind, TokenKind::NumberLiteral);
        assert_eq!(tokens[1].text, "-5");
    }

    #[test]
    fn test_string_escapes() {
        let tokens = Lexer::new(r#""state == \"done\"""#).tokenize().unwrap();
        assert_eq!(tokens[0].text, "state == \"done\"");
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new("WORKFLOW # comment\n// another\n\"test\"")
            .tokenize()
            .unwrap();

        assert_eq!(tokens[0].kind, TokenKind::Workflow);
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("\"unterminated").tokenize().is_err());
    }

    #[test]
    fn test_unexpected_character() {
        match Lexer::new("NODE a\n  @").tokenize() {
            Err(DslError::ParseError { line, col, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(col, 3);
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_digit_led_identifier_rejected() {
        assert!(Lexer::new("NODE 2nd TYPE task").tokenize().is_err());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }
}
