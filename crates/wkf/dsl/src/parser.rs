//! Parser: recursive descent parser for the workflow DSL
//!
//! Consumes tokens from the lexer and produces a [`ParsedWorkflow`],
//! the intermediate representation that the validator checks and the
//! compiler turns into a [`wkf_types::Workflow`].

use crate::errors::{DslError, DslResult};
use crate::lexer::{Lexer, Token, TokenKind};
use serde::{Deserialize, Serialize};

/// Parsed workflow, before any semantic checks
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedWorkflow {
    pub name: String,
    pub id: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
    pub max_counter: Option<i64>,
    pub sequence: Option<i64>,
    pub condition: Option<String>,
    pub inactive: bool,
    pub nodes: Vec<ParsedNode>,
    pub transitions: Vec<ParsedTransition>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedNode {
    pub id: String,
    pub node_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub join: Option<String>,
    pub split: Option<String>,
    pub action: Option<String>,
    /// Line of the NODE keyword
    pub line: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransition {
    pub from: String,
    pub to: String,
    /// Explicit id given with AS
    pub id: Option<String>,
    pub name: Option<String>,
    pub sequence: Option<i64>,
    pub guard: Option<String>,
    pub line: usize,
}

/// Parser for the workflow DSL
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse DSL input text into a ParsedWorkflow
    pub fn parse(input: &str) -> DslResult<ParsedWorkflow> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        let workflow = parser.parse_workflow()?;
        parser.expect(TokenKind::Eof)?;
        Ok(workflow)
    }

    fn parse_workflow(&mut self) -> DslResult<ParsedWorkflow> {
        // WORKFLOW "name" {
        self.expect(TokenKind::Workflow)?;
        let name = self.expect_string()?;
        self.expect(TokenKind::OpenBrace)?;

        let mut workflow = ParsedWorkflow {
            name,
            ..ParsedWorkflow::default()
        };

        while !self.check(TokenKind::CloseBrace) && !self.check(TokenKind::Eof) {
            match self.peek_kind() {
                TokenKind::Id => {
                    self.advance();
                    workflow.id = Some(self.expect_identifier()?);
                }
                TokenKind::Model => {
                    self.advance();
                    workflow.model = Some(self.expect_string()?);
                }
                TokenKind::Description => {
                    self.advance();
                    workflow.description = Some(self.expect_string()?);
                }
                TokenKind::MaxCounter => {
                    self.advance();
                    workflow.max_counter = Some(self.expect_number()?);
                }
                TokenKind::Sequence => {
                    self.advance();
                    workflow.sequence = Some(self.expect_number()?);
                }
                TokenKind::Condition => {
                    self.advance();
                    workflow.condition = Some(self.expect_string()?);
                }
                TokenKind::Inactive => {
                    self.advance();
                    workflow.inactive = true;
                }
                TokenKind::Node => {
                    let node = self.parse_node()?;
                    workflow.nodes.push(node);
                }
                TokenKind::Transitions => {
                    let block = self.parse_transitions_block()?;
                    workflow.transitions.extend(block);
                }
                _ => {
                    let tok = self.peek();
                    return Err(DslError::UnknownKeyword(tok.text.clone()));
                }
            }
        }

        self.expect(TokenKind::CloseBrace)?;
        Ok(workflow)
    }

    fn parse_node(&mut self) -> DslResult<ParsedNode> {
        // NODE id TYPE kind ["name"] [{ ... }]
        let line = self.expect(TokenKind::Node)?.line;
        let id = self.expect_identifier()?;
        self.expect(TokenKind::Type)?;
        let node_type = self.expect_identifier()?;

        let mut node = ParsedNode {
            id,
            node_type,
            line,
            ..ParsedNode::default()
        };

        if self.check(TokenKind::StringLiteral) {
            node.name = Some(self.expect_string()?);
        }

        if self.check(TokenKind::OpenBrace) {
            self.advance();
            while !self.check(TokenKind::CloseBrace) && !self.check(TokenKind::Eof) {
                match self.peek_kind() {
                    TokenKind::Name => {
                        self.advance();
                        node.name = Some(self.expect_string()?);
                    }
                    TokenKind::Description => {
                        self.advance();
                        node.description = Some(self.expect_string()?);
                    }
                    TokenKind::Join => {
                        self.advance();
                        node.join = Some(self.expect_identifier()?);
                    }
                    TokenKind::Split => {
                        self.advance();
                        node.split = Some(self.expect_identifier()?);
                    }
                    TokenKind::Action => {
                        self.advance();
                        node.action = Some(self.expect_string()?);
                    }
                    _ => {
                        let tok = self.peek();
                        return Err(DslError::ParseError {
                            line: tok.line,
                            col: tok.col,
                            message: format!("Unexpected token in node body: '{}'", tok.text),
                        });
                    }
                }
            }
            self.expect(TokenKind::CloseBrace)?;
        }

        Ok(node)
    }

    fn parse_transitions_block(&mut self) -> DslResult<Vec<ParsedTransition>> {
        self.expect(TokenKind::Transitions)?;
        self.expect(TokenKind::OpenBrace)?;

        let mut transitions = Vec::new();
        while !self.check(TokenKind::CloseBrace) && !self.check(TokenKind::Eof) {
            // from -> to [SEQUENCE n] [WHEN "expr"] [NAME "label"] [AS id]
            let line = self.peek().line;
            let from = self.expect_identifier()?;
            self.expect(TokenKind::Arrow)?;
            let to = self.expect_identifier()?;

            let mut transition = ParsedTransition {
                from,
                to,
                line,
                ..ParsedTransition::default()
            };

            loop {
                match self.peek_kind() {
                    TokenKind::Sequence => {
                        self.advance();
                        transition.sequence = Some(self.expect_number()?);
                    }
                    TokenKind::When => {
                        self.advance();
                        transition.guard = Some(self.expect_string()?);
                    }
                    TokenKind::Name => {
                        self.advance();
                        transition.name = Some(self.expect_string()?);
                    }
                    TokenKind::As => {
                        self.advance();
                        transition.id = Some(self.expect_identifier()?);
                    }
                    _ => break,
                }
            }

            transitions.push(transition);
        }

        self.expect(TokenKind::CloseBrace)?;
        Ok(transitions)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn expect(&mut self, kind: TokenKind) -> DslResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(DslError::UnexpectedEof(kind.to_string()))
        } else {
            let tok = self.peek();
            Err(DslError::UnexpectedToken {
                expected: kind.to_string(),
                found: tok.text.clone(),
                line: tok.line,
            })
        }
    }

    fn expect_identifier(&mut self) -> DslResult<String> {
        Ok(self.expect(TokenKind::Identifier)?.text.clone())
    }

    fn expect_string(&mut self) -> DslResult<String> {
        Ok(self.expect(TokenKind::StringLiteral)?.text.clone())
    }

    fn expect_number(&mut self) -> DslResult<i64> {
        let tok = self.expect(TokenKind::NumberLiteral)?;
        tok.text.parse::<i64>().map_err(|_| DslError::InvalidValue {
            field: "number".into(),
            message: format!("'{}' is not a valid number", tok.text),
        })
    }
}
