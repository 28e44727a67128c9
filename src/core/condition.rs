//! Platform facts and the boolean condition language used by targets.
//!
//! A target's `conditions` entries carry an expression such as
//! `os == 'linux' and arch in ['x86_64', 'aarch64']`. The expression is
//! evaluated against [`PlatformFacts`]; identifiers are fact names and are
//! case-insensitive, as are string comparisons.

use std::collections::BTreeMap;

use logos::Logos;
use thiserror::Error;

use super::context::{Context, ContextError};

/// Errors raised while evaluating a condition.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConditionError {
    #[error("unexpected character at offset {offset} in condition `{expr}`")]
    Lex { expr: String, offset: usize },

    #[error("unexpected {found} in condition `{expr}`, expected {expected}")]
    Syntax {
        expr: String,
        found: String,
        expected: &'static str,
    },

    #[error("unknown fact `{name}` in condition `{expr}`")]
    UnknownFact { name: String, expr: String },

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Facts about the platform targets are generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformFacts {
    facts: BTreeMap<String, String>,
}

impl PlatformFacts {
    /// Facts describing the generation host.
    pub fn host() -> Self {
        let system = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let os = match std::env::consts::OS {
            "macos" => "apple",
            other => other,
        };
        let abi = if cfg!(target_env = "gnu") {
            "gnu"
        } else if cfg!(target_env = "musl") {
            "musl"
        } else if cfg!(target_env = "msvc") {
            "msvc"
        } else {
            "unknown"
        };

        let mut facts = BTreeMap::new();
        facts.insert("system".to_string(), system.to_string());
        facts.insert("os".to_string(), os.to_string());
        facts.insert("arch".to_string(), std::env::consts::ARCH.to_string());
        facts.insert("abi".to_string(), abi.to_string());
        facts.insert("family".to_string(), std::env::consts::FAMILY.to_string());
        PlatformFacts { facts }
    }

    /// Host facts overridden by the cross-compilation keys of a context
    /// (`__system`, `__os`, `__arch`, `__abi`, `__version`).
    pub fn from_context(ctx: &Context) -> Result<Self, ContextError> {
        let mut facts = Self::host();
        for name in ["system", "os", "arch", "abi", "version"] {
            if let Some(value) = ctx.get_str(&format!("__{}", name))? {
                facts.set(name, &value);
            }
        }
        Ok(facts)
    }

    /// Set a fact. Names and values are stored lower-case.
    pub fn set(&mut self, name: &str, value: &str) {
        self.facts
            .insert(name.to_lowercase(), value.to_lowercase());
    }

    /// Look up a fact by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.facts.get(&name.to_lowercase()).map(String::as_str)
    }

    /// The target OS fact.
    pub fn os(&self) -> &str {
        self.get("os").unwrap_or("unknown")
    }

    /// Whether the target OS is Windows.
    pub fn is_windows(&self) -> bool {
        self.os() == "windows"
    }

    /// Evaluate a condition expression against these facts.
    pub fn eval(&self, expr: &str) -> Result<bool, ConditionError> {
        let tokens = lex(expr)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            expr,
            facts: self,
        };
        let value = parser.or_expr()?;
        if let Some(tok) = parser.peek() {
            return Err(parser.syntax(tok, "end of expression"));
        }
        Ok(value.truthy())
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("&&")]
    #[token("and", ignore(case))]
    And,
    #[token("||")]
    #[token("or", ignore(case))]
    Or,
    #[token("!")]
    #[token("not", ignore(case))]
    Not,
    #[token("in", ignore(case))]
    In,
    #[token("true", ignore(case))]
    True,
    #[token("false", ignore(case))]
    False,
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unquote(lex.slice()))]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Str(s) => format!("string '{}'", s),
            Token::Ident(s) => format!("identifier `{}`", s),
            other => format!("`{:?}`", other),
        }
    }
}

fn unquote(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn lex(expr: &str) -> Result<Vec<Token>, ConditionError> {
    let mut lexer = Token::lexer(expr);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(tok) => tokens.push(tok),
            Err(()) => {
                return Err(ConditionError::Lex {
                    expr: expr.to_string(),
                    offset: lexer.span().start,
                })
            }
        }
    }
    Ok(tokens)
}

// =============================================================================
// Parser / evaluator
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl Operand {
    fn truthy(&self) -> bool {
        match self {
            Operand::Bool(b) => *b,
            Operand::Text(s) => !s.is_empty(),
            Operand::List(items) => !items.is_empty(),
        }
    }

    fn text(&self) -> String {
        match self {
            Operand::Bool(b) => b.to_string(),
            Operand::Text(s) => s.clone(),
            Operand::List(items) => items.join(","),
        }
    }

    fn equals(&self, other: &Operand) -> bool {
        match (self, other) {
            (Operand::Bool(a), Operand::Bool(b)) => a == b,
            (Operand::List(a), Operand::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
            }
            (a, b) => a.text().eq_ignore_ascii_case(&b.text()),
        }
    }

    fn contains(&self, needle: &Operand) -> bool {
        match self {
            Operand::List(items) => items
                .iter()
                .any(|item| item.eq_ignore_ascii_case(&needle.text())),
            Operand::Text(haystack) => haystack
                .to_lowercase()
                .contains(&needle.text().to_lowercase()),
            Operand::Bool(_) => false,
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    expr: &'a str,
    facts: &'a PlatformFacts,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn syntax(&self, found: &Token, expected: &'static str) -> ConditionError {
        ConditionError::Syntax {
            expr: self.expr.to_string(),
            found: found.describe(),
            expected,
        }
    }

    fn eof(&self, expected: &'static str) -> ConditionError {
        ConditionError::Syntax {
            expr: self.expr.to_string(),
            found: "end of expression".to_string(),
            expected,
        }
    }

    fn or_expr(&mut self) -> Result<Operand, ConditionError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Operand::Bool(lhs.truthy() || rhs.truthy());
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Operand, ConditionError> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.not_expr()?;
            lhs = Operand::Bool(lhs.truthy() && rhs.truthy());
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Operand, ConditionError> {
        if self.eat(&Token::Not) {
            let inner = self.not_expr()?;
            return Ok(Operand::Bool(!inner.truthy()));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Operand, ConditionError> {
        let lhs = self.primary()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.pos += 1;
                let rhs = self.primary()?;
                Ok(Operand::Bool(lhs.equals(&rhs)))
            }
            Some(Token::Ne) => {
                self.pos += 1;
                let rhs = self.primary()?;
                Ok(Operand::Bool(!lhs.equals(&rhs)))
            }
            Some(Token::In) => {
                self.pos += 1;
                let rhs = self.primary()?;
                Ok(Operand::Bool(rhs.contains(&lhs)))
            }
            Some(Token::Not) if self.tokens.get(self.pos + 1) == Some(&Token::In) => {
                self.pos += 2;
                let rhs = self.primary()?;
                Ok(Operand::Bool(!rhs.contains(&lhs)))
            }
            _ => Ok(lhs),
        }
    }

    fn primary(&mut self) -> Result<Operand, ConditionError> {
        let tok = self.bump().ok_or_else(|| self.eof("a value"))?;
        match tok {
            Token::True => Ok(Operand::Bool(true)),
            Token::False => Ok(Operand::Bool(false)),
            Token::Str(s) => Ok(Operand::Text(s.clone())),
            Token::Ident(name) => self
                .facts
                .get(name)
                .map(|v| Operand::Text(v.to_string()))
                .ok_or_else(|| ConditionError::UnknownFact {
                    name: name.clone(),
                    expr: self.expr.to_string(),
                }),
            Token::LParen => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(self.syntax(other, "`)`")),
                    None => Err(self.eof("`)`")),
                }
            }
            Token::LBracket => self.list(),
            other => Err(self.syntax(other, "a value")),
        }
    }

    fn list(&mut self) -> Result<Operand, ConditionError> {
        let mut items = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(Operand::List(items));
        }
        loop {
            items.push(self.primary()?.text());
            match self.bump() {
                Some(Token::Comma) => {
                    if self.eat(&Token::RBracket) {
                        break;
                    }
                }
                Some(Token::RBracket) => break,
                Some(other) => return Err(self.syntax(other, "`,` or `]`")),
                None => return Err(self.eof("`]`")),
            }
        }
        Ok(Operand::List(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_x86() -> PlatformFacts {
        let mut facts = PlatformFacts::host();
        facts.set("system", "linux");
        facts.set("os", "linux");
        facts.set("arch", "x86_64");
        facts.set("abi", "gnu");
        facts
    }

    #[test]
    fn test_equality() {
        let facts = linux_x86();
        assert!(facts.eval("os == 'linux'").unwrap());
        assert!(facts.eval("OS == \"Linux\"").unwrap());
        assert!(!facts.eval("os != 'linux'").unwrap());
    }

    #[test]
    fn test_boolean_operators() {
        let facts = linux_x86();
        assert!(facts.eval("os == 'linux' and arch == 'x86_64'").unwrap());
        assert!(facts.eval("os == 'windows' || arch == 'x86_64'").unwrap());
        assert!(facts.eval("not (os == 'windows')").unwrap());
        assert!(!facts.eval("!true").unwrap());
        assert!(facts.eval("os == 'linux' AND NOT (arch == 'arm') Or False").unwrap());
    }

    #[test]
    fn test_membership() {
        let facts = linux_x86();
        assert!(facts.eval("arch in ['x86_64', 'aarch64']").unwrap());
        assert!(facts.eval("arch not in ['arm', 'mips',]").unwrap());
        assert!(facts.eval("'gn' in abi").unwrap());
    }

    #[test]
    fn test_unknown_fact() {
        let facts = linux_x86();
        let err = facts.eval("kernel == 'x'").unwrap_err();
        assert!(matches!(err, ConditionError::UnknownFact { ref name, .. } if name == "kernel"));
    }

    #[test]
    fn test_syntax_errors() {
        let facts = linux_x86();
        assert!(matches!(facts.eval("os ==").unwrap_err(), ConditionError::Syntax { .. }));
        assert!(matches!(facts.eval("(os == 'linux'").unwrap_err(), ConditionError::Syntax { .. }));
        assert!(matches!(facts.eval("os == 'linux' os").unwrap_err(), ConditionError::Syntax { .. }));
        assert!(matches!(facts.eval("os = 'linux'").unwrap_err(), ConditionError::Lex { .. }));
    }

    #[test]
    fn test_context_overrides_host_facts() {
        let mut ctx = Context::new();
        ctx.set("__os", "Windows");
        ctx.set("__arch", "aarch64");
        let facts = PlatformFacts::from_context(&ctx).unwrap();
        assert_eq!(facts.os(), "windows");
        assert!(facts.is_windows());
        assert!(facts.eval("arch == 'aarch64'").unwrap());
    }
}
