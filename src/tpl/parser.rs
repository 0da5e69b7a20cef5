use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::Result;
use crate::error::{Error, Position};
use crate::tpl::ast::{Expr, FilterCall, Node, NodeList, Op, UnaryOp};
use crate::tpl::lexer::{Token, TokenKind};
use crate::tpl::options::Options;
use crate::tpl::set::TemplateSet;
use crate::tpl::tags::macros::Macro;
use crate::tpl::template::Template;
use crate::tpl::whitespace::{StripState, strip_whitespace};
use crate::value::Value;

/// Maximum nesting of block-structured tags.
pub const MAX_NESTING: usize = 256;

/// Maximum nesting of parentheses, `not` and unary signs within one
/// expression.
pub const MAX_EXPR_NESTING: usize = 64;

/// What a compile run needs besides the tokens: the owning set (tags and
/// template lookup), the effective options and the chain of templates being
/// compiled, used to reject `extends`/`include`/`import` cycles.
pub(crate) struct CompileEnv<'a> {
    pub(crate) set: &'a TemplateSet,
    pub(crate) options: Options,
    pub(crate) ancestry: Vec<String>,
}

impl CompileEnv<'_> {
    /// Compiles (or fetches) another template referenced at `pos`.
    pub(crate) fn resolve(&self, name: &str, pos: &Position) -> Result<Arc<Template>> {
        if self.ancestry.iter().any(|n| n == name) {
            return Err(Error::syntax(
                pos,
                format!(
                    "Template '{}' is referenced recursively ({} -> {})",
                    name,
                    self.ancestry.join(" -> "),
                    name
                ),
            ));
        }
        self.set.resolve_nested(name, &self.ancestry)
    }
}

/// Per-document results collected while parsing: block bodies, macros and the
/// inheritance parent.
#[derive(Default)]
pub(crate) struct DocState {
    pub(crate) blocks: HashMap<String, Arc<NodeList>>,
    pub(crate) macros: HashMap<String, Arc<Macro>>,
    pub(crate) parent: Option<Arc<Template>>,
    strip: StripState,
    depth: usize,
}

/// The end tag that closed a [`Parser::wrap_until_tag`] body.
pub struct EndTag<'a> {
    pub name: String,
    pub args: Parser<'a>,
}

/// Cursor over a token stream.
///
/// The document parser and the argument sub-parsers handed to tag parsers are
/// both `Parser`s; only the document parser collects [`DocState`].
pub struct Parser<'a> {
    name: Arc<str>,
    tokens: Vec<Token>,
    idx: usize,
    /// Position reported for errors past the last token.
    end: Position,
    env: &'a CompileEnv<'a>,
    /// Nesting of `not`, unary signs and parentheses in the expression being
    /// parsed.
    expr_depth: usize,
    pub(crate) doc: DocState,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(name: Arc<str>, tokens: Vec<Token>, env: &'a CompileEnv<'a>) -> Self {
        let end = tokens
            .last()
            .map(|t| t.pos.clone())
            .unwrap_or_else(|| Position::new(name.clone(), 1, 1));
        Self {
            name,
            tokens,
            idx: 0,
            end,
            env,
            expr_depth: 0,
            doc: DocState::default(),
        }
    }

    fn sub_parser(&self, tokens: Vec<Token>, end: Position) -> Parser<'a> {
        Parser {
            name: self.name.clone(),
            tokens,
            idx: 0,
            end,
            env: self.env,
            expr_depth: 0,
            doc: DocState::default(),
        }
    }

    pub fn template_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn env(&self) -> &'a CompileEnv<'a> {
        self.env
    }

    /* ------------------------------ cursor ------------------------------- */

    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.idx
    }

    pub fn current(&self) -> Option<&Token> {
        self.tokens.get(self.idx)
    }

    pub fn consume(&mut self) {
        self.idx += 1;
    }

    pub fn peek(&self, kind: TokenKind, val: &str) -> bool {
        self.current().is_some_and(|t| t.is(kind, val))
    }

    pub fn peek_kind(&self, kind: TokenKind) -> Option<&Token> {
        self.current().filter(|t| t.kind == kind)
    }

    /// Consumes and returns the current token if it is `kind` with value `val`.
    pub fn match_one(&mut self, kind: TokenKind, val: &str) -> Option<Token> {
        if self.peek(kind, val) {
            let t = self.tokens[self.idx].clone();
            self.idx += 1;
            return Some(t);
        }
        None
    }

    pub fn match_kind(&mut self, kind: TokenKind) -> Option<Token> {
        let t = self.peek_kind(kind)?.clone();
        self.idx += 1;
        Some(t)
    }

    pub fn expect(&mut self, kind: TokenKind, val: &str, msg: &str) -> Result<Token> {
        self.match_one(kind, val).ok_or_else(|| self.error(msg))
    }

    pub fn expect_kind(&mut self, kind: TokenKind, msg: &str) -> Result<Token> {
        self.match_kind(kind).ok_or_else(|| self.error(msg))
    }

    /// Position of the current token, or of the end of the stream.
    pub fn position(&self) -> Position {
        self.current()
            .map(|t| t.pos.clone())
            .unwrap_or_else(|| self.end.clone())
    }

    /// Syntax error at the current token.
    pub fn error(&self, msg: impl Into<String>) -> Error {
        Error::syntax(&self.position(), msg)
    }

    /* ----------------------------- document ------------------------------ */

    /// Parses the whole stream into a node list in source order.
    pub fn parse_document(&mut self) -> Result<NodeList> {
        let mut nodes = Vec::new();
        while self.remaining() > 0 {
            nodes.push(self.parse_doc_element()?);
        }
        debug!("parsed '{}' into {} top-level nodes", self.name, nodes.len());
        Ok(nodes)
    }

    fn parse_doc_element(&mut self) -> Result<Node> {
        let Some(token) = self.current() else {
            return Err(self.error("Unexpected EOF"));
        };
        let (kind, marker) = (token.kind, token.val.clone());
        match kind {
            TokenKind::Html => {
                let mut text = marker;
                if self.env.options.trim_whitespace {
                    text = strip_whitespace(&text, &mut self.doc.strip);
                }
                let trim_left = self.idx > 0 && self.tokens[self.idx - 1].trim;
                let trim_right = self.tokens.get(self.idx + 1).is_some_and(|t| t.trim);
                if trim_left {
                    text = text.trim_start().to_string();
                }
                if trim_right {
                    text.truncate(text.trim_end().len());
                }
                self.consume();
                Ok(Node::Html(text))
            }
            TokenKind::Symbol if marker == "{{" => self.parse_variable_element(),
            TokenKind::Symbol if marker == "{%" => self.parse_tag_element(),
            _ => Err(self.error("Unexpected token (only HTML/tags/filters in templates allowed)")),
        }
    }

    fn parse_variable_element(&mut self) -> Result<Node> {
        let open = self.expect(TokenKind::Symbol, "{{", "'{{' expected")?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::Symbol, "}}", "'}}' expected")?;
        Ok(Node::Output {
            expr,
            pos: open.pos,
        })
    }

    /// Takes the tokens up to the next `%}` (consumed) as tag arguments.
    fn take_tag_args(&mut self) -> Result<(Vec<Token>, Position)> {
        let start = self.idx;
        loop {
            match self.current() {
                Some(t) if t.is(TokenKind::Symbol, "%}") => {
                    let end = t.pos.clone();
                    let args = self.tokens[start..self.idx].to_vec();
                    self.consume();
                    return Ok((args, end));
                }
                Some(t) if t.kind == TokenKind::Html => {
                    return Err(Error::syntax(&t.pos, "'%}' expected"));
                }
                Some(_) => self.consume(),
                None => return Err(self.error("Unexpected EOF, '%}' expected")),
            }
        }
    }

    fn parse_tag_element(&mut self) -> Result<Node> {
        self.expect(TokenKind::Symbol, "{%", "'{%' expected")?;
        let name = self.expect_kind(TokenKind::Identifier, "Tag name must be an identifier")?;
        let (tokens, end) = self.take_tag_args()?;

        let Some(tag) = self.env.set.tags().get(&name.val) else {
            return Err(Error::syntax(
                &name.pos,
                format!("Tag '{}' not found (or beginning tag not provided)", name.val),
            ));
        };

        if self.doc.depth >= MAX_NESTING {
            return Err(Error::syntax(
                &name.pos,
                format!("Tags nested deeper than {} levels", MAX_NESTING),
            ));
        }
        let mut args = self.sub_parser(tokens, end);
        self.doc.depth += 1;
        let node = tag(self, &name, &mut args);
        self.doc.depth -= 1;
        let node = node?;

        if args.remaining() > 0 {
            return Err(args.error(format!("Malformed '{}'-tag arguments", name.val)));
        }
        Ok(Node::Tag(node))
    }

    /// Depth of the tag currently being parsed; 1 for a top-level tag.
    pub fn depth(&self) -> usize {
        self.doc.depth
    }

    /// Parses nodes until one of `names` appears as a tag, consuming that end
    /// tag and returning its argument parser.
    pub fn wrap_until_tag(&mut self, names: &[&str]) -> Result<(NodeList, EndTag<'a>)> {
        let mut nodes = Vec::new();
        loop {
            if self.remaining() == 0 {
                return Err(self.error(format!(
                    "Unexpected EOF, expected tag {}",
                    names.join(" or ")
                )));
            }
            if self.peek(TokenKind::Symbol, "{%")
                && let Some(t) = self.tokens.get(self.idx + 1)
                && t.kind == TokenKind::Identifier
                && names.contains(&t.val.as_str())
            {
                let name = t.val.clone();
                self.idx += 2;
                let (tokens, end) = self.take_tag_args()?;
                let args = self.sub_parser(tokens, end);
                return Ok((nodes, EndTag { name, args }));
            }
            nodes.push(self.parse_doc_element()?);
        }
    }

    /* ---------------------------- expressions ---------------------------- */

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn match_any(&mut self, alternatives: &[(TokenKind, &str)]) -> bool {
        alternatives
            .iter()
            .any(|(kind, val)| self.match_one(*kind, val).is_some())
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.match_any(&[(TokenKind::Keyword, "or"), (TokenKind::Symbol, "||")]) {
            let right = self.parse_and()?;
            left = Expr::Binary(Op::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.match_any(&[(TokenKind::Keyword, "and"), (TokenKind::Symbol, "&&")]) {
            let right = self.parse_not()?;
            left = Expr::Binary(Op::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Runs `f` one expression level deeper, failing once the nesting passes
    /// [`MAX_EXPR_NESTING`]. Evaluation recurses over the same tree, so this also
    /// bounds render depth.
    fn nested_expr(&mut self, f: impl FnOnce(&mut Self) -> Result<Expr>) -> Result<Expr> {
        if self.expr_depth >= MAX_EXPR_NESTING {
            return Err(self.error("Expression nested too deeply"));
        }
        self.expr_depth += 1;
        let res = f(self);
        self.expr_depth -= 1;
        res
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.match_any(&[(TokenKind::Keyword, "not"), (TokenKind::Symbol, "!")]) {
            let inner = self.nested_expr(Self::parse_not)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;
        if self.peek(TokenKind::Keyword, "not")
            && self
                .tokens
                .get(self.idx + 1)
                .is_some_and(|n| n.is(TokenKind::Keyword, "in"))
        {
            self.idx += 2;
            let right = self.parse_additive()?;
            let contained = Expr::Binary(Op::In, Box::new(left), Box::new(right));
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(contained)));
        }
        let op = match self.current().map(|t| (t.kind, t.val.as_str())) {
            Some((TokenKind::Symbol, "==")) => Op::Eq,
            Some((TokenKind::Symbol, "!=")) => Op::Ne,
            Some((TokenKind::Symbol, "<")) => Op::Lt,
            Some((TokenKind::Symbol, "<=")) => Op::Le,
            Some((TokenKind::Symbol, ">")) => Op::Gt,
            Some((TokenKind::Symbol, ">=")) => Op::Ge,
            Some((TokenKind::Keyword, "in")) => Op::In,
            _ => return Ok(left),
        };
        self.consume();
        let right = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.match_one(TokenKind::Symbol, "+").is_some() {
                Op::Add
            } else if self.match_one(TokenKind::Symbol, "-").is_some() {
                Op::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.match_one(TokenKind::Symbol, "*").is_some() {
                Op::Mul
            } else if self.match_one(TokenKind::Symbol, "/").is_some() {
                Op::Div
            } else if self.match_one(TokenKind::Symbol, "%").is_some() {
                Op::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.match_one(TokenKind::Symbol, "-").is_some() {
            let inner = self.nested_expr(Self::parse_unary)?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        if self.match_one(TokenKind::Symbol, "+").is_some() {
            return self.nested_expr(Self::parse_unary);
        }
        self.parse_filtered()
    }

    fn parse_filtered(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        let mut filters = Vec::new();
        while self.match_one(TokenKind::Symbol, "|").is_some() {
            filters.push(self.parse_filter_call()?);
        }
        if filters.is_empty() {
            return Ok(base);
        }
        Ok(Expr::Filtered(Box::new(base), filters))
    }

    /// `name[:argument]` where the argument is a single variable or literal, so
    /// that a following `|` always starts the next filter.
    pub fn parse_filter_call(&mut self) -> Result<FilterCall> {
        let name = self.expect_kind(TokenKind::Identifier, "Filter name must be an identifier")?;
        let param = if self.match_one(TokenKind::Symbol, ":").is_some() {
            Some(self.parse_variable_or_literal()?)
        } else {
            None
        };
        Ok(FilterCall {
            name: name.val,
            param,
            pos: name.pos,
        })
    }

    /// A literal or a variable with member/subscript access, no operators.
    pub fn parse_variable_or_literal(&mut self) -> Result<Expr> {
        if self.peek(TokenKind::Symbol, "-")
            && self
                .tokens
                .get(self.idx + 1)
                .is_some_and(|t| t.kind == TokenKind::Number)
        {
            self.consume();
            let inner = self.parse_postfix()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.match_one(TokenKind::Symbol, ".").is_some() {
                let member = self
                    .current()
                    .filter(|t| {
                        matches!(
                            t.kind,
                            TokenKind::Identifier | TokenKind::Keyword | TokenKind::Number
                        )
                    })
                    .map(|t| t.val.clone())
                    .ok_or_else(|| self.error("Member name expected after '.'"))?;
                self.consume();
                expr = Expr::Member(Box::new(expr), member);
            } else if self.match_one(TokenKind::Symbol, "[").is_some() {
                expr = self.parse_subscript(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_subscript(&mut self, base: Expr) -> Result<Expr> {
        let from = if self.peek(TokenKind::Symbol, ":") {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        if self.match_one(TokenKind::Symbol, ":").is_some() {
            let to = if self.peek(TokenKind::Symbol, "]") {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            };
            self.expect(TokenKind::Symbol, "]", "']' expected")?;
            return Ok(Expr::Slice(Box::new(base), from, to));
        }
        self.expect(TokenKind::Symbol, "]", "']' expected")?;
        match from {
            Some(key) => Ok(Expr::Subscript(Box::new(base), key)),
            None => Err(self.error("Subscript expression expected")),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(t) = self.current().cloned() else {
            return Err(self.error("Unexpected EOF, expression expected"));
        };
        match t.kind {
            TokenKind::Number => {
                self.consume();
                parse_number(&t).map(Expr::Literal)
            }
            TokenKind::String => {
                self.consume();
                Ok(Expr::Literal(Value::from(t.val)))
            }
            TokenKind::Keyword => {
                let literal = match t.val.as_str() {
                    "true" => Value::from(true),
                    "false" => Value::from(false),
                    "nil" => Value::nil(),
                    other => {
                        return Err(self.error(format!("Unexpected keyword '{}'", other)));
                    }
                };
                self.consume();
                Ok(Expr::Literal(literal))
            }
            TokenKind::Symbol if t.val == "(" => {
                self.consume();
                let inner = self.nested_expr(Self::parse_expression)?;
                self.expect(TokenKind::Symbol, ")", "')' expected")?;
                Ok(inner)
            }
            TokenKind::Identifier => {
                self.consume();
                if self.match_one(TokenKind::Symbol, "(").is_some() {
                    let args = self.parse_call_args()?;
                    return Ok(Expr::Call {
                        name: t.val,
                        args,
                        pos: t.pos,
                    });
                }
                Ok(Expr::Var(t.val))
            }
            _ => Err(self.error(format!(
                "Expected a number, string, keyword or identifier, found '{}'",
                t.val
            ))),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.match_one(TokenKind::Symbol, ")").is_some() {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.match_one(TokenKind::Symbol, ")").is_some() {
                return Ok(args);
            }
            self.expect(TokenKind::Symbol, ",", "',' or ')' expected")?;
        }
    }
}

fn parse_number(t: &Token) -> Result<Value> {
    if t.val.contains('.') {
        return t
            .val
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| Error::syntax(&t.pos, format!("Invalid number '{}'", t.val)));
    }
    t.val
        .parse::<i64>()
        .map(Value::from)
        .map_err(|_| Error::syntax(&t.pos, format!("Number '{}' out of range", t.val)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpl::lexer::lex;

    fn with_parser<T>(src: &str, options: Options, f: impl FnOnce(&mut Parser<'_>) -> T) -> T {
        let set = TemplateSet::builder("test").build();
        let env = CompileEnv {
            set: &set,
            options,
            ancestry: vec!["t".to_string()],
        };
        let tokens = lex(Arc::from("t"), src).unwrap();
        let mut parser = Parser::new(Arc::from("t"), tokens, &env);
        f(&mut parser)
    }

    fn parse(src: &str) -> Result<NodeList> {
        with_parser(src, Options::default(), |p| p.parse_document())
    }

    fn expr(src: &str) -> Expr {
        with_parser(&format!("{{{{ {} }}}}", src), Options::default(), |p| {
            match p.parse_document().unwrap().into_iter().next() {
                Some(Node::Output { expr, .. }) => expr,
                other => panic!("Expected Output, got {:?}", other),
            }
        })
    }

    #[test]
    fn test_parse_document_order() {
        let nodes = parse("Hello {{ name }}!{% if x %}y{% endif %}").unwrap();
        assert_eq!(nodes.len(), 4);
        assert!(matches!(&nodes[0], Node::Html(t) if t == "Hello "));
        assert!(matches!(&nodes[1], Node::Output { expr: Expr::Var(v), .. } if v == "name"));
        assert!(matches!(&nodes[2], Node::Html(t) if t == "!"));
        assert!(matches!(&nodes[3], Node::Tag(_)));
    }

    #[test]
    fn test_parse_operator_precedence() {
        match expr("a or b and not c") {
            Expr::Binary(Op::Or, left, right) => {
                assert!(matches!(*left, Expr::Var(ref v) if v == "a"));
                match *right {
                    Expr::Binary(Op::And, _, r) => {
                        assert!(matches!(*r, Expr::Unary(UnaryOp::Not, _)))
                    }
                    other => panic!("Expected And, got {:?}", other),
                }
            }
            other => panic!("Expected Or, got {:?}", other),
        }

        match expr("1 + 2 * 3") {
            Expr::Binary(Op::Add, _, right) => {
                assert!(matches!(*right, Expr::Binary(Op::Mul, _, _)))
            }
            other => panic!("Expected Add, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_in() {
        match expr("x not in items") {
            Expr::Unary(UnaryOp::Not, inner) => {
                assert!(matches!(*inner, Expr::Binary(Op::In, _, _)))
            }
            other => panic!("Expected negated In, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_postfix_and_filters() {
        match expr("user.items[0].name|upper|default:'x'") {
            Expr::Filtered(base, filters) => {
                assert_eq!(filters.len(), 2);
                assert_eq!(filters[0].name, "upper");
                assert!(filters[0].param.is_none());
                assert!(filters[1].param.is_some());
                assert!(matches!(*base, Expr::Member(_, ref m) if m == "name"));
            }
            other => panic!("Expected Filtered, got {:?}", other),
        }
        assert!(matches!(expr("s[1:]"), Expr::Slice(_, Some(_), None)));
        assert!(matches!(expr("s[:2]"), Expr::Slice(_, None, Some(_))));
    }

    #[test]
    fn test_parse_literals_and_calls() {
        assert!(matches!(expr("1.5"), Expr::Literal(v) if v.is_float()));
        assert!(matches!(expr("42"), Expr::Literal(v) if v.to_integer() == 42));
        assert!(matches!(expr("nil"), Expr::Literal(v) if v.is_nil()));
        match expr("greet('a', n + 1)") {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, "greet");
                assert_eq!(args.len(), 2);
            }
            other => panic!("Expected Call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("{{ }}"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("{{ a + }}"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("{% nosuchtag %}"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("{% if x %}never closed"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("{% endif %}"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("{{ 99999999999999999999 }}"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_parse_error_position() {
        match parse("line one\n{{ a + }}") {
            Err(Error::Syntax { line, template, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(template, "t");
            }
            other => panic!("Expected syntax error, got {:?}", other.map(|n| n.len())),
        }
    }

    #[test]
    fn test_trim_markers_strip_neighbouring_text() {
        let nodes = parse("a  {{- x -}}  b").unwrap();
        assert!(matches!(&nodes[0], Node::Html(t) if t == "a"));
        assert!(matches!(&nodes[2], Node::Html(t) if t == "b"));
    }

    #[test]
    fn test_trim_whitespace_carries_state() {
        let options = Options {
            trim_whitespace: true,
            ..Options::default()
        };
        let nodes = with_parser(r#"<div class="{% if x %}  foo  {% endif %}">"#, options, |p| {
            p.parse_document().unwrap()
        });
        assert!(matches!(&nodes[0], Node::Html(t) if t == "<div class=\""));
        assert!(matches!(&nodes[2], Node::Html(t) if t == "\">"));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let depth = MAX_NESTING + 1;
        let src = format!("{}{}", "{% if x %}".repeat(depth), "{% endif %}".repeat(depth));
        match parse(&src) {
            Err(Error::Syntax { message, .. }) => assert!(message.contains("nested")),
            other => panic!("Expected nesting error, got {:?}", other.map(|n| n.len())),
        }
    }

    #[test]
    fn test_expression_nesting_is_bounded() {
        let deep_parens = format!("{{{{ {}1{} }}}}", "(".repeat(5000), ")".repeat(5000));
        let deep_not = format!("{{{{ {}x }}}}", "not ".repeat(5000));
        let deep_neg = format!("{{{{ {}1 }}}}", "- ".repeat(5000));
        for src in [deep_parens, deep_not, deep_neg] {
            match parse(&src) {
                Err(Error::Syntax { message, .. }) => assert!(message.contains("nested too deeply")),
                other => panic!("Expected nesting error, got {:?}", other.map(|n| n.len())),
            }
        }

        let depth = MAX_EXPR_NESTING - 1;
        let ok = format!("{{{{ {}1{} }}}}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse(&ok).is_ok());
    }
}
