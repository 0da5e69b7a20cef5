use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::sync::{Arc, LazyLock};

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::Result;
use crate::error::Error;
use crate::tpl::ast::NodeList;
use crate::tpl::lexer::lex;
use crate::tpl::options::Options;
use crate::tpl::parser::{CompileEnv, DocState, Parser};
use crate::tpl::render::render_nodes;
use crate::tpl::render_context::ExecutionContext;
use crate::tpl::set::SetShared;
use crate::tpl::tags::macros::Macro;
use crate::tpl::whitespace::apply_block_trimming;
use crate::tpl::writer::{BufferPool, IoSink, TemplateWriter};
use crate::value::{Datum, ObjectKind, Value};

/// Variables handed to a render call.
pub type Context = HashMap<String, Value>;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("identifier pattern is valid"));

/// Builds a [`Context`] from any `Serialize` value with named fields (a struct
/// or a string-keyed map).
pub fn to_context<T: Serialize + ?Sized>(value: &T) -> Result<Context> {
    let value = Value::from_serialize(value)?;
    match value.resolve() {
        Datum::Map(map) => Ok(map.as_ref().clone()),
        Datum::Object(obj) if obj.kind() != ObjectKind::Seq => Ok(obj
            .keys()
            .into_iter()
            .map(|k| {
                let v = obj.get_member(&k).unwrap_or_default();
                (k, v)
            })
            .collect()),
        _ => Err(Error::Serialization(
            "A context must serialize to a struct or a map".to_string(),
        )),
    }
}

/// A compiled template.
///
/// Immutable after compilation and safe to render from many threads at once.
/// A template that extends another only contributes its blocks; rendering
/// always starts at the root of the inheritance chain.
pub struct Template {
    name: String,
    shared: Arc<SetShared>,
    options: Options,
    root: NodeList,
    blocks: HashMap<String, Arc<NodeList>>,
    macros: HashMap<String, Arc<Macro>>,
    parent: Option<Arc<Template>>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("blocks", &self.blocks.keys().collect::<Vec<_>>())
            .field("macros", &self.macros.keys().collect::<Vec<_>>())
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl Template {
    pub(crate) fn compile(name: &str, source: &str, env: &CompileEnv<'_>) -> Result<Template> {
        debug!("compiling template '{}'", name);
        let label: Arc<str> = Arc::from(name);
        let mut tokens = lex(label.clone(), source)?;
        apply_block_trimming(
            &mut tokens,
            env.options.trim_blocks,
            env.options.lstrip_blocks,
        );

        let mut parser = Parser::new(label, tokens, env);
        let root = parser.parse_document()?;
        let DocState {
            blocks,
            macros,
            parent,
            ..
        } = parser.doc;

        Ok(Template {
            name: name.to_string(),
            shared: env.set.shared(),
            options: env.options,
            root,
            blocks,
            macros,
            parent,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn parent(&self) -> Option<&Arc<Template>> {
        self.parent.as_ref()
    }

    pub(crate) fn blocks(&self) -> &HashMap<String, Arc<NodeList>> {
        &self.blocks
    }

    pub(crate) fn macros(&self) -> &HashMap<String, Arc<Macro>> {
        &self.macros
    }

    /// Names of the blocks this template defines (not inherited ones).
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// This template followed by its ancestors.
    fn chain(&self) -> Vec<&Template> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = &current.parent {
            chain.push(parent.as_ref());
            current = parent.as_ref();
        }
        chain
    }

    /// Globals overlaid with the caller's variables, after checking that every
    /// key is identifier-shaped and no key shadows an exported macro.
    fn public_scope<'c>(&'c self, context: &'c Context) -> Result<HashMap<&'c str, &'c Value>> {
        let mut public: HashMap<&str, &Value> = self
            .shared
            .globals
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        public.extend(context.iter().map(|(k, v)| (k.as_str(), v)));

        for key in public.keys() {
            if !IDENTIFIER.is_match(key) {
                return Err(Error::structural(
                    &self.name,
                    format!(
                        "context key name '{}' is invalid; only letters, digits and '_' are allowed",
                        key
                    ),
                ));
            }
            if self.macros.get(*key).is_some_and(|m| m.is_exported()) {
                return Err(Error::structural(
                    &self.name,
                    format!("context key name '{}' clashes with macro '{}'", key, key),
                ));
            }
        }
        Ok(public)
    }

    fn run(&self, context: &Context, out: &mut dyn fmt::Write) -> Result<()> {
        let public = self.public_scope(context)?;
        let chain = self.chain();
        let root = chain.last().copied().unwrap_or(self);
        let pool = BufferPool::default();
        let mut ctx = ExecutionContext::new(
            chain.clone(),
            public,
            &self.shared.filters,
            &pool,
            self.options.autoescape,
        );
        let mut writer = TemplateWriter::new(out, self.options.autoescape);
        render_nodes(&root.root, &mut ctx, &mut writer)
    }

    /// Renders to a string. Nothing is produced on error.
    pub fn execute(&self, context: &Context) -> Result<String> {
        let mut out = String::with_capacity(1024);
        self.run(context, &mut out)?;
        Ok(out)
    }

    pub fn execute_bytes(&self, context: &Context) -> Result<Vec<u8>> {
        self.execute(context).map(String::into_bytes)
    }

    /// Renders into a buffer first and writes it to `writer` only on success.
    pub fn execute_writer<W: io::Write>(&self, context: &Context, mut writer: W) -> Result<()> {
        let out = self.execute(context)?;
        writer.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Renders straight into `writer`. Output written before a failure stays
    /// written.
    pub fn execute_writer_unbuffered<W: io::Write>(&self, context: &Context, writer: W) -> Result<()> {
        let mut sink = IoSink::new(writer);
        let res = self.run(context, &mut sink);
        match sink.take_error() {
            Some(e) => Err(Error::Io(e)),
            None => res,
        }
    }

    /// Renders only the named blocks, each with its most-derived body.
    ///
    /// Walks from this template towards the root; a block resolved at a more
    /// derived level is never replaced by an ancestor's. Names no template
    /// defines are absent from the result.
    pub fn execute_blocks(&self, context: &Context, blocks: &[&str]) -> Result<HashMap<String, String>> {
        let public = self.public_scope(context)?;
        let chain = self.chain();
        let wanted: HashSet<&str> = blocks.iter().copied().collect();
        let pool = BufferPool::default();
        let mut ctx = ExecutionContext::new(
            chain.clone(),
            public,
            &self.shared.filters,
            &pool,
            self.options.autoescape,
        );

        let mut result = HashMap::new();
        for level in &chain {
            for name in blocks {
                if result.contains_key(*name) {
                    continue;
                }
                let Some(body) = level.blocks.get(*name) else {
                    continue;
                };
                let mut buf = pool.checkout();
                let mut writer = TemplateWriter::new(&mut *buf, level.options.autoescape);
                render_nodes(body, &mut ctx, &mut writer)?;
                result.insert(name.to_string(), buf.as_str().to_string());
            }
            if result.len() == wanted.len() {
                break;
            }
        }
        Ok(result)
    }

    /// Renders this template inside another render (`include`), with `vars`
    /// as the caller-visible variables on top of the set's globals.
    pub(crate) fn render_included(
        &self,
        outer: &ExecutionContext<'_>,
        vars: &HashMap<String, Value>,
        writer: &mut TemplateWriter<'_>,
    ) -> Result<()> {
        let mut public: HashMap<&str, &Value> = self
            .shared
            .globals
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        public.extend(vars.iter().map(|(k, v)| (k.as_str(), v)));

        let chain = self.chain();
        let root = chain.last().copied().unwrap_or(self);
        let mut ctx = outer.nested(chain.clone(), public, self.options.autoescape);
        render_nodes(
            &root.root,
            &mut ctx,
            &mut writer.with_autoescape(self.options.autoescape),
        )
    }
}
