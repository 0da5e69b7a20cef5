use std::collections::HashMap;
use std::sync::Arc;

use crate::Result;
use crate::error::{Error, Position};
use crate::tpl::ast::NodeList;
use crate::tpl::filters::FilterRegistry;
use crate::tpl::tags::macros::Macro;
use crate::tpl::template::Template;
use crate::tpl::writer::BufferPool;
use crate::value::Value;

/// Maximum nesting of macro calls within one render.
pub const MAX_CALL_DEPTH: usize = 128;

/// Per-render state: public variables, private (engine) variables, the
/// inheritance chain being rendered and the scratch buffer pool.
///
/// Private variables shadow public ones. Created for one render call and
/// dropped at its end.
pub struct ExecutionContext<'a> {
    /// Most-derived template first, root last.
    chain: Vec<&'a Template>,
    public: HashMap<&'a str, &'a Value>,
    private: Vec<(String, Value)>,
    /// Private entries below this index are hidden (macro call isolation).
    floor: usize,
    filters: &'a FilterRegistry,
    pool: &'a BufferPool,
    depth: usize,
    autoescape: bool,
}

/// A position in the private variable stack to unwind to.
#[derive(Debug, Clone, Copy)]
pub struct ScopeMark(usize);

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        chain: Vec<&'a Template>,
        public: HashMap<&'a str, &'a Value>,
        filters: &'a FilterRegistry,
        pool: &'a BufferPool,
        autoescape: bool,
    ) -> Self {
        Self {
            chain,
            public,
            private: Vec::new(),
            floor: 0,
            filters,
            pool,
            depth: 0,
            autoescape,
        }
    }

    /// A fresh context for rendering another template (`include`) that shares
    /// this render's filters, buffer pool and call depth.
    pub(crate) fn nested<'b>(
        &self,
        chain: Vec<&'b Template>,
        public: HashMap<&'b str, &'b Value>,
        autoescape: bool,
    ) -> ExecutionContext<'b>
    where
        'a: 'b,
    {
        ExecutionContext {
            chain,
            public,
            private: Vec::new(),
            floor: 0,
            filters: self.filters,
            pool: self.pool,
            depth: self.depth,
            autoescape,
        }
    }

    /// All visible variables, private entries overriding public ones.
    pub(crate) fn snapshot(&self) -> HashMap<String, Value> {
        let mut vars: HashMap<String, Value> = self
            .public
            .iter()
            .map(|(k, v)| (k.to_string(), (*v).clone()))
            .collect();
        for (k, v) in &self.private[self.floor..] {
            vars.insert(k.clone(), v.clone());
        }
        vars
    }

    /// Whether the template being rendered escapes output.
    pub fn autoescape(&self) -> bool {
        self.autoescape
    }

    /// Name of the template the render was requested for.
    pub fn template_name(&self) -> &str {
        self.chain.first().map(|t| t.name()).unwrap_or("<unknown>")
    }

    pub fn lookup(&self, key: &str) -> Option<&Value> {
        // Locals first, searched backwards to support shadowing
        if let Some((_, v)) = self.private[self.floor..].iter().rev().find(|(k, _)| k == key) {
            return Some(v);
        }
        self.public.get(key).copied()
    }

    pub fn push(&mut self, key: &str, value: Value) {
        self.private.push((key.to_string(), value));
    }

    /// Assigns to the innermost visible private variable of that name, or pushes
    /// a new one.
    pub fn set(&mut self, key: &str, value: Value) {
        let floor = self.floor;
        match self.private[floor..].iter_mut().rev().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.push(key, value),
        }
    }

    pub fn mark(&self) -> ScopeMark {
        ScopeMark(self.private.len())
    }

    pub fn pop_to(&mut self, mark: ScopeMark) {
        self.private.truncate(mark.0);
    }

    /// Hides all current private variables until [`ExecutionContext::leave_call`].
    pub(crate) fn enter_call(&mut self, pos: &Position) -> Result<(ScopeMark, usize)> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Error::execution(
                pos,
                format!("maximum call depth of {} exceeded", MAX_CALL_DEPTH),
            ));
        }
        self.depth += 1;
        let saved = (self.mark(), self.floor);
        self.floor = self.private.len();
        Ok(saved)
    }

    pub(crate) fn leave_call(&mut self, saved: (ScopeMark, usize)) {
        self.pop_to(saved.0);
        self.floor = saved.1;
        self.depth -= 1;
    }

    /// Most-derived body for a block name.
    pub(crate) fn find_block(&self, name: &str) -> Option<&'a Arc<NodeList>> {
        self.chain.iter().find_map(|t| t.blocks().get(name))
    }

    pub(crate) fn find_macro(&self, name: &str) -> Option<&'a Arc<Macro>> {
        self.chain.iter().find_map(|t| t.macros().get(name))
    }

    pub fn filters(&self) -> &'a FilterRegistry {
        self.filters
    }

    pub fn pool(&self) -> &'a BufferPool {
        self.pool
    }
}
