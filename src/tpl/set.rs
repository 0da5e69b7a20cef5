use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use log::{debug, warn};

use crate::Result;
use crate::error::Error;
use crate::tpl::filters::{FilterRegistry, FilterResult};
use crate::tpl::options::Options;
use crate::tpl::parser::CompileEnv;
use crate::tpl::tags::{TagParser, TagRegistry};
use crate::tpl::template::Template;
use crate::value::{ToValue, Value};

/// Shared set used by [`crate::compile`] and handy for one-off templates.
pub static DEFAULT_SET: LazyLock<TemplateSet> =
    LazyLock::new(|| TemplateSet::builder("default").build());

/// Name under which string templates are compiled.
pub const STRING_TEMPLATE_NAME: &str = "<string>";

/// The parts of a set every compiled template keeps a handle on.
pub(crate) struct SetShared {
    pub(crate) name: String,
    pub(crate) options: Options,
    pub(crate) globals: HashMap<String, Value>,
    pub(crate) filters: FilterRegistry,
    pub(crate) tags: TagRegistry,
}

/// A named collection of template sources with its own filters, tags,
/// globals and options.
///
/// Templates referenced by `extends`, `include` and `import` are looked up in
/// the same set. Compiled templates are cached per name; the cache is
/// write-once, so concurrent lookups of the same name all end up sharing one
/// compiled template.
pub struct TemplateSet {
    shared: Arc<SetShared>,
    /// Registered sources by template name.
    sources: DashMap<String, String>,
    /// Compiled templates by template name.
    cache: DashMap<String, Arc<Template>>,
}

/// Configures a [`TemplateSet`]. Registries start with every built-in filter
/// and tag.
pub struct TemplateSetBuilder {
    name: String,
    options: Options,
    globals: HashMap<String, Value>,
    filters: FilterRegistry,
    tags: TagRegistry,
    sources: Vec<(String, String)>,
}

impl TemplateSetBuilder {
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Adds a variable visible to every template of the set. Render contexts
    /// override globals of the same name.
    pub fn global<T: ToValue + ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.globals.insert(name.to_string(), value.to_value());
        self
    }

    /// Registers a filter, replacing a built-in or earlier filter of that name.
    pub fn filter<F>(mut self, name: &str, filter: F) -> Self
    where
        F: Fn(&Value, &Value) -> FilterResult + Send + Sync + 'static,
    {
        self.filters.register(name, filter);
        self
    }

    /// Registers a tag, replacing a built-in or earlier tag of that name.
    pub fn tag(mut self, name: &str, parser: TagParser) -> Self {
        self.tags.register(name, parser);
        self
    }

    pub fn template(mut self, name: &str, source: &str) -> Self {
        self.sources.push((name.to_string(), source.to_string()));
        self
    }

    pub fn build(self) -> TemplateSet {
        let set = TemplateSet {
            shared: Arc::new(SetShared {
                name: self.name,
                options: self.options,
                globals: self.globals,
                filters: self.filters,
                tags: self.tags,
            }),
            sources: DashMap::new(),
            cache: DashMap::new(),
        };
        for (name, source) in self.sources {
            set.add_template(&name, &source);
        }
        set
    }
}

impl TemplateSet {
    pub fn builder(name: &str) -> TemplateSetBuilder {
        TemplateSetBuilder {
            name: name.to_string(),
            options: Options::default(),
            globals: HashMap::new(),
            filters: FilterRegistry::default(),
            tags: TagRegistry::default(),
            sources: Vec::new(),
        }
    }

    /// A set with default options and the built-in filters and tags.
    pub fn new(name: &str) -> Self {
        Self::builder(name).build()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn options(&self) -> Options {
        self.shared.options
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.shared.globals
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.shared.filters
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.shared.tags
    }

    pub(crate) fn shared(&self) -> Arc<SetShared> {
        self.shared.clone()
    }

    /// Registers (or replaces) the source of a template.
    ///
    /// Replacing a source drops its cached compilation; templates that were
    /// already compiled against the old source keep it.
    pub fn add_template(&self, name: &str, source: &str) {
        if self
            .sources
            .insert(name.to_string(), source.to_string())
            .is_some()
        {
            warn!(
                "template '{}' added twice to set '{}', replacing previous source",
                name,
                self.name()
            );
            self.cache.remove(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Returns the compiled template registered under `name`, compiling it on
    /// first use.
    pub fn get_template(&self, name: &str) -> Result<Arc<Template>> {
        self.resolve_nested(name, &[])
    }

    /// Like [`get_template`](Self::get_template), for a template referenced
    /// while compiling the templates in `ancestry`.
    pub(crate) fn resolve_nested(&self, name: &str, ancestry: &[String]) -> Result<Arc<Template>> {
        if let Some(cached) = self.cache.get(name).map(|t| t.value().clone()) {
            return Ok(cached);
        }

        let source = self
            .sources
            .get(name)
            .map(|s| s.value().clone())
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;

        let mut ancestry = ancestry.to_vec();
        ancestry.push(name.to_string());
        let env = CompileEnv {
            set: self,
            options: self.shared.options,
            ancestry,
        };
        let compiled = Arc::new(Template::compile(name, &source, &env)?);
        debug!("caching template '{}' in set '{}'", name, self.name());

        // First writer wins when two threads compile the same name.
        Ok(self
            .cache
            .entry(name.to_string())
            .or_insert(compiled)
            .value()
            .clone())
    }

    /// Compiles an unnamed template with the set's options. It is not cached.
    pub fn from_string(&self, source: &str) -> Result<Template> {
        self.compile(STRING_TEMPLATE_NAME, source, self.shared.options)
    }

    /// Compiles `source` under `name` with explicit options. It is not cached
    /// and not visible to other templates of the set.
    pub fn compile(&self, name: &str, source: &str, options: Options) -> Result<Template> {
        let env = CompileEnv {
            set: self,
            options,
            ancestry: vec![name.to_string()],
        };
        Template::compile(name, source, &env)
    }
}
