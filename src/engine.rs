//! Templating engine adapter.
//!
//! Wraps a minijinja environment behind the caching behavior tests have to
//! contend with: template sources, registered functions, and extensions are
//! held separately from the compiled set actually used for rendering. The
//! compiled set is built lazily and keyed by a signature over the extension
//! set, and function bindings are fixed into it when it is built. Overriding
//! a function therefore does not reach templates already compiled; changing
//! the extension set does, by forcing a rebuild on the next render.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt, fs,
    path::Path,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};

use minijinja::{value::Rest, Environment, Value};
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::errors::{self, VellumError};

/// A function callable from templates. Arguments arrive as loosely typed
/// engine values and are checked by the function itself at render time.
pub type TemplateFn = Arc<dyn Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync>;

/// Shared handle to an engine instance, owned for the duration of one test.
pub type SharedEngine = Rc<RefCell<TemplateEnvironment>>;

static MARKER_SEQ: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// EXTENSIONS
// ============================================================================

/// A tagged bundle of template functions. The tag participates in the
/// engine's extension-set signature, so two extensions with different tags
/// are always distinguishable even when both are empty.
pub struct Extension {
    tag: String,
    functions: Vec<(String, TemplateFn)>,
}

impl Extension {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            functions: Vec::new(),
        }
    }

    /// An inert extension with a tag no other extension in this process has.
    /// Registering one changes the extension-set signature without changing
    /// any rendering behavior.
    pub fn marker() -> Self {
        let seq = MARKER_SEQ.fetch_add(1, Ordering::Relaxed);
        Self::new(format!("marker-{seq}"))
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        self.functions.push((name.into(), Arc::new(func)));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("tag", &self.tag)
            .field("functions", &self.functions.len())
            .finish()
    }
}

// ============================================================================
// TEMPLATE ENVIRONMENT
// ============================================================================

/// A compiled set: the built minijinja environment plus the extension-set
/// signature it was built from. Function bindings inside it are frozen.
struct CompiledSet {
    signature: String,
    env: Environment<'static>,
}

/// The engine adapter. Templates, functions, and extensions are registered
/// here; rendering goes through the compiled set.
pub struct TemplateEnvironment {
    sources: BTreeMap<String, String>,
    functions: BTreeMap<String, TemplateFn>,
    extensions: Vec<Extension>,
    compiled: Option<CompiledSet>,
}

impl fmt::Debug for TemplateEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEnvironment")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.len())
            .field("extensions", &self.extensions)
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}

impl TemplateEnvironment {
    pub fn new() -> Self {
        Self {
            sources: BTreeMap::new(),
            functions: BTreeMap::new(),
            extensions: Vec::new(),
            compiled: None,
        }
    }

    /// Wraps the engine in the shared handle the test harness expects.
    pub fn shared(self) -> SharedEngine {
        Rc::new(RefCell::new(self))
    }

    /// Registers a template source under `name`.
    ///
    /// If a compiled set already exists the template compiles into it
    /// directly, against the function bindings that set was built with.
    /// Without a compiled set, syntax errors surface on the next render.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), VellumError> {
        let name = name.into();
        let source = source.into();
        if let Some(set) = &mut self.compiled {
            set.env
                .add_template_owned(name.clone(), source.clone())
                .map_err(|e| errors::compile(&name, &e))?;
        }
        self.sources.insert(name, source);
        Ok(())
    }

    /// Loads every `.j2` / `.jinja` / `.twig` file under `root` as a
    /// template named by its path relative to `root`. Returns how many
    /// templates were loaded.
    pub fn load_directory(&mut self, root: impl AsRef<Path>) -> Result<usize, VellumError> {
        let root = root.as_ref();
        let mut loaded = 0;
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_template = path
                .extension()
                .map(|ext| ext == "j2" || ext == "jinja" || ext == "twig")
                .unwrap_or(false);
            if !is_template {
                continue;
            }
            let source = fs::read_to_string(path).map_err(|e| errors::io(path, &e))?;
            let name = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            self.add_template(name, source)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Registers `func` under `name`, replacing any previous registration.
    ///
    /// An existing compiled set keeps the bindings it was built with: this
    /// registration only reaches templates compiled after the next rebuild.
    pub fn register_function<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(func));
    }

    /// Adds `extension` to the extension set, changing the set's signature.
    /// The compiled set is rebuilt on the next render.
    pub fn register_extension(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Signature over the extension set. The compiled set is reused only
    /// while this value is unchanged.
    pub fn extension_signature(&self) -> String {
        let mut hasher = Sha256::new();
        for extension in &self.extensions {
            hasher.update(extension.tag.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Renders template `name` with `context`.
    pub fn render<S: Serialize>(
        &mut self,
        name: &str,
        context: S,
    ) -> Result<String, VellumError> {
        let set = self.compiled_set()?;
        let template = set.env.get_template(name).map_err(|e| {
            if matches!(e.kind(), minijinja::ErrorKind::TemplateNotFound) {
                errors::unknown_template(name)
            } else {
                errors::render(name, &e)
            }
        })?;
        template.render(context).map_err(|e| errors::render(name, &e))
    }

    fn compiled_set(&mut self) -> Result<&CompiledSet, VellumError> {
        let signature = self.extension_signature();
        if !matches!(&self.compiled, Some(set) if set.signature == signature) {
            let built = self.build(signature)?;
            self.compiled = Some(built);
        }
        match &self.compiled {
            Some(set) => Ok(set),
            None => unreachable!("compiled set installed above"),
        }
    }

    /// Builds a fresh compiled set: all sources compiled, extension
    /// functions installed first, then direct registrations (which win on
    /// name collisions).
    fn build(&self, signature: String) -> Result<CompiledSet, VellumError> {
        let mut env = Environment::new();
        for (name, source) in &self.sources {
            env.add_template_owned(name.clone(), source.clone())
                .map_err(|e| errors::compile(name, &e))?;
        }
        for extension in &self.extensions {
            for (name, func) in &extension.functions {
                install_function(&mut env, name, func);
            }
        }
        for (name, func) in &self.functions {
            install_function(&mut env, name, func);
        }
        Ok(CompiledSet { signature, env })
    }
}

impl Default for TemplateEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

fn install_function(env: &mut Environment<'static>, name: &str, func: &TemplateFn) {
    let func = Arc::clone(func);
    env.add_function(name.to_string(), move |args: Rest<Value>| func(&args.0));
}
