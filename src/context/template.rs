use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use minijinja::{Environment, Value};
use serde_json::Map;

use super::{AssetSource, Context};
use crate::config::TemplateConfig;
use crate::error::{Error, HandlerResult};

/// Template sources, helper functions and the source cache shared by all
/// contexts of a dispatcher.
///
/// Sources are rendered with `minijinja` under an `.html` name, so output is
/// HTML auto-escaped. Helper functions are registered as template globals.
#[derive(Default)]
pub struct Templates {
    config: TemplateConfig,
    funcs: HashMap<String, Value>,
    cache: DashMap<String, Arc<str>>,
}

impl Templates {
    #[must_use]
    pub fn new(config: TemplateConfig) -> Self {
        Self {
            config,
            funcs: HashMap::new(),
            cache: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_funcs(mut self, funcs: HashMap<String, Value>) -> Self {
        self.funcs = funcs;
        self
    }

    #[must_use]
    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    #[must_use]
    pub fn funcs(&self) -> &HashMap<String, Value> {
        &self.funcs
    }

    /// Load `<root>/<name><suffix>` from disk, through the cache when enabled.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be read.
    pub fn load_file(&self, name: &str) -> Result<Arc<str>, Error> {
        let file_name = format!("{name}{}", self.config.suffix);
        self.cached(format!("file:{file_name}"), || {
            let path = self.config.root.join(&file_name);
            std::fs::read_to_string(&path).map_err(|e| Error::io(path, e))
        })
    }

    /// Load `<name><suffix>` from an asset source, through the cache when
    /// enabled.
    ///
    /// # Errors
    ///
    /// [`Error::AssetNotFound`] when the source has no such asset.
    pub fn load_asset(&self, source: &dyn AssetSource, name: &str) -> Result<Arc<str>, Error> {
        let file_name = format!("{name}{}", self.config.suffix);
        self.cached(format!("asset:{file_name}"), || {
            let bytes = source
                .get(&file_name)
                .ok_or_else(|| Error::AssetNotFound(file_name.clone()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
    }

    fn cached<F>(&self, key: String, load: F) -> Result<Arc<str>, Error>
    where
        F: FnOnce() -> Result<String, Error>,
    {
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let source: Arc<str> = Arc::from(load()?);
        if self.config.cache {
            self.cache.insert(key, Arc::clone(&source));
        }
        Ok(source)
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templates")
            .field("config", &self.config)
            .field("funcs", &self.funcs.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// Render `source` against `data` with `funcs` available as globals.
///
/// # Errors
///
/// [`Error::Template`] when the source does not parse or rendering fails.
pub fn render(
    source: &str,
    funcs: &HashMap<String, Value>,
    data: &Map<String, serde_json::Value>,
) -> Result<String, Error> {
    let mut env = Environment::new();
    for (name, f) in funcs {
        env.add_global(name.clone(), f.clone());
    }
    let template = env.template_from_named_str("page.html", source)?;
    Ok(template.render(Value::from_serialize(data))?)
}

impl Context {
    /// Make a helper function available to templates rendered by this
    /// context. Empty names are ignored.
    ///
    /// ```rust,ignore
    /// ctx.add_func("upper", minijinja::Value::from_function(|s: String| s.to_uppercase()));
    /// ```
    pub fn add_func(&mut self, name: &str, func: Value) -> &mut Self {
        if !name.is_empty() {
            self.funcs.insert(name.to_string(), func);
        }
        self
    }

    pub fn add_func_map(&mut self, funcs: HashMap<String, Value>) -> &mut Self {
        for (name, func) in funcs {
            self.add_func(&name, func);
        }
        self
    }

    /// Merge `data` into the data map and render `source` as HTML.
    ///
    /// # Errors
    ///
    /// [`Error::Template`] on parse or render failure.
    pub fn template(&mut self, source: &str, data: Map<String, serde_json::Value>) -> HandlerResult {
        self.set_data_map(data, false);
        let html = render(source, &self.funcs, self.data_map())?;
        self.html(&html);
        Ok(())
    }

    /// Render the template file `<root>/<name><suffix>`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file is missing, [`Error::Template`] on render
    /// failure.
    pub fn template_file(&mut self, name: &str, data: Map<String, serde_json::Value>) -> HandlerResult {
        let source = self.templates.load_file(name)?;
        self.template(&source, data)
    }

    /// Render the template `<name><suffix>` from an asset source.
    ///
    /// # Errors
    ///
    /// [`Error::AssetNotFound`] when missing, [`Error::Template`] on render
    /// failure.
    pub fn template_asset(
        &mut self,
        source: &dyn AssetSource,
        name: &str,
        data: Map<String, serde_json::Value>,
    ) -> HandlerResult {
        let source = self.templates.load_asset(source, name)?;
        self.template(&source, data)
    }
}
