//! The template engine: precache, render, clear.

use crate::cache::{content_digest, TemplateCache};
use crate::config::EngineConfig;
use crate::resolver::{ChangeKind, FsResolver, SourceResolver, WatchCallback, WatchControl};
use crate::source::{parent_dir, resolve_relative, TemplateSource};
use log::{debug, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use stencil_eval::{EvalError, EvalResult, Includer};
use stencil_parser::scan_template;
use stencil_types::{Bindings, Result, SyntaxError, Template, TemplateError};

/// Identifier used in errors for templates rendered without one.
const ANONYMOUS: &str = "<inline>";

/// Compiles templates once, caches them by id and renders them with
/// per-call bindings.
///
/// Cloning is cheap and clones share one cache.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    cache: TemplateCache,
    resolver: Arc<dyn SourceResolver>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

impl Engine {
    /// Engine reading templates from the filesystem.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_resolver(config, Arc::new(FsResolver::new()))
    }

    pub fn with_resolver(config: EngineConfig, resolver: Arc<dyn SourceResolver>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                cache: TemplateCache::new(),
                resolver,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.inner.cache
    }

    /// Scan `source` and cache it under its id.
    ///
    /// Inline sources without an id are scanned but not stored. Path
    /// sources also get a change watch: a modification refreshes the entry,
    /// a rename or removal drops it. A failure is logged and returned and
    /// leaves the cache untouched.
    pub fn precache(&self, source: &TemplateSource) -> Result<Arc<Template>> {
        match source {
            TemplateSource::Inline { content, .. } => {
                let id = source.id();
                let template = self.inner.scan(id, content)?;
                if let Some(id) = id {
                    self.inner
                        .cache
                        .insert(id, Arc::clone(&template), content_digest(content));
                    debug!("cached inline template \"{id}\"");
                }
                Ok(template)
            }
            TemplateSource::Path(path) => {
                let content = self.inner.resolver.read_all(path).map_err(|source| {
                    warn!("can not read template \"{path}\": {source}");
                    TemplateError::SourceRead {
                        path: path.clone(),
                        source,
                    }
                })?;
                let template = self.inner.scan(Some(path), &content)?;
                self.inner
                    .cache
                    .insert(path.clone(), Arc::clone(&template), content_digest(&content));
                debug!("cached template \"{path}\"");
                if let Err(e) = self.watch(path) {
                    warn!("can not watch template \"{path}\": {e}");
                }
                Ok(template)
            }
        }
    }

    /// Render `source` with `imports` layered over the configured globals.
    ///
    /// A cached entry is used when present; otherwise the source is
    /// precached first. In raw mode the assembled program text is returned
    /// and nothing is executed.
    pub fn render(&self, source: impl Into<TemplateSource>, imports: &Bindings) -> Result<String> {
        self.render_at(&source.into(), imports, 0)
    }

    /// Drop the entry for `id`, or every entry when `id` is `None`.
    ///
    /// Open change watches stay registered: a later modification recreates
    /// the entry.
    pub fn clear(&self, id: Option<&str>) {
        match id {
            Some(id) => {
                if self.inner.cache.remove(id) {
                    debug!("cleared template \"{id}\"");
                }
            }
            None => {
                self.inner.cache.clear();
                debug!("cleared template cache");
            }
        }
    }

    fn render_at(
        &self,
        source: &TemplateSource,
        imports: &Bindings,
        depth: usize,
    ) -> Result<String> {
        let id = source.id();
        let cached = id.and_then(|id| self.inner.cache.get(id));
        let template = match cached {
            Some(template) => {
                debug!("cache hit for \"{}\"", id.unwrap_or(ANONYMOUS));
                template
            }
            None => self.precache(source)?,
        };

        let base = self.include_base(id);
        if self.inner.config.raw {
            return Ok(template.assembled_text(&base.to_string_lossy()));
        }

        let scope = IncludeScope {
            engine: self,
            base,
            depth,
        };
        stencil_eval::execute(&template, &self.inner.config.globals, imports, &scope)
            .map_err(|e| TemplateError::execution(id.unwrap_or(ANONYMOUS), e))
    }

    /// Directory that `include` arguments are relative to.
    fn include_base(&self, id: Option<&str>) -> PathBuf {
        match id {
            Some(id) => parent_dir(id),
            None => self
                .inner
                .config
                .base_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    fn watch(&self, path: &str) -> std::io::Result<()> {
        let engine: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let id = path.to_string();
        let on_change: WatchCallback = Box::new(move |change: ChangeKind| {
            match engine.upgrade() {
                Some(inner) => inner.on_change(&id, change),
                None => WatchControl::Stop,
            }
        });
        self.inner.resolver.watch(path, on_change)
    }
}

impl EngineInner {
    fn scan(&self, id: Option<&str>, content: &str) -> Result<Arc<Template>> {
        scan_template(content, &self.config.open, &self.config.close)
            .map(Arc::new)
            .map_err(|e| {
                let e = match id {
                    Some(id) => e.with_id(id),
                    None => e,
                };
                warn!("can not compile template: {e}");
                TemplateError::Syntax(e)
            })
    }

    fn on_change(&self, id: &str, change: ChangeKind) -> WatchControl {
        match change {
            ChangeKind::Rename => {
                self.cache.remove(id);
                debug!("template \"{id}\" was renamed or removed; entry dropped");
                WatchControl::Stop
            }
            ChangeKind::Modify => {
                self.refresh(id);
                WatchControl::Continue
            }
        }
    }

    /// Re-read and re-scan `id`. On failure the previous entry stays.
    fn refresh(&self, id: &str) {
        let content = match self.resolver.read_all(id) {
            Ok(content) => content,
            Err(e) => {
                warn!("can not re-read template \"{id}\", keeping cached version: {e}");
                return;
            }
        };
        let digest = content_digest(&content);
        if self.cache.digest(id).as_deref() == Some(digest.as_str()) {
            debug!("template \"{id}\" unchanged");
            return;
        }
        match scan_template(&content, &self.config.open, &self.config.close) {
            Ok(template) => {
                self.cache.insert(id, Arc::new(template), digest);
                debug!("refreshed template \"{id}\"");
            }
            Err(e) => {
                let e: SyntaxError = e.with_id(id);
                warn!("can not recompile template, keeping cached version: {e}");
            }
        }
    }
}

/// `include` handler for one template being rendered.
struct IncludeScope<'a> {
    engine: &'a Engine,
    base: PathBuf,
    depth: usize,
}

impl Includer for IncludeScope<'_> {
    fn include(&self, file: &str, imports: &Bindings) -> EvalResult<String> {
        let target = resolve_relative(Path::new(&self.base), file);
        let depth = self.depth + 1;
        if depth > self.engine.inner.config.max_include_depth {
            return Err(EvalError::Include(Box::new(TemplateError::CyclicInclude {
                id: target,
                depth,
            })));
        }
        self.engine
            .render_at(&TemplateSource::Path(target), imports, depth)
            .map_err(|e| EvalError::Include(Box::new(e)))
    }
}
