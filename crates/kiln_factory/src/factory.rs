//! Container factory driving the artifact cache.

use std::collections::HashSet;
use std::path::PathBuf;

use kiln_cache::{
    ArtifactCache, ArtifactHandle, Fingerprinter, GenerationResult, ManifestCheck, StalenessCheck,
};
use serde_json::Value;
use tracing::debug;

use crate::collaborators::{Compiler, ConfigLoader};
use crate::error::FactoryError;
use crate::request::{ConfigSource, ContainerRequest};

type CompileHook<C> = Box<dyn FnMut(&mut C, &Value)>;

/// Produces generated container code, regenerating it only when the
/// request or one of the files it was built from has changed.
///
/// A fresh loader and compiler are created for every generation pass.
/// Hooks registered with [`on_compile`](Self::on_compile) run after the
/// configuration is loaded and before it is compiled, and may configure
/// the compiler (for example by registering extensions).
pub struct ContainerFactory<L, C, S = ManifestCheck> {
    cache: ArtifactCache<Fingerprinter, S>,
    request: ContainerRequest,
    pipeline: Pipeline<L, C>,
    loaded: Option<ArtifactHandle>,
}

struct Pipeline<L, C> {
    create_loader: Box<dyn Fn() -> L>,
    create_compiler: Box<dyn Fn() -> C>,
    on_compile: Vec<CompileHook<C>>,
    prologue: Option<String>,
}

impl<L, C, S> ContainerFactory<L, C, S>
where
    L: ConfigLoader,
    C: Compiler,
    S: StalenessCheck,
{
    /// Creates a factory storing its output in `cache`.
    pub fn new(
        cache: ArtifactCache<Fingerprinter, S>,
        create_loader: impl Fn() -> L + 'static,
        create_compiler: impl Fn() -> C + 'static,
    ) -> Self {
        Self {
            cache,
            request: ContainerRequest::default(),
            pipeline: Pipeline {
                create_loader: Box::new(create_loader),
                create_compiler: Box::new(create_compiler),
                on_compile: Vec::new(),
                prologue: None,
            },
            loaded: None,
        }
    }

    /// Sets a line emitted before the source comments of the generated code.
    pub fn with_prologue(mut self, prologue: impl Into<String>) -> Self {
        self.pipeline.prologue = Some(prologue.into());
        self
    }

    /// Registers a hook run before each compilation.
    pub fn on_compile(&mut self, hook: impl FnMut(&mut C, &Value) + 'static) -> &mut Self {
        self.pipeline.on_compile.push(Box::new(hook));
        self
    }

    /// Appends a configuration file.
    pub fn add_config_file(&mut self, source: ConfigSource) -> &mut Self {
        self.request_mut().config_files.push(source);
        self
    }

    /// Sets an inline configuration value.
    pub fn set_config(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.request_mut().config.insert(key.into(), value.into());
        self
    }

    /// Sets the generated type name and its base type.
    pub fn set_class(&mut self, class: impl Into<String>, parent_class: impl Into<String>) -> &mut Self {
        let request = self.request_mut();
        request.class = class.into();
        request.parent_class = parent_class.into();
        self
    }

    /// Returns the current request.
    pub fn request(&self) -> &ContainerRequest {
        &self.request
    }

    /// Returns the request for modification.
    ///
    /// Any previously obtained artifact is forgotten, so the next call to
    /// [`artifact`](Self::artifact) consults the cache again.
    pub fn request_mut(&mut self) -> &mut ContainerRequest {
        self.loaded = None;
        &mut self.request
    }

    /// Returns the generated container, consulting the cache at most once
    /// per request.
    pub fn artifact(&mut self) -> Result<&ArtifactHandle, FactoryError> {
        let handle = match self.loaded.take() {
            Some(handle) => handle,
            None => {
                let pipeline = &mut self.pipeline;
                let request = &self.request;
                self.cache
                    .get_or_build(request, || pipeline.generate(request))?
            }
        };
        Ok(&*self.loaded.insert(handle))
    }

    /// Runs the loader and compiler without consulting the cache.
    pub fn generate(&mut self) -> Result<GenerationResult, FactoryError> {
        self.pipeline.generate(&self.request)
    }
}

impl<L: ConfigLoader, C: Compiler> Pipeline<L, C> {
    fn generate(&mut self, request: &ContainerRequest) -> Result<GenerationResult, FactoryError> {
        let mut compiler = (self.create_compiler)();
        let mut loader = (self.create_loader)();
        let loaded = loader.load(&request.config_files, &request.config)?;
        for hook in &mut self.on_compile {
            hook(&mut compiler, &loaded.config);
        }
        let unit = compiler.compile(&loaded.config, &request.class, &request.parent_class)?;

        let mut code = String::new();
        if let Some(prologue) = &self.prologue {
            code.push_str(prologue);
            code.push('\n');
        }
        for source in &request.config_files {
            code.push_str(&source_comment(source));
            code.push('\n');
        }
        code.push('\n');
        code.push_str(&unit.code);

        let dependencies = dedup(loaded.dependencies.into_iter().chain(unit.dependencies));
        debug!(
            class = %request.class,
            dependencies = dependencies.len(),
            "generated container code"
        );
        Ok(GenerationResult::new(code, dependencies))
    }
}

fn source_comment(source: &ConfigSource) -> String {
    match &source.section {
        Some(section) => format!("// source: {} {}", source.path.display(), section),
        None => format!("// source: {}", source.path.display()),
    }
}

fn dedup(paths: impl Iterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths.filter(|p| seen.insert(p.clone())).collect()
}
