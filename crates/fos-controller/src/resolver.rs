//! Resolvers
//!
//! A resolver maps a controller name to a future of its factory. The default
//! [`LinkResolver`] reads `<link controller-name="..." href="...">`
//! declarations from the document and drives the host's [`Loader`].

use std::cell::RefCell;
use std::rc::Rc;

use fos_dom::Document;
use futures::future::{self, FutureExt};
use url::Url;

use crate::loader::{LoadedReference, SharedLoad};
use crate::{
    Config, ControllerRegistry, LoadKind, LoadReference, Loader, ResolutionCache, ResolveError,
    ResolveFuture, ScriptRegistrar,
};

/// Strategy turning a controller name into its factory
pub trait Resolver {
    fn resolve(&self, name: &str) -> ResolveFuture;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> ResolveFuture,
{
    fn resolve(&self, name: &str) -> ResolveFuture {
        self(name)
    }
}

/// Default resolver backed by declaration elements
pub struct LinkResolver {
    document: Rc<RefCell<Document>>,
    config: Rc<Config>,
    cache: Rc<ResolutionCache>,
    registry: Rc<ControllerRegistry>,
    loader: Rc<dyn Loader>,
}

impl LinkResolver {
    pub(crate) fn new(
        document: Rc<RefCell<Document>>,
        config: Rc<Config>,
        cache: Rc<ResolutionCache>,
        registry: Rc<ControllerRegistry>,
        loader: Rc<dyn Loader>,
    ) -> Self {
        Self {
            document,
            config,
            cache,
            registry,
            loader,
        }
    }

    /// Read and classify the declaration for `name`
    pub fn reference(&self, name: &str) -> Result<LoadReference, ResolveError> {
        let document = self.document.borrow();
        let config = &self.config;

        let link = document
            .query_attribute(&config.declaration_tag, &config.alias_attribute, name)
            .ok_or_else(|| ResolveError::UnresolvedName { name: name.to_string() })?;

        let href = document
            .get_attribute(link, "href")
            .filter(|href| !href.trim().is_empty())
            .ok_or_else(|| ResolveError::MissingReference { name: name.to_string() })?;

        let url = resolve_href(document.url(), href).map_err(|err| ResolveError::InvalidReference {
            name: name.to_string(),
            href: href.to_string(),
            reason: err.to_string(),
        })?;

        let declared = document
            .get_attribute(link, &config.load_kind_attribute)
            .filter(|kind| !kind.is_empty());
        let kind = match declared {
            Some(declared) => LoadKind::parse(declared).ok_or_else(|| ResolveError::UnsupportedLoadKind {
                name: name.to_string(),
                kind: declared.to_string(),
            })?,
            None => LoadKind::infer(&url, document.get_attribute(link, "rel")),
        };

        Ok(LoadReference { url, kind })
    }

    /// Start (or join) the load of a reference
    fn load(&self, name: &str, reference: &LoadReference) -> SharedLoad {
        if let Some(load) = self.cache.reference(&reference.url) {
            tracing::debug!(controller = name, url = %reference.url, "Reusing in-flight load");
            return load;
        }

        tracing::debug!(controller = name, url = %reference.url, kind = ?reference.kind, "Loading controller");
        let load = match reference.kind {
            LoadKind::Script => {
                let registrar =
                    ScriptRegistrar::new(Rc::clone(&self.registry), Some(name), reference.url.clone());
                self.loader
                    .load_script(reference, registrar)
                    .map(|loaded| loaded.map(|()| Rc::new(LoadedReference::Script)))
                    .boxed_local()
            }
            LoadKind::Module => self
                .loader
                .import_module(reference)
                .map(|loaded| loaded.map(|exports| Rc::new(LoadedReference::Module(exports))))
                .boxed_local(),
        };
        self.cache.insert_reference(reference.url.clone(), load.shared())
    }
}

impl Resolver for LinkResolver {
    fn resolve(&self, name: &str) -> ResolveFuture {
        let reference = match self.reference(name) {
            Ok(reference) => reference,
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        let load = self.load(name, &reference);
        let registry = Rc::clone(&self.registry);
        let name = name.to_string();

        async move {
            let url = reference.url.to_string();
            let loaded = load.await.map_err(|source| ResolveError::LoadFailed {
                name: name.clone(),
                url: url.clone(),
                source,
            })?;

            let factory = match &*loaded {
                LoadedReference::Script => registry.get(&name),
                LoadedReference::Module(exports) => exports.get(&name),
            };
            factory.ok_or(ResolveError::RegistrationMissing { name, url })
        }
        .boxed_local()
    }
}

/// Resolve `href` against the document URL; absolute hrefs work even when
/// the document URL cannot serve as a base (`about:blank`)
fn resolve_href(base: &str, href: &str) -> Result<Url, url::ParseError> {
    match Url::parse(base) {
        Ok(base) => base.join(href),
        Err(_) => Url::parse(href),
    }
}
