//! Example: binding controllers to a document
//!
//! Run with `RUST_LOG=fos_controller=debug` to watch the lifecycle.

use std::time::Duration;

use fos_controller::{
    Controller, ControllerError, ControllerEvent, ControllerFactory, Engine, LifecycleEvent,
    LoadError, LoadFuture, LoadReference, Loader, ModuleExports, ScriptRegistrar,
};
use fos_dom::{Document, NodeId, ReadyState};
use futures::future::FutureExt;
use tracing_subscriber::EnvFilter;

/// Marks its element while attached
#[derive(Default)]
struct Highlight;

impl Controller for Highlight {
    fn attach(&mut self, element: NodeId, document: &mut Document) -> Result<(), ControllerError> {
        document
            .set_attribute(element, "data-highlighted", "true")
            .map_err(|e| ControllerError::new(e.to_string()))
    }

    fn detach(&mut self, element: NodeId, document: &mut Document) -> Result<(), ControllerError> {
        document
            .remove_attribute(element, "data-highlighted")
            .map(drop)
            .map_err(|e| ControllerError::new(e.to_string()))
    }
}

/// Pretends to fetch scripts over a slow network
struct DelayedLoader;

impl Loader for DelayedLoader {
    fn load_script(&self, reference: &LoadReference, registrar: ScriptRegistrar) -> LoadFuture<()> {
        let url = reference.url.clone();
        async move {
            smol::Timer::after(Duration::from_millis(50)).await;
            if !url.path().ends_with("highlight.js") {
                return Err(LoadError::NotFound);
            }
            registrar.register(ControllerFactory::of::<Highlight>(), None);
            Ok(())
        }
        .boxed_local()
    }

    fn import_module(&self, _: &LoadReference) -> LoadFuture<ModuleExports> {
        async { Err(LoadError::NotFound) }.boxed_local()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut document = Document::new("https://example.com/app/");
    let head = document.head();
    let body = document.body();

    let link = document.create_element("link");
    document.set_attribute(link, "controller-name", "highlight")?;
    document.set_attribute(link, "href", "controllers/highlight.js")?;
    document.append_child(head, link)?;

    let card = document.create_element("div");
    document.set_attribute(card, "controller", "highlight")?;
    document.append_child(body, card)?;

    let engine = Engine::builder(document).loader(DelayedLoader).build()?;
    engine.add_listener(card, LifecycleEvent::Attached, |event: &ControllerEvent| {
        println!("{} -> {} on {}", event.event_type, event.name, event.target);
    });
    engine.start()?;

    println!("fOS Controller v{}", fos_controller::VERSION);
    engine.document().borrow_mut().set_ready_state(ReadyState::Interactive);
    engine.block_on(engine.run_until_idle());

    let highlighted = engine
        .document()
        .borrow()
        .get_attribute(card, "data-highlighted")
        .map(str::to_string);
    println!("card highlighted: {highlighted:?}");

    engine.document().borrow_mut().remove(card)?;
    engine.settle();
    println!("binding after removal: {:?}", engine.binding(card));

    Ok(())
}
