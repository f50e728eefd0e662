#[macro_use]
extern crate plugin_core;

use plugin_core::abi_stable::std_types::RStr;
use plugin_core::{declare_plugin, Plugin, PluginRef, RouterFn};

/// Demonstrates the "linear chain" scenario from spec.md §8: this plug-in declares
/// `greeter` as a dependency and receives its already-activated instance at
/// construction time.
struct GreeterConsumer {
    greeter_name: String,
}

impl Plugin for GreeterConsumer {
    fn name(&self) -> RStr<'static> {
        RStr::from_str("greeter_consumer")
    }

    fn loaded(&self) {
        info!("greeter_consumer loaded, greeting from: {}", self.greeter_name);
    }

    fn about_to_be_unloaded(&self) {
        info!("greeter_consumer unloading");
    }
}

fn create_greeter_consumer(_router: RouterFn, deps: &[PluginRef<'static>]) -> GreeterConsumer {
    let greeter_name = deps
        .first()
        .map(|dep| dep.name().to_string())
        .unwrap_or_default();
    GreeterConsumer { greeter_name }
}

declare_plugin!(
    GreeterConsumer,
    "greeter_consumer",
    include_str!("../metadata.json"),
    create_greeter_consumer
);
