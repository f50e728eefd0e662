#[macro_use]
extern crate plugin_core;

use plugin_core::abi_stable::std_types::RStr;
use plugin_core::{declare_plugin, Plugin, RouterFn, PluginRef};

struct Greeter;

impl Plugin for Greeter {
    fn name(&self) -> RStr<'static> {
        RStr::from_str("greeter")
    }

    fn loaded(&self) {
        info!("greeter loaded");
    }

    fn about_to_be_unloaded(&self) {
        info!("greeter unloading");
    }
}

fn create_greeter(_router: RouterFn, _deps: &[PluginRef<'static>]) -> Greeter {
    Greeter
}

declare_plugin!(
    Greeter,
    "greeter",
    include_str!("../metadata.json"),
    create_greeter
);
