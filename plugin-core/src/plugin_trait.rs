use abi_stable::sabi_trait;
use abi_stable::sabi_types::RRef;
use abi_stable::std_types::{RBox, RStr};
use std::ffi::c_void;

/// The C-ABI entry point handed to every plug-in at construction (spec.md §4.5, §6).
///
/// Returns a `RouterCode` (see `crate::router`) as a raw `u16` to stay FFI-safe across
/// the dylib boundary.
pub type RouterFn =
    extern "C" fn(sender: RStr<'static>, code: u16, data: *mut *mut c_void, data_size: *mut usize) -> u16;

/// The host-defined interface every plug-in instance implements.
///
/// `#[sabi_trait]` (as used for the teacher's own `Plugin` trait in
/// `plugin-base/src/lib.rs`) gives this trait a stable, `repr(C)`-compatible vtable
/// layout so trait objects can safely cross the dylib boundary.
#[sabi_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> RStr<'static>;

    /// Called once, after construction, when this plug-in's dependencies (if any) have
    /// already completed their own `loaded` call.
    fn loaded(&self) {}

    /// Called exactly once, before this instance is dropped. Any dependant of this
    /// plug-in has already had its own `about_to_be_unloaded` called first.
    fn about_to_be_unloaded(&self) {}

    /// Invoked only on the manager's registered "main" plug-in, after every plug-in in
    /// the load order has been activated.
    fn main_plugin_exec(&self) {}

    /// Handles a request sent by a dependant that has declared this plug-in as a
    /// dependency (spec.md §4.5's peer-to-peer path). Codes below 100 are reserved by
    /// the router; plug-in-defined protocols start at 100.
    fn handle_request(&self, _code: u16, _data: *mut *mut c_void, _data_size: *mut usize) -> u16 {
        crate::router::RouterCode::UnknownRequest as u16
    }
}

/// An owned, boxed plug-in instance, as produced by `createPlugin`.
pub type PluginObject = Plugin_TO<'static, RBox<()>>;

/// A non-owning reference to a dependency's already-activated instance, handed to a
/// dependant at construction time (spec.md §3 "Ownership").
pub type PluginRef<'a> = Plugin_TO<'a, RRef<'a, ()>>;

/// Borrows a `PluginRef` out of an owned instance, erased to `'static`.
///
/// # Safety
/// The erasure is sound only because of the manager's leaves-first unload order
/// (spec.md §5 "Lifetime"): a dependency's record outlives every `createPlugin` call of
/// its dependants, so the reference stays valid for the caller's full constructor call
/// even though the type no longer says so.
pub fn reborrow(instance: &PluginObject) -> PluginRef<'static> {
    let borrowed: PluginRef<'_> = instance.reborrow();
    unsafe { std::mem::transmute(borrowed) }
}

/// Signature every plug-in's exported `createPlugin` symbol must match.
///
/// # Safety
/// `deps` must point to `deps_count` valid, currently-activated `PluginRef`s, one per
/// declared dependency in declaration order.
pub type PluginCreate = unsafe extern "C" fn(
    router: RouterFn,
    deps: *const PluginRef<'static>,
    deps_count: usize,
) -> *mut PluginObject;

/// Declares the three ABI exports a plug-in crate must provide (spec.md §6):
/// a `name` string symbol, a `metadata` JSON string symbol, and a `createPlugin`
/// constructor. Modeled on the teacher's `declare_plugin!` in `plugin-base/src/lib.rs`.
#[macro_export]
macro_rules! declare_plugin {
    ($plugin_type:ty, $name:expr, $metadata_json:expr, $constructor:path) => {
        #[no_mangle]
        pub static name: &[u8] = concat!($name, "\0").as_bytes();

        #[no_mangle]
        pub static metadata: &[u8] = concat!($metadata_json, "\0").as_bytes();

        #[no_mangle]
        pub unsafe extern "C" fn createPlugin(
            router: $crate::RouterFn,
            deps: *const $crate::PluginRef<'static>,
            deps_count: usize,
        ) -> *mut $crate::PluginObject {
            let deps: &[$crate::PluginRef<'static>] = if deps.is_null() {
                &[]
            } else {
                std::slice::from_raw_parts(deps, deps_count)
            };
            let constructor: fn(
                $crate::RouterFn,
                &[$crate::PluginRef<'static>],
            ) -> $plugin_type = $constructor;
            let instance = constructor(router, deps);
            let object: $crate::PluginObject = $crate::Plugin_TO::from_value(
                instance,
                $crate::abi_stable::sabi_trait::prelude::TD_Opaque,
            );
            Box::into_raw(Box::new(object))
        }
    };
}
