use std::ffi::c_void;
use std::os::raw::c_char;

use abi_stable::std_types::RStr;

use crate::manager::manager;

/// Return codes for the manager-directed path of the request router (spec.md §4.5).
/// Codes `>= 100` are reserved for plug-in-defined protocols and are never produced
/// here.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RouterCode {
    Success = 0,
    CommonError = 1,
    UnknownRequest = 2,
    DataSizeNull = 3,
    NotADependency = 4,
    NotFound = 5,
}

/// The closed set of manager-directed request codes (spec.md §4.5's table).
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequestCode {
    GetAppDirectory = 0,
    GetPluginApi = 1,
    GetPluginsCount = 2,
    GetPluginInfo = 3,
    GetPluginVersion = 4,
    CheckPlugin = 5,
    CheckPluginLoaded = 6,
}

impl RequestCode {
    fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::GetAppDirectory),
            1 => Some(Self::GetPluginApi),
            2 => Some(Self::GetPluginsCount),
            3 => Some(Self::GetPluginInfo),
            4 => Some(Self::GetPluginVersion),
            5 => Some(Self::CheckPlugin),
            6 => Some(Self::CheckPluginLoaded),
            _ => None,
        }
    }
}

/// Heap-allocated snapshot of a plug-in's metadata, returned by `GET_PLUGININFO`.
/// Ownership transfers to the caller, who must reclaim it with `Box::from_raw`.
#[repr(C)]
pub struct PluginInfoSnapshot {
    pub name: *mut c_char,
    pub pretty_name: *mut c_char,
    pub version: *mut c_char,
    pub author: *mut c_char,
}

fn leak_cstring(s: &str) -> *mut c_char {
    std::ffi::CString::new(s)
        .unwrap_or_default()
        .into_raw()
}

/// Reads the input name for a request whose "Data in" is "plug-in name (or null =
/// sender)" (spec.md §4.5): the caller passes a pointer to a nul-terminated C string
/// through `*data`, or leaves it null to mean "the sender itself".
fn read_name_or_sender(sender: RStr<'static>, data: *mut *mut c_void) -> Option<String> {
    if let Some(name) = read_required_name(data) {
        return Some(name);
    }
    if sender.is_empty() {
        None
    } else {
        Some(sender.as_str().to_string())
    }
}

/// Reads the input name for a request whose "Data in" is a required `name` (spec.md
/// §4.5's `CHECK_PLUGIN`/`CHECK_PLUGINLOADED` rows): no sender fallback.
fn read_required_name(data: *mut *mut c_void) -> Option<String> {
    if data.is_null() {
        return None;
    }
    let inner = unsafe { *data };
    if inner.is_null() {
        return None;
    }
    let cstr = unsafe { std::ffi::CStr::from_ptr(inner as *const c_char) };
    cstr.to_str().ok().map(str::to_string)
}

fn write_string_payload(value: String, data: *mut *mut c_void, data_size: *mut usize) -> u16 {
    if data.is_null() || data_size.is_null() {
        return RouterCode::DataSizeNull as u16;
    }
    let len = value.len();
    let boxed: Box<str> = value.into_boxed_str();
    let ptr = Box::into_raw(boxed) as *mut c_void;
    unsafe {
        *data = ptr;
        *data_size = len;
    }
    RouterCode::Success as u16
}

/// The single C-ABI entry point handed to every plug-in at construction (spec.md §4.5).
///
/// `sender` names the plug-in making the request. A `null` logical receiver (i.e. this
/// function itself) always means "to the manager" — peer-to-peer requests never reach
/// this function, the calling plug-in walks its own dependency list and invokes
/// `Plugin::handle_request` directly (spec.md §4.5).
pub extern "C" fn route_to_manager(
    sender: RStr<'static>,
    code: u16,
    data: *mut *mut c_void,
    data_size: *mut usize,
) -> u16 {
    let Some(request) = RequestCode::from_u16(code) else {
        return RouterCode::UnknownRequest as u16;
    };

    let mgr = manager();
    let mgr = mgr.lock().unwrap();

    match request {
        RequestCode::GetAppDirectory => {
            write_string_payload(mgr.app_directory().to_string_lossy().into_owned(), data, data_size)
        }
        RequestCode::GetPluginApi => {
            write_string_payload(mgr.host_api_version().to_string(), data, data_size)
        }
        RequestCode::GetPluginsCount => {
            if data.is_null() || data_size.is_null() {
                return RouterCode::DataSizeNull as u16;
            }
            let count = mgr.count();
            let boxed = Box::new(count);
            unsafe {
                *data = Box::into_raw(boxed) as *mut c_void;
                *data_size = std::mem::size_of::<usize>();
            }
            RouterCode::Success as u16
        }
        RequestCode::GetPluginVersion => {
            let name = read_name_or_sender(sender, data);
            let Some(target) = name.and_then(|n| mgr.info(&n)) else {
                return RouterCode::NotFound as u16;
            };
            write_string_payload(target.version.to_string(), data, data_size)
        }
        RequestCode::GetPluginInfo => {
            let name = read_name_or_sender(sender, data);
            let Some(info) = name.and_then(|n| mgr.info(&n)) else {
                return RouterCode::NotFound as u16;
            };
            if data.is_null() || data_size.is_null() {
                return RouterCode::DataSizeNull as u16;
            }
            let snapshot = Box::new(PluginInfoSnapshot {
                name: leak_cstring(&info.name),
                pretty_name: leak_cstring(&info.pretty_name),
                version: leak_cstring(&info.version.to_string()),
                author: leak_cstring(&info.author),
            });
            unsafe {
                *data = Box::into_raw(snapshot) as *mut c_void;
                *data_size = std::mem::size_of::<PluginInfoSnapshot>();
            }
            RouterCode::Success as u16
        }
        RequestCode::CheckPlugin => {
            let Some(name) = read_required_name(data) else {
                return RouterCode::DataSizeNull as u16;
            };
            if mgr.has(&name) {
                RouterCode::Success as u16
            } else {
                RouterCode::NotFound as u16
            }
        }
        RequestCode::CheckPluginLoaded => {
            let Some(name) = read_required_name(data) else {
                return RouterCode::DataSizeNull as u16;
            };
            if mgr.is_loaded(&name) {
                RouterCode::Success as u16
            } else {
                RouterCode::NotFound as u16
            }
        }
    }
}
