//! {{name}} contract.

#[cfg(target_arch = "wasm32")]
mod host {
    #[link(wasm_import_module = "env")]
    extern "C" {
        pub fn prints_l(msg: *const u8, len: u32);
    }

    pub fn log(msg: &str) {
        unsafe { prints_l(msg.as_ptr(), msg.len() as u32) }
    }
}

#[cfg(target_arch = "wasm32")]
#[no_mangle]
pub extern "C" fn apply(_receiver: u64, _first_receiver: u64, _action: u64) {
    host::log("hello from {{name}}");
}

#[cfg(feature = "abi")]
pub fn generate_abi() -> String {
    String::from(
        r#"{
    "version": "cgate::abi/1.0",
    "contract": "{{name}}",
    "actions": [
        { "name": "apply", "params": ["u64", "u64", "u64"] }
    ]
}"#,
    )
}
