fn main() {
    let abi = {{crate_name}}::generate_abi();
    let wasm = std::fs::metadata("{{wasm_path}}").map(|m| m.len()).unwrap_or(0);
    if let Err(err) = std::fs::write("{{abi_path}}", abi) {
        eprintln!("failed to write {{abi_path}}: {err}");
        std::process::exit(1);
    }
    println!("ABI for {{wasm_path}} ({wasm} bytes) written to {{abi_path}}");
}
