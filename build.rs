fn main(){
    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();

    let mut config = cbindgen::Config::default();
    config.language = cbindgen::Language::C;
    config.include_guard = Some("BIBI_HELM_H".to_string());

    //header generation is best effort, a failed parse must not break the build
    match cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) =>{
            bindings.write_to_file("include/bibi_helm.h");
        }
        Err(e) =>{
            println!("cargo:warning=Unable to generate bindings: {}", e);
        }
    }

    println!("cargo:rerun-if-changed=src/ffi/mod.rs");
}
