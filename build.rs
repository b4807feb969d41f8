// Build script for MenuBar
// Links the Windows libraries the shell integration talks to

fn main() {
    // Only run on Windows
    #[cfg(target_os = "windows")]
    {
        println!("cargo:rustc-link-lib=user32");
        println!("cargo:rustc-link-lib=shell32");
        println!("cargo:rustc-link-lib=advapi32");
    }

    println!("cargo:rerun-if-changed=build.rs");
}
