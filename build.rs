use std::process::Command;

/// Set environment varibles for build.rs
/// set_env!(NAME=xfy);
macro_rules! set_env {
    ($($tokens: tt)*) => {
        println!("cargo:rustc-env={}", format!($($tokens)*))
    };
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    rustc_info();
}

/// rustc 版本写入 RUA_COMPILER，启动日志中输出
fn rustc_info() {
    let compiler = Command::new("rustc")
        .args(["-vV"])
        .output()
        .ok()
        .and_then(|output| {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .find(|line| !line.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "rustc unknown".to_string());

    set_env!("RUA_COMPILER={}", compiler);
}
