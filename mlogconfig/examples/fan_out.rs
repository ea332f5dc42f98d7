use std::path::PathBuf;

use mlogconfig::{Severity, logger_config};

fn main() {
    let dir = PathBuf::from("/tmp/mlogconfig_example_fan_out");
    let _ = std::fs::remove_dir_all(&dir);

    let ctx = logger_config(dir.join("run.log"))
        .with_error_log(dir.join("run.err"))
        .with_console(true)
        .with_syslog(true)
        .with_level(Severity::Debug)
        .setup()
        .expect("Unable to set up logging");
    ctx.install_global().expect("Logger already installed");

    log::debug!("Starting up");
    for i in 0..5 {
        log::info!("Processing item {i}");
    }
    log::warn!("Item 3 was slow");
    log::error!("Item 4 failed");
    ctx.critical("Giving up");

    drop(ctx);

    println!("\n--- Fan-out Summary ---");
    for name in ["run.log", "run.err"] {
        let content = std::fs::read_to_string(dir.join(name)).unwrap();
        println!("{name}: {} lines", content.lines().count());
    }
}
