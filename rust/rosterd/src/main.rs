use anyhow::Context;
use rosterd::{ipc, Config, Store};
use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing::{error, info};

fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("rosterd: configuration error: {e}");
            std::process::exit(1);
        }
    };
    config.logging.init();

    if let Err(e) = run(&config) {
        error!(error = ?e, "fatal");
        eprintln!("rosterd: {e:#}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let store = Store::open(config).context("failed to open the student database")?;
    let mut state = ipc::AppState::new(store);
    info!(version = env!("CARGO_PKG_VERSION"), "rosterd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let resp = json!({
                    "id": null,
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    // Dropping the state closes the pool.
    drop(state);
    info!("rosterd stopped");
    Ok(())
}
