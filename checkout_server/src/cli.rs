use std::{env, env::VarError};

const README: &str = include_str!("./cli-help.txt");

/// Variables that are safe to echo. Secrets are left out on purpose.
const DISPLAY_ENVS: [&str; 10] = [
    "RUST_LOG",
    "CPG_HOST",
    "CPG_PORT",
    "CPG_DATABASE_URL",
    "CPG_GATEWAY_TIMEOUT_MS",
    "CPG_SUBSCRIBER_BUFFER",
    "CPG_EVENT_BUFFER",
    "CPG_POLL_INTERVAL_MS",
    "CPG_ADD_ON_UNIT_PRICE",
    "CPG_WEBHOOK_HMAC_CHECKS",
];

/// The server takes no arguments. Any argument prints the help text and the current configuration, and returns
/// `true` so that `main` can exit without starting the server.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        println!("\n{README}\n");
        println!("Current environment values (EXCLUDING variables that contain secrets):");
        DISPLAY_ENVS.iter().for_each(|&name| println!("  {name:<35} {:<15}", env_value(name)));
    }
    has_cli_args
}

fn env_value(name: &str) -> String {
    match env::var(name) {
        Ok(s) => s,
        Err(VarError::NotPresent) => "Not set".into(),
        Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
    }
}
