use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "RPS_HOST",
        "RPS_PORT",
        "RPS_DATABASE_URL",
        "RPS_DB_MAX_CONNECTIONS",
        "RPS_WEBHOOK_HMAC_CHECKS",
        "RPS_WEBHOOK_SIGNATURE_HEADER",
        "RPS_WEBHOOK_IP_WHITELIST",
        "RPS_USE_X_FORWARDED_FOR",
        "RPS_USE_FORWARDED",
        "RPS_GATEWAY",
        "RPS_DEFAULT_CURRENCY",
        "RPS_AMOUNT_UNIT_POLICY",
        "RPS_MINOR_UNIT_THRESHOLD",
        "RPS_LEDGER_TIMEOUT_MS",
        "RPS_AUDIT_TIMEOUT_MS",
        "RPS_EVENT_BUFFER_SIZE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
