// Proxy entry point.
//
// Startup order matters for the exit-code contract: logging, auth, invite
// discovery and the listener bind all happen before the control server
// starts, and any failure among them exits with code 1. Once running, the
// process exits 0 on SIGINT/SIGTERM or when the controller closes stdin.
//
// Usage:
//   realmbridge [OPTIONS]
//     --listen ADDR    Bind address for the local listener (default :19132)
//     --invite CODE    Realm invite code (overrides REALM_INVITE / .realm-invite)

use std::sync::Arc;

use tokio::sync::watch;

use realmbridge_core::auth::{XboxTokenSource, TOKEN_FILE};
use realmbridge_core::config::{self, DEFAULT_LISTEN_ADDR};
use realmbridge_core::control::run_control_server;
use realmbridge_core::realms::RealmsClient;
use realmbridge_core::session::run_proxy;
use realmbridge_core::{logging, GameState};
use realmbridge_proto::ListenConfig;

struct Args {
    listen_addr: String,
    invite: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    if let Err(err) = logging::init() {
        eprintln!("failed to open log file: {err}");
        std::process::exit(1);
    }

    let tokens = match XboxTokenSource::bootstrap(TOKEN_FILE).await {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::error!("authentication failed: {err:#}");
            std::process::exit(1);
        }
    };
    let identity = match tokens.identity().await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::error!("could not resolve player identity: {err:#}");
            std::process::exit(1);
        }
    };

    let invite = match config::find_realm_invite(args.invite.as_deref()) {
        Ok(invite) => invite,
        Err(err) => {
            tracing::error!("realm invite error: {err}");
            std::process::exit(1);
        }
    };

    let listener = match (ListenConfig {
        server_name: "Realmbridge Proxy".to_string(),
        ..Default::default()
    })
    .listen(&args.listen_addr)
    .await
    {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to start listener: {err}");
            std::process::exit(1);
        }
    };

    let state = Arc::new(GameState::new());
    let realms = Arc::new(RealmsClient::new(tokens));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutting down...");
        let _ = shutdown_tx.send(true);
    });

    let proxy = tokio::spawn(run_proxy(
        listener,
        invite,
        realms,
        identity,
        Arc::clone(&state),
        shutdown_rx.clone(),
    ));

    if let Err(err) = run_control_server(state, shutdown_rx).await {
        tracing::error!("control server error: {err:#}");
        std::process::exit(1);
    }

    // Give the current session a moment to tear down before the process
    // exits.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), proxy).await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            tracing::error!("could not install SIGTERM handler: {err}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Parse command-line arguments. Simple `std::env::args()` matching, no
/// argument-parser dependency.
fn parse_args() -> Args {
    let mut args = Args {
        listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        invite: None,
    };
    let argv: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < argv.len() {
        match argv[i].as_str() {
            "--listen" => {
                i += 1;
                args.listen_addr = argv.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--listen requires an address");
                    std::process::exit(1);
                });
            }
            "--invite" => {
                i += 1;
                args.invite = Some(argv.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--invite requires a code");
                    std::process::exit(1);
                }));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    args
}

fn print_usage() {
    println!("Usage: realmbridge [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --listen ADDR    Bind address for the local listener (default {DEFAULT_LISTEN_ADDR})");
    println!("  --invite CODE    Realm invite code (overrides REALM_INVITE / .realm-invite)");
    println!("  --help, -h       Show this help");
}
