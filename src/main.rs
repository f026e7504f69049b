//! ShellVisor entry point - interactive CLI front-end
//!
//! Start-up order: configuration → diagnostics → container engine probe →
//! orphan sweep → REPL. Exit codes: 0 normal, 1 configuration error,
//! 2 container engine unreachable, 3 uncaught internal error.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use shellvisor::skills::{cli::run_skills_cli, SkillManager, SkillsConfig};
use shellvisor::{logging, Config, SandboxManager, SessionCoordinator, StopReason};

const BANNER: &str = "
╔══════════════════════════════════════════╗
║            ShellVisor v0.1.0             ║
║     Sandboxed Shell Agent Console        ║
╚══════════════════════════════════════════╝

Commands:
  /exit, /quit  - Exit
  /reset        - Reset session (new chat id, fresh container)
  /help         - Show this help

Type your message and press Enter.
";

#[tokio::main]
async fn main() {
    // A panic anywhere inside run() lands here as a JoinError → exit 3.
    let code = match tokio::spawn(run()).await {
        Ok(code) => code,
        Err(_) => {
            eprintln!("internal error, shutting down");
            3
        }
    };
    std::process::exit(code);
}

async fn run() -> i32 {
    logging::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("skills") {
        return run_skills_cli(&args[1..]);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return 1;
        }
    };

    if let Err(e) = SandboxManager::probe_engine().await {
        eprintln!("Container engine unreachable: {}", e);
        eprintln!("Is Docker running?");
        return 2;
    }

    let skills = match SkillsConfig::load(&SkillsConfig::default_path()) {
        Ok(skills_config) => {
            let mut manager = SkillManager::with_default_sources(skills_config);
            manager.discover();
            manager.prompt_entries()
        }
        Err(e) => {
            eprintln!("Warning: failed to load skills config: {}", e);
            Vec::new()
        }
    };

    let coordinator = Arc::new(SessionCoordinator::new(&config, &skills));
    let reaped = coordinator.reap_orphans().await;
    if reaped > 0 {
        eprintln!("Reaped {} orphaned container(s) from a previous run", reaped);
    }

    let code = repl(&coordinator).await;
    coordinator.shutdown().await;
    code
}

fn new_chat_id() -> String {
    let id = Uuid::now_v7().simple().to_string();
    format!("cli-{}", &id[..8])
}

async fn repl(coordinator: &Arc<SessionCoordinator>) -> i32 {
    use std::io::Write;

    println!("{}", BANNER);
    let mut chat_id = new_chat_id();
    println!("Session: {}\n", chat_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted, goodbye!");
                return 0;
            }
        };

        let input = match line {
            Ok(Some(line)) => line.trim().to_string(),
            // EOF or a broken stdin both end the session cleanly.
            Ok(None) | Err(_) => {
                println!("\nGoodbye!");
                return 0;
            }
        };

        if input.is_empty() {
            continue;
        }

        match input.as_str() {
            "/exit" | "/quit" | "exit" | "quit" => {
                println!("Goodbye!");
                return 0;
            }
            "/help" => {
                println!("{}", BANNER);
                continue;
            }
            "/reset" => {
                coordinator.reset(&chat_id).await;
                chat_id = new_chat_id();
                println!("\n✓ Session reset. New chat id: {}", chat_id);
                continue;
            }
            _ => {}
        }

        let result = coordinator.handle_message(&chat_id, &input).await;

        println!("\n{}", "─".repeat(40));
        println!("{}", result.response);
        println!("{}", "─".repeat(40));
        if result.stop_reason != StopReason::Completed {
            println!(
                "⚠ Stopped: {} (turns: {})",
                result.stop_reason, result.turns
            );
        }
    }
}
