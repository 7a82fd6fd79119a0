use perm_bridge::bridge::Bridge;
use perm_bridge::cli::{Command, CommandExecutor, CommandResult, Console};
use perm_bridge::config::{BridgeConfig, CONFIG_FILE};
use perm_bridge::logging;
use perm_bridge::sender::Sender;
use perm_bridge::verbose::process_verbose_events;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = BridgeConfig::load_or_bootstrap(&config_path)?;

    // Keep the guard alive so the file appender flushes on exit
    let _log_guard = logging::init_logging(&config.logging, config.debug)?;

    tracing::info!(config = %config_path, "=== Permission Bridge Starting ===");

    let (bridge, events) = Bridge::from_config(config)?;
    let verbose_task = tokio::spawn(process_verbose_events(events));
    let housekeeping = bridge.start_housekeeping();

    let console = Console::new();
    let executor = CommandExecutor::new(&bridge);
    let operator = Sender::Console;

    console.print_banner();

    loop {
        let line = match console.read_input()? {
            Some(line) => line,
            None => break,
        };
        if line.is_empty() {
            continue;
        }

        let (sender, command) = match Command::parse_invocation(&line, &operator) {
            Ok(parsed) => parsed,
            Err(e) => {
                console.print_error(&e.to_string());
                continue;
            }
        };

        match executor.execute(&sender, command).await {
            Ok(CommandResult::Success(lines)) => {
                for line in lines {
                    console.print_reply(&line);
                }
            }
            Ok(CommandResult::Checked { target, node, value }) => {
                console.print_check(&target, &node, value);
            }
            Ok(CommandResult::PermissionDenied { sender, node }) => {
                console.print_denied(&sender, &node);
            }
            Ok(CommandResult::Exit) => break,
            Err(e) => {
                tracing::error!(error = %e, "Command failed");
                console.print_error(&e.to_string());
            }
        }
    }

    housekeeping.shutdown();
    verbose_task.abort();

    tracing::info!("=== Permission Bridge Shutting Down ===");

    Ok(())
}
