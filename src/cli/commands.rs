//! Operator commands
//!
//! Every command is itself gated by a `bridge.command.<name>` node, checked
//! for the sender issuing it. The console passes every gate; `as <sender>`
//! runs a command as someone else.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::bridge::Bridge;
use crate::core::{BridgeError, BridgeResult, Tristate};
use crate::engine::{ContextSet, Node};
use crate::sender::{user_id_from_uuid, Sender};

/// Prefix of the nodes gating operator commands
pub const COMMAND_NODE_PREFIX: &str = "bridge.command.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyAction {
    On,
    Off,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustAction {
    Add(i64),
    Remove(i64),
    List,
}

/// A parsed operator command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Check { target: Sender, node: String },
    Has { target: Sender, node: String },
    Emergency(EmergencyAction),
    Trust(TrustAction),
    Set {
        id: i64,
        node: String,
        value: bool,
        contexts: ContextSet,
        expiry_secs: Option<i64>,
    },
    Unset { id: i64, node: String, contexts: ContextSet },
    Info { id: i64 },
    Invalidate { id: Option<i64> },
    Context { id: i64, contexts: ContextSet },
    Verbose(bool),
    Nodes { prefix: Option<String> },
    Help,
    Exit,
}

/// Outcome of running a command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Lines to show the operator
    Success(Vec<String>),
    /// The outcome of a `check`
    Checked { target: Sender, node: String, value: Tristate },
    /// The issuing sender may not run this command
    PermissionDenied { sender: Sender, node: String },
    /// Stop the console
    Exit,
}

const HELP: &[&str] = &[
    "check <console|id> <node>            resolve a node to true/false/undefined",
    "has <console|id> <node>              boolean gate, honours the trust list",
    "emergency on|off|status              global deny switch for non-console senders",
    "trust add|remove <id> | trust list   manage the trust list",
    "set <id> <node> <true|false> [k=v..] store a node",
    "settemp <id> <node> <true|false> <secs> [k=v..]  store a temporary node",
    "unset <id> <node> [k=v..]            remove a stored node",
    "info <id>                            show a user's stored nodes",
    "invalidate [id]                      drop cached data for one user or everyone",
    "context <id> [k=v..]                 set extra contexts for a user",
    "verbose on|off                       toggle verbose recording",
    "nodes [prefix]                       list known nodes",
    "as <console|id> <command..>          run a command as another sender",
    "exit                                 stop the console",
];

fn parse_sender(token: Option<&str>) -> BridgeResult<Sender> {
    let token = token.ok_or_else(|| BridgeError::invalid_command("missing sender"))?;
    Sender::parse(token)
        .ok_or_else(|| BridgeError::invalid_command(format!("not a sender: {}", token)))
}

fn parse_id(token: Option<&str>) -> BridgeResult<i64> {
    let token = token.ok_or_else(|| BridgeError::invalid_command("missing user id"))?;
    token
        .parse()
        .map_err(|_| BridgeError::invalid_command(format!("not a user id: {}", token)))
}

fn parse_node(token: Option<&str>) -> BridgeResult<String> {
    token
        .map(str::to_string)
        .ok_or_else(|| BridgeError::invalid_command("missing permission node"))
}

fn parse_bool(token: Option<&str>) -> BridgeResult<bool> {
    match token {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(BridgeError::invalid_command(format!(
            "expected true or false, got {}",
            other
        ))),
        None => Err(BridgeError::invalid_command("missing value")),
    }
}

fn parse_contexts<'a>(tokens: impl Iterator<Item = &'a str>) -> BridgeResult<ContextSet> {
    ContextSet::parse_pairs(tokens)
        .ok_or_else(|| BridgeError::invalid_command("contexts must be key=value pairs"))
}

/// Absolute expiry `secs` seconds from now
fn expiry_after(secs: i64) -> BridgeResult<DateTime<Utc>> {
    ChronoDuration::try_seconds(secs)
        .and_then(|duration| Utc::now().checked_add_signed(duration))
        .ok_or_else(|| BridgeError::invalid_command(format!("duration out of range: {}s", secs)))
}

fn parse_toggle(token: Option<&str>) -> BridgeResult<bool> {
    match token {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(BridgeError::invalid_command("expected on or off")),
    }
}

impl Command {
    /// Parse a command line (without any `as` prefix)
    pub fn parse(line: &str) -> BridgeResult<Self> {
        let mut tokens = line.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| BridgeError::invalid_command("empty command"))?;

        let command = match name {
            "check" => Command::Check {
                target: parse_sender(tokens.next())?,
                node: parse_node(tokens.next())?,
            },
            "has" => Command::Has {
                target: parse_sender(tokens.next())?,
                node: parse_node(tokens.next())?,
            },
            "emergency" => Command::Emergency(match tokens.next() {
                Some("on") => EmergencyAction::On,
                Some("off") => EmergencyAction::Off,
                Some("status") | None => EmergencyAction::Status,
                Some(other) => {
                    return Err(BridgeError::invalid_command(format!(
                        "unknown emergency action: {}",
                        other
                    )))
                }
            }),
            "trust" => Command::Trust(match tokens.next() {
                Some("add") => TrustAction::Add(parse_id(tokens.next())?),
                Some("remove") => TrustAction::Remove(parse_id(tokens.next())?),
                Some("list") | None => TrustAction::List,
                Some(other) => {
                    return Err(BridgeError::invalid_command(format!(
                        "unknown trust action: {}",
                        other
                    )))
                }
            }),
            "set" => Command::Set {
                id: parse_id(tokens.next())?,
                node: parse_node(tokens.next())?,
                value: parse_bool(tokens.next())?,
                contexts: parse_contexts(&mut tokens)?,
                expiry_secs: None,
            },
            "settemp" => {
                let id = parse_id(tokens.next())?;
                let node = parse_node(tokens.next())?;
                let value = parse_bool(tokens.next())?;
                let secs = tokens
                    .next()
                    .and_then(|t| t.parse::<i64>().ok())
                    .filter(|secs| *secs > 0 && ChronoDuration::try_seconds(*secs).is_some())
                    .ok_or_else(|| {
                        BridgeError::invalid_command("expected a positive duration in seconds")
                    })?;
                Command::Set {
                    id,
                    node,
                    value,
                    contexts: parse_contexts(&mut tokens)?,
                    expiry_secs: Some(secs),
                }
            }
            "unset" => Command::Unset {
                id: parse_id(tokens.next())?,
                node: parse_node(tokens.next())?,
                contexts: parse_contexts(&mut tokens)?,
            },
            "info" => Command::Info {
                id: parse_id(tokens.next())?,
            },
            "invalidate" => Command::Invalidate {
                id: match tokens.next() {
                    Some(token) => Some(parse_id(Some(token))?),
                    None => None,
                },
            },
            "context" => Command::Context {
                id: parse_id(tokens.next())?,
                contexts: parse_contexts(&mut tokens)?,
            },
            "verbose" => Command::Verbose(parse_toggle(tokens.next())?),
            "nodes" => Command::Nodes {
                prefix: tokens.next().map(str::to_string),
            },
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => {
                return Err(BridgeError::invalid_command(format!("unknown command: {}", other)))
            }
        };

        Ok(command)
    }

    /// Parse a line, honouring an `as <sender>` prefix
    ///
    /// Returns the sender to run as (`default` when no prefix is given).
    pub fn parse_invocation(line: &str, default: &Sender) -> BridgeResult<(Sender, Self)> {
        let trimmed = line.trim();
        match trimmed.strip_prefix("as ") {
            Some(rest) => {
                let rest = rest.trim_start();
                let (sender, command) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| BridgeError::invalid_command("as <sender> <command>"))?;
                Ok((parse_sender(Some(sender))?, Self::parse(command)?))
            }
            None => Ok((default.clone(), Self::parse(trimmed)?)),
        }
    }

    /// Node gating this command
    pub fn permission(&self) -> Option<String> {
        let name = match self {
            Command::Check { .. } | Command::Has { .. } => "check",
            Command::Emergency(EmergencyAction::Status) => "emergency.status",
            Command::Emergency(_) => "emergency",
            Command::Trust(_) => "trust",
            Command::Set { .. } | Command::Unset { .. } => "edit",
            Command::Info { .. } | Command::Nodes { .. } => "info",
            Command::Invalidate { .. } => "invalidate",
            Command::Context { .. } => "context",
            Command::Verbose(_) => "verbose",
            Command::Help | Command::Exit => return None,
        };
        Some(format!("{}{}", COMMAND_NODE_PREFIX, name))
    }
}

/// Runs commands against a bridge
pub struct CommandExecutor<'a> {
    bridge: &'a Bridge,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(bridge: &'a Bridge) -> Self {
        Self { bridge }
    }

    /// Run `command` on behalf of `sender`
    pub async fn execute(&self, sender: &Sender, command: Command) -> BridgeResult<CommandResult> {
        let resolver = self.bridge.resolver();

        if let Some(node) = command.permission() {
            if !resolver.has_permission(sender, &node).await {
                return Ok(CommandResult::PermissionDenied {
                    sender: sender.clone(),
                    node,
                });
            }
        }

        let result = match command {
            Command::Check { target, node } => {
                let value = resolver.permission_value(&target, &node).await;
                CommandResult::Checked { target, node, value }
            }
            Command::Has { target, node } => {
                let allowed = resolver.has_permission(&target, &node).await;
                let verdict = if allowed { "allowed" } else { "denied" };
                CommandResult::Success(vec![format!(
                    "{} {} => {}",
                    target.display_name(),
                    node,
                    verdict
                )])
            }
            Command::Emergency(action) => self.emergency(action),
            Command::Trust(action) => self.trust(action),
            Command::Set {
                id,
                node,
                value,
                contexts,
                expiry_secs,
            } => {
                let mut entry = Node::new(&node, value).with_contexts(contexts);
                if let Some(secs) = expiry_secs {
                    entry = entry.with_expiry(expiry_after(secs)?);
                }
                let user = resolver.users().get_or_make(Sender::user(id).unique_id());
                user.set_node(entry).await?;
                CommandResult::Success(vec![format!("Set {} = {} for {}", node, value, id)])
            }
            Command::Unset { id, node, contexts } => {
                let user = resolver.users().get_or_make(Sender::user(id).unique_id());
                let removed = user.unset_node(&node, &contexts).await?;
                let line = if removed {
                    format!("Unset {} for {}", node, id)
                } else {
                    format!("{} had no {} {}", id, node, contexts)
                };
                CommandResult::Success(vec![line])
            }
            Command::Invalidate { id: Some(id) } => {
                resolver.users().invalidate(&Sender::user(id).unique_id());
                CommandResult::Success(vec![format!("Invalidated cached data for {}", id)])
            }
            Command::Invalidate { id: None } => {
                resolver.users().invalidate_all();
                CommandResult::Success(vec!["Invalidated cached data for all users".to_string()])
            }
            Command::Info { id } => {
                let user = resolver.users().get_or_make(Sender::user(id).unique_id());
                let nodes = user.nodes().await?;
                let mut lines = vec![format!("{} ({}) has {} node(s)", id, user.uuid(), nodes.len())];
                for node in nodes.iter() {
                    let mut line = format!("  {} = {}", node.key, node.value);
                    if !node.contexts.is_empty() {
                        line.push_str(&format!(" {}", node.contexts));
                    }
                    if let Some(expiry) = node.expiry {
                        line.push_str(&format!(" (expires {})", expiry.to_rfc3339()));
                    }
                    lines.push(line);
                }
                CommandResult::Success(lines)
            }
            Command::Context { id, contexts } => {
                let uuid = Sender::user(id).unique_id();
                let line = format!("Contexts for {} now {}", id, contexts);
                self.bridge.contexts().set_contexts(uuid, contexts);
                CommandResult::Success(vec![line])
            }
            Command::Verbose(enabled) => {
                self.bridge.verbose().set_enabled(enabled);
                let state = if enabled { "on" } else { "off" };
                CommandResult::Success(vec![format!("Verbose recording {}", state)])
            }
            Command::Nodes { prefix } => {
                let registry = resolver.registry();
                let nodes = match prefix {
                    Some(prefix) => registry.complete(&prefix),
                    None => registry.nodes(),
                };
                let mut lines = vec![format!("{} known node(s)", nodes.len())];
                lines.extend(nodes.into_iter().map(|n| format!("  {}", n)));
                CommandResult::Success(lines)
            }
            Command::Help => CommandResult::Success(HELP.iter().map(|l| l.to_string()).collect()),
            Command::Exit => CommandResult::Exit,
        };

        Ok(result)
    }

    fn emergency(&self, action: EmergencyAction) -> CommandResult {
        let emergency = self.bridge.resolver().emergency();
        match action {
            EmergencyAction::On => {
                emergency.set_shutdown(true);
            }
            EmergencyAction::Off => {
                emergency.set_shutdown(false);
            }
            EmergencyAction::Status => {}
        }

        let state = if emergency.is_shutdown() {
            "active: non-console checks are denied"
        } else {
            "inactive"
        };
        CommandResult::Success(vec![format!("Emergency shutdown {}", state)])
    }

    fn trust(&self, action: TrustAction) -> CommandResult {
        let trust = self.bridge.resolver().trust();
        let line = match action {
            TrustAction::Add(id) => {
                if trust.add(Sender::user(id).unique_id()) {
                    format!("{} is now trusted", id)
                } else {
                    format!("{} was already trusted", id)
                }
            }
            TrustAction::Remove(id) => {
                if trust.remove(&Sender::user(id).unique_id()) {
                    format!("{} is no longer trusted", id)
                } else {
                    format!("{} was not trusted", id)
                }
            }
            TrustAction::List => {
                let ids: Vec<String> = trust
                    .list()
                    .iter()
                    .map(|uuid| match user_id_from_uuid(uuid) {
                        Some(id) => id.to_string(),
                        None => uuid.to_string(),
                    })
                    .collect();
                if ids.is_empty() {
                    "No trusted users".to_string()
                } else {
                    format!("Trusted: {}", ids.join(", "))
                }
            }
        };
        CommandResult::Success(vec![line])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::BridgeConfig;
    use crate::engine::{MemoryStore, PermissionStore};
    use crate::verbose::VerboseEvent;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn bridge() -> (Bridge, UnboundedReceiver<VerboseEvent>) {
        Bridge::with_store(BridgeConfig::new(), Arc::new(MemoryStore::new())).unwrap()
    }

    async fn run(bridge: &Bridge, sender: &Sender, line: &str) -> CommandResult {
        let (sender, command) = Command::parse_invocation(line, sender).unwrap();
        CommandExecutor::new(bridge).execute(&sender, command).await.unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("check 42 group.admin").unwrap(),
            Command::Check {
                target: Sender::user(42),
                node: "group.admin".to_string()
            }
        );
        assert_eq!(
            Command::parse("emergency on").unwrap(),
            Command::Emergency(EmergencyAction::On)
        );
        assert_eq!(
            Command::parse("trust add 7").unwrap(),
            Command::Trust(TrustAction::Add(7))
        );

        let set = Command::parse("set 1 chat.send true channel=general").unwrap();
        assert!(matches!(
            set,
            Command::Set { id: 1, value: true, ref contexts, expiry_secs: None, .. }
                if contexts.contains("channel", "general")
        ));

        let temp = Command::parse("settemp 1 vip true 60").unwrap();
        assert!(matches!(temp, Command::Set { expiry_secs: Some(60), .. }));

        assert!(Command::parse("").is_err());
        assert!(Command::parse("set 1 node maybe").is_err());
        assert!(Command::parse("settemp 1 vip true -5").is_err());
        assert!(Command::parse(&format!("settemp 1 vip true {}", i64::MAX)).is_err());
        assert_eq!(
            Command::parse("invalidate").unwrap(),
            Command::Invalidate { id: None }
        );
        assert_eq!(
            Command::parse("invalidate 4").unwrap(),
            Command::Invalidate { id: Some(4) }
        );
        assert!(Command::parse("invalidate someone").is_err());
        assert!(Command::parse("frobnicate").is_err());
    }

    #[test]
    fn test_parse_invocation_with_as_prefix() {
        let (sender, command) =
            Command::parse_invocation("as 55 emergency status", &Sender::Console).unwrap();
        assert_eq!(sender, Sender::user(55));
        assert_eq!(command, Command::Emergency(EmergencyAction::Status));

        let (sender, _) = Command::parse_invocation("help", &Sender::Console).unwrap();
        assert_eq!(sender, Sender::Console);
    }

    #[test]
    fn test_command_permissions() {
        assert_eq!(
            Command::Emergency(EmergencyAction::On).permission().as_deref(),
            Some("bridge.command.emergency")
        );
        assert_eq!(Command::Help.permission(), None);
    }

    #[tokio::test]
    async fn test_console_can_edit_and_check() {
        let (bridge, _events) = bridge();
        let console = Sender::Console;

        run(&bridge, &console, "set 42 group.admin true").await;
        let result = run(&bridge, &console, "check 42 group.admin").await;
        assert_eq!(
            result,
            CommandResult::Checked {
                target: Sender::user(42),
                node: "group.admin".to_string(),
                value: Tristate::True
            }
        );

        run(&bridge, &console, "unset 42 group.admin").await;
        let result = run(&bridge, &console, "check 42 group.admin").await;
        assert!(matches!(result, CommandResult::Checked { value: Tristate::Undefined, .. }));
    }

    #[tokio::test]
    async fn test_user_commands_are_gated() {
        let (bridge, _events) = bridge();
        let console = Sender::Console;

        let result = run(&bridge, &console, "as 9 emergency on").await;
        assert!(matches!(result, CommandResult::PermissionDenied { .. }));
        assert!(!bridge.resolver().emergency().is_shutdown());

        run(&bridge, &console, "set 9 bridge.command.* true").await;
        run(&bridge, &console, "as 9 emergency on").await;
        assert!(bridge.resolver().emergency().is_shutdown());

        // The shutdown now locks user 9 out of clearing it again
        let result = run(&bridge, &console, "as 9 emergency off").await;
        assert!(matches!(result, CommandResult::PermissionDenied { .. }));

        // Trusted users still get through
        run(&bridge, &console, "trust add 9").await;
        run(&bridge, &console, "as 9 emergency off").await;
        assert!(!bridge.resolver().emergency().is_shutdown());
    }

    #[tokio::test]
    async fn test_nodes_lists_checked_nodes() {
        let (bridge, _events) = bridge();
        let console = Sender::Console;

        run(&bridge, &console, "check 1 chat.send").await;
        let result = run(&bridge, &console, "nodes chat.").await;
        assert_eq!(
            result,
            CommandResult::Success(vec!["1 known node(s)".to_string(), "  chat.send".to_string()])
        );
    }

    #[tokio::test]
    async fn test_settemp_out_of_range_is_rejected() {
        let (bridge, _events) = bridge();
        let command = Command::parse("settemp 1 vip true 99999999999999").unwrap();

        let err = CommandExecutor::new(&bridge)
            .execute(&Sender::Console, command)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidCommand(_)));

        let user = bridge.resolver().users().get_or_make(Sender::user(1).unique_id());
        assert!(user.nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_picks_up_store_edits() {
        let store = Arc::new(MemoryStore::new());
        let (bridge, _events) = Bridge::with_store(BridgeConfig::new(), store.clone()).unwrap();
        let console = Sender::Console;
        let uuid = Sender::user(3).unique_id();

        assert!(matches!(
            run(&bridge, &console, "check 3 chat.send").await,
            CommandResult::Checked { value: Tristate::Undefined, .. }
        ));

        store.save_user(uuid, &[Node::new("chat.send", true)]).await.unwrap();
        assert!(matches!(
            run(&bridge, &console, "check 3 chat.send").await,
            CommandResult::Checked { value: Tristate::Undefined, .. }
        ));

        run(&bridge, &console, "invalidate 3").await;
        assert!(matches!(
            run(&bridge, &console, "check 3 chat.send").await,
            CommandResult::Checked { value: Tristate::True, .. }
        ));

        store.save_user(uuid, &[Node::new("chat.send", false)]).await.unwrap();
        run(&bridge, &console, "invalidate").await;
        assert!(matches!(
            run(&bridge, &console, "check 3 chat.send").await,
            CommandResult::Checked { value: Tristate::False, .. }
        ));
    }
}
