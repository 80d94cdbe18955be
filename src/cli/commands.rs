use anyhow::{anyhow, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::handlers::{HeartbeatRequest, RegisterNodeRequest};
use crate::models::NodeMetadataUpdate;
use crate::protocol::{MeshRequest, MeshResponse, MeshService, UpdateNodeRequest};

const HELP: &str = "\
Commands:
  register <node_id> <node_type> <location> <ip_address> [contact]
  heartbeat <node_id> <status> [message...]
  nodes
  node <node_id>
  history <node_id> [limit]
  update <node_id> <field>=<value>...   (node_type, location, contact, ip_address)
  deregister <node_id>
  sweep
  summary
  help
  exit";

const CONSOLE_ORIGIN: &str = "console";

pub enum ConsoleAction {
    Print(String),
    Exit,
}

pub async fn run_console(service: &MeshService) -> Result<()> {
    let mut rl = DefaultEditor::new().context("Failed to start line editor")?;
    println!("Welcome to the mesh-monitor console!");
    println!("Type 'help' for available commands, 'exit' to quit.");

    loop {
        match rl.readline("mesh> ") {
            Ok(line) => {
                let args: Vec<&str> = line.split_whitespace().collect();
                if args.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                match execute(service, &args).await {
                    Ok(ConsoleAction::Print(out)) => println!("{}", out),
                    Ok(ConsoleAction::Exit) => break,
                    Err(e) => println!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                println!("Error reading line: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}

/// Run one console command. Usage mistakes come back as errors; service
/// errors are rendered as output.
pub async fn execute(service: &MeshService, args: &[&str]) -> Result<ConsoleAction> {
    let request = match args {
        [] => return Ok(ConsoleAction::Print(String::new())),
        ["exit" | "quit", ..] => return Ok(ConsoleAction::Exit),
        ["help", ..] => return Ok(ConsoleAction::Print(HELP.to_string())),
        ["register", node_id, node_type, location, ip_address, rest @ ..] => MeshRequest::Register {
            request: RegisterNodeRequest {
                node_id: node_id.to_string(),
                node_type: node_type.to_string(),
                location: location.to_string(),
                ip_address: ip_address.to_string(),
                contact: rest.first().map(|c| c.to_string()),
                details: None,
            },
            origin: CONSOLE_ORIGIN.to_string(),
        },
        ["register", ..] => return Err(usage("register <node_id> <node_type> <location> <ip_address> [contact]")),
        ["heartbeat", node_id, status, message @ ..] => MeshRequest::Heartbeat(HeartbeatRequest {
            node_id: node_id.to_string(),
            status: Some(status.to_string()),
            message: (!message.is_empty()).then(|| message.join(" ")),
            ..Default::default()
        }),
        ["heartbeat", ..] => return Err(usage("heartbeat <node_id> <status> [message...]")),
        ["nodes", ..] => MeshRequest::ListNodes,
        ["node", node_id, ..] => MeshRequest::NodeDetail { node_id: node_id.to_string() },
        ["node"] => return Err(usage("node <node_id>")),
        ["history", node_id, rest @ ..] => {
            let limit = rest
                .first()
                .map(|l| l.parse::<usize>())
                .transpose()
                .with_context(|| format!("Invalid limit '{}'", rest.first().unwrap_or(&"")))?;
            MeshRequest::History {
                node_id: node_id.to_string(),
                limit,
            }
        }
        ["history"] => return Err(usage("history <node_id> [limit]")),
        ["update", node_id, fields @ ..] if !fields.is_empty() => MeshRequest::UpdateNode(UpdateNodeRequest {
            node_id: node_id.to_string(),
            update: parse_update(fields)?,
        }),
        ["update", ..] => return Err(usage("update <node_id> <field>=<value>...")),
        ["deregister", node_id, ..] => MeshRequest::Deregister { node_id: node_id.to_string() },
        ["deregister"] => return Err(usage("deregister <node_id>")),
        ["sweep", ..] => MeshRequest::Sweep,
        ["summary", ..] => MeshRequest::FleetSummary,
        [other, ..] => return Err(anyhow!("Unknown command '{}'. Type 'help' for commands.", other)),
    };

    let response = service.handle_request(request).await;
    Ok(ConsoleAction::Print(render(&response)))
}

fn usage(text: &str) -> anyhow::Error {
    anyhow!("Usage: {}", text)
}

fn parse_update(fields: &[&str]) -> Result<NodeMetadataUpdate> {
    let mut update = NodeMetadataUpdate::default();
    for field in fields {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected <field>=<value>, got '{}'", field))?;
        let value = Some(value.to_string());
        match key {
            "node_type" => update.node_type = value,
            "location" => update.location = value,
            "contact" => update.contact = value,
            "ip_address" => update.ip_address = value,
            other => return Err(anyhow!("Unknown field '{}'", other)),
        }
    }
    Ok(update)
}

pub fn render(response: &MeshResponse) -> String {
    match response {
        MeshResponse::Registered { node } => format!("Registered node {} ({})", node.node_id, node.node_type),
        MeshResponse::HeartbeatAccepted { node, event } => match event {
            Some(event) => format!("Heartbeat accepted for {}; logged: {}", node.node_id, event.details),
            None => format!("Heartbeat accepted for {}", node.node_id),
        },
        MeshResponse::Nodes { nodes } if nodes.is_empty() => "No nodes registered.".to_string(),
        MeshResponse::Nodes { nodes } => {
            let mut out = format!(
                "{:<16} {:<12} {:<16} {:<16} {:<12} {:<8} {}",
                "NODE", "TYPE", "LOCATION", "IP", "REPORTED", "LIVENESS", "LAST SEEN"
            );
            for n in nodes {
                out.push_str(&format!(
                    "\n{:<16} {:<12} {:<16} {:<16} {:<12} {:<8} {}",
                    n.node_id,
                    n.node_type,
                    n.location,
                    n.ip_address,
                    n.self_reported_status,
                    n.derived_status,
                    n.last_seen.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".into()),
                ));
            }
            out
        }
        MeshResponse::NodeDetail(detail) => {
            let node = &detail.node;
            let mut out = format!(
                "Node: {}\nType: {}\nLocation: {}\nIP: {}\nContact: {}\nRegistered: {}\nLast seen: {}\nReported status: {}\nLiveness: {}",
                node.node_id,
                node.node_type,
                node.location,
                node.ip_address,
                node.contact.as_deref().unwrap_or("-"),
                node.registration_date.to_rfc3339(),
                node.last_seen.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".into()),
                node.self_reported_status,
                detail.derived_status,
            );
            if !node.details.is_empty() {
                out.push_str(&format!("\nDetails: {}", serde_json::Value::Object(node.details.clone())));
            }
            out.push_str("\nRecent history:");
            out.push_str(&render_events(&detail.history));
            out
        }
        MeshResponse::History { events } if events.is_empty() => "No history.".to_string(),
        MeshResponse::History { events } => render_events(events).trim_start().to_string(),
        MeshResponse::Updated { node } => format!("Updated node {}", node.node_id),
        MeshResponse::Deregistered { node_id } => format!("Deregistered node {}", node_id),
        MeshResponse::FleetSummary(s) => format!(
            "Total: {}  online: {}  stale: {}  offline: {}",
            s.total, s.online, s.stale, s.offline
        ),
        MeshResponse::Swept(r) => format!(
            "Sweep: {} scanned, {} transitions, {} failures",
            r.scanned, r.transitions, r.failures
        ),
        MeshResponse::Error { message, .. } => format!("Error: {}", message),
    }
}

fn render_events(events: &[crate::models::HistoryEvent]) -> String {
    events
        .iter()
        .map(|e| format!("\n  {}  {:<16} {}", e.timestamp.to_rfc3339(), e.event_type, e.details))
        .collect()
}
