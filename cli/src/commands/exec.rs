use burrow_core::burrow::ExecRequest;
use burrow_exec::{ExecClient, CONTROL_PORT_FIRST};
use clap::Args;
use std::collections::HashMap;

#[derive(Args)]
pub struct ExecCommand {
    /// Control-plane port of the exec service
    #[arg(long, default_value_t = CONTROL_PORT_FIRST)]
    exec_port: u16,

    /// Wall-clock bound in milliseconds (0 means no bound)
    #[arg(long, default_value_t = 0)]
    timeout_ms: u64,

    /// Working directory for the command
    #[arg(long)]
    dir: Option<String>,

    /// KEY=VAL pairs layered onto the inherited environment
    #[arg(long, short)]
    env: Vec<String>,

    /// Command and arguments to execute
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

pub async fn handle_exec_command(
    host: &str,
    cmd: ExecCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ExecClient::connect(format!("http://{}:{}", host, cmd.exec_port)).await?;

    let env: HashMap<String, String> = cmd
        .env
        .iter()
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let request = ExecRequest {
        uid: format!("cli-{}", std::process::id()),
        timeout_ms: cmd.timeout_ms,
        cmd: cmd.command[0].clone(),
        env,
        dir: cmd.dir.unwrap_or_default(),
        args: cmd.command[1..].to_vec(),
    };

    let reply = client.call(request).await?;
    println!("uid: {}  pid: {}", reply.uid, reply.pid);

    Ok(())
}
