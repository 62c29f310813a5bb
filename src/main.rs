//! ProjectWise 终端前端
//!
//! 简单 REPL：连接工具服务器、展示可用工具，随后逐行处理查询；
//! 只消费 agent::ProjectWiseAgent 的公开入口。

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use projectwise::llm::OpenAiChatClient;
use projectwise::memory::{FileMemoryStore, InMemoryStore, MemoryStore};
use projectwise::tools::RemoteToolServer;
use projectwise::{load_config, ProjectWiseAgent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    projectwise::observability::init();
    let cfg = load_config(None)?;

    let llm = Arc::new(OpenAiChatClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        None,
    ));
    let server = Arc::new(RemoteToolServer::new(
        &cfg.tools.server_url,
        cfg.tools.tool_timeout_secs,
    ));
    let store: Arc<dyn MemoryStore> = match &cfg.memory.path {
        Some(path) if cfg.memory.enabled => Arc::new(FileMemoryStore::new(path)),
        _ => Arc::new(InMemoryStore::new()),
    };

    let agent = ProjectWiseAgent::new(llm, server, store, &cfg);

    println!("╔═ {} Terminal ═══════════════════════════╗", cfg.app.name);
    println!("║ 输入 exit / quit 退出                         ║");
    println!("╚═══════════════════════════════════════════════╝");

    let tools = agent.tool_names().await;
    if tools.is_empty() {
        println!("（未能获取工具清单，工具服务器可能未启动）");
    } else {
        println!("可用工具: {}", tools.join(", "));
    }

    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let started = Instant::now();
        let answer = agent
            .process_query(query, &cfg.app.default_user, cfg.pipeline.max_turns)
            .await;
        println!(
            "\n{} [{:.2}s] > {}",
            cfg.app.name,
            started.elapsed().as_secs_f64(),
            answer
        );
    }

    println!("\n会话结束。");
    Ok(())
}
