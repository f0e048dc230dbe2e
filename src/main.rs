//! Ponder - 命令行入口
//!
//! 用法：`ponder [--config <file>] "<question>"`。初始化日志、加载并校验配置、组装 Orchestrator，
//! 在一个新会话中回答问题并打印结果。

use std::path::PathBuf;

use anyhow::{bail, Context};
use ponder::agent::create_orchestrator_from_config;
use ponder::config::load_config;
use ponder::{Answer, ConversationId};

fn parse_args() -> anyhow::Result<(Option<PathBuf>, String)> {
    let mut config_path = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config needs a file path")?;
            config_path = Some(PathBuf::from(path));
        } else {
            words.push(arg);
        }
    }
    let question = words.join(" ");
    if question.trim().is_empty() {
        bail!("usage: ponder [--config <file>] \"<question>\"");
    }
    Ok((config_path, question))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ponder::observability::init();

    let (config_path, question) = parse_args()?;
    let cfg = load_config(config_path).context("Failed to load config")?;
    let orchestrator = create_orchestrator_from_config(&cfg).context("Invalid configuration")?;

    let id = ConversationId::new();
    let run = orchestrator.run(&id, &question);
    let answer = tokio::select! {
        r = run => r.context("Run failed")?,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.shutdown();
            bail!("interrupted");
        }
    };

    match answer {
        Answer::Final(text) => println!("{text}"),
        Answer::Clarification(text) => println!("Need more information: {text}"),
    }
    Ok(())
}
