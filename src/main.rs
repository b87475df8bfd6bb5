//! Troupe 命令行入口
//!
//! 用法：
//!   troupe [--config <path>] search <task> [context]
//!   troupe [--config <path>] present <task> [context]
//!
//! 未设置 OPENAI_API_KEY 时使用 Mock LLM；联网搜索需要 TAVILY_API_KEY。

use std::path::PathBuf;

use anyhow::{bail, Context};
use troupe::{config::load_config, llm::create_llm_from_config, observability};
use troupe::{PresentationAgent, SearchAgent};

const USAGE: &str = "usage: troupe [--config <path>] <search|present> <task> [context]";

struct Cli {
    config: Option<PathBuf>,
    command: String,
    task: String,
    context: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Cli> {
    let mut config = None;
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => bail!(USAGE),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let (Some(command), Some(task)) = (positional.next(), positional.next()) else {
        bail!(USAGE);
    };
    Ok(Cli {
        config,
        command,
        task,
        context: positional.next(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = parse_args(std::env::args().skip(1))?;
    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    let llm = create_llm_from_config(&cfg);
    tracing::info!(app = %cfg.app.name, command = %cli.command, "starting");

    match cli.command.as_str() {
        "search" => {
            let agent = SearchAgent::new(llm, &cfg);
            let answer = agent
                .forward(&cli.task, cli.context.as_deref())
                .await
                .context("Search failed")?;
            println!("{answer}");
        }
        "present" => {
            let agent = PresentationAgent::new(llm, &cfg);
            let slides = agent
                .forward(&cli.task, cli.context.as_deref())
                .await
                .context("Presentation failed")?;
            println!("{}", serde_json::to_string_pretty(&slides)?);
        }
        other => bail!("unknown command `{other}`\n{USAGE}"),
    }

    Ok(())
}
