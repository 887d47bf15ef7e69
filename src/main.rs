use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use query_dispatcher::{Grammar, HeuristicParser, QueryCompiler, QueryConfig};

const CONFIG_FILE: &str = "query_config.json";

/// 加载词汇表配置，优先使用JSON配置文件，失败时使用默认配置
fn load_config() -> QueryConfig {
    match QueryConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            println!("✅ 成功从 {CONFIG_FILE} 加载词汇表配置");
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({e}), 使用默认配置");
            QueryConfig::default()
        }
    }
}

fn current_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "user".to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("--- Query Dispatcher: 自然语言到工单查询编译器 ---");

    let config = load_config();
    let compiler = QueryCompiler::new(Grammar::new(&config), HeuristicParser::new());
    let user = current_user();

    let query = std::env::args().nth(1).unwrap_or_else(|| "interactive".to_string());
    if query == "interactive" {
        // 交互模式，输入 stop 退出
        let mut editor = DefaultEditor::new()?;
        loop {
            match editor.readline("Enter Query: ") {
                Ok(line) => {
                    let line = line.trim().to_lowercase();
                    if line == "stop" {
                        break;
                    }
                    if line.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(&line)?;
                    println!("{}", compiler.compile(&line, &user));
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
    } else {
        println!("{}", compiler.compile(&query.to_lowercase(), &user));
    }

    Ok(())
}
