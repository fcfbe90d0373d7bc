// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! csv-insight CLI entrypoint.
//!
//! By default this serves MCP over streamable HTTP at `http://<host>:<port>/mcp`.
//!
//! Use `--stdio` to run the MCP server over stdio instead, or `call <tool> <json>` to run a
//! single tool and print its JSON result.

use std::error::Error;

use csv_insight::config::Config;
use csv_insight::dispatch::{Dispatcher, JsonObject, TOOLS};
use csv_insight::mcp::InsightMcp;

const DEFAULT_HOST: &str = "127.0.0.1";

/// One line per tool: name and summary.
fn tool_list() -> String {
    TOOLS
        .iter()
        .map(|tool| format!("  {:<14} {}", tool.name, tool.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--host <addr>] [--port <port>]\n  {program} --stdio\n  {program} call <tool> [<json-args>]\n\nHTTP mode (default) serves MCP at `http://<host>:<port>/mcp` and a health probe at `/health`.\n--port overrides the PORT environment variable (0 = ephemeral; default 3000).\n--host selects the bind address (default {DEFAULT_HOST}).\n\n--stdio serves MCP over stdin/stdout.\n\n`call` runs one tool with a JSON object of arguments and prints the JSON result.\n\nTools:\n{}\n\nConfiguration is read from the environment and an optional `.env` file; GEMINI_API_KEY is required.",
        tool_list()
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Serve { host: Option<String>, port: Option<u16> },
    Stdio,
    Call { tool: String, args: String },
}

impl Default for Command {
    fn default() -> Self {
        Self::Serve { host: None, port: None }
    }
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Command, ()> {
    let mut host = None;
    let mut port = None;
    let mut stdio = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdio" => {
                if stdio {
                    return Err(());
                }
                stdio = true;
            }
            "--host" => {
                if host.is_some() {
                    return Err(());
                }
                host = Some(args.next().ok_or(())?);
            }
            "--port" => {
                if port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                port = Some(raw.parse::<u16>().map_err(|_| ())?);
            }
            "call" if !stdio && host.is_none() && port.is_none() => {
                let tool = args.next().ok_or(())?;
                let call_args = args.next().unwrap_or_else(|| "{}".to_owned());
                if args.next().is_some() {
                    return Err(());
                }
                return Ok(Command::Call { tool, args: call_args });
            }
            _ => return Err(()),
        }
    }

    if stdio {
        if host.is_some() || port.is_some() {
            return Err(());
        }
        return Ok(Command::Stdio);
    }

    Ok(Command::Serve { host, port })
}

fn parse_call_args(raw: &str) -> Result<JsonObject, Box<dyn Error>> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err("tool arguments must be a JSON object".into()),
    }
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "csv-insight".to_owned());

        let command = match parse_options(args) {
            Ok(command) => command,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        csv_insight::telemetry::init();
        let config = Config::from_env()?;
        let dispatcher = Dispatcher::from_config(&config);
        if config.storage.is_none() {
            tracing::info!("SUPABASE_URL/SUPABASE_KEY not set; chart uploads are disabled");
        }

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        match command {
            Command::Stdio => {
                runtime.block_on(InsightMcp::new(dispatcher).serve_stdio())?;
            }
            Command::Call { tool, args } => {
                let args = parse_call_args(&args)?;
                let value = runtime
                    .block_on(dispatcher.dispatch_named(&tool, args))
                    .map_err(|err| format!("{} ({})", err, err.kind()))?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Command::Serve { host, port } => {
                let host = host.unwrap_or_else(|| DEFAULT_HOST.to_owned());
                let port = port.unwrap_or(config.port);
                let mcp = InsightMcp::new(dispatcher);
                let keep_alive = config.session_keep_alive;

                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
                    csv_insight::http::serve(listener, mcp, keep_alive, async {
                        let _ = tokio::signal::ctrl_c().await;
                    })
                    .await?;
                    Ok::<(), Box<dyn Error>>(())
                })?;
            }
        }

        Ok(())
    })();

    if let Err(err) = result {
        eprintln!("csv-insight: {err}");
        std::process::exit(1);
    }
}
