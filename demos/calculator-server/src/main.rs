//! A small MCP server exercising the whole surface: tools (including one
//! that streams progress), a resource, a resource template, and a prompt.
//!
//! Serves Streamable HTTP on 127.0.0.1:8000 by default; set
//! `MCP_TRANSPORT=stdio` (or `MCP_STDIO=1`) to run on stdin/stdout.

use serde_json::json;
use tessera_http_mcp_server::ServerConfig;
use tessera_mcp_protocol::{Parameter, ParamKind};
use tessera_mcp_server::{logging, McpServer, PromptHandler, ResourceHandler, ResourceTemplateHandler, ToolHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let add = ToolHandler::new("add")?
        .with_description("Add two integers")
        .with_param(Parameter::integer("a").with_description("first addend"))
        .with_param(Parameter::integer("b").with_description("second addend"))
        .with_tags(["math"])
        .with_function(|args, _ctx| async move {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        });

    let average = ToolHandler::new("average")?
        .with_description("Average a list of numbers")
        .with_param(Parameter::array("values", ParamKind::Number))
        .with_tags(["math"])
        .with_function(|args, _ctx| async move {
            let values: Vec<f64> = args["values"]
                .as_array()
                .map(|v| v.iter().filter_map(|n| n.as_f64()).collect())
                .unwrap_or_default();
            if values.is_empty() {
                return Ok(json!(0.0));
            }
            Ok(json!(values.iter().sum::<f64>() / values.len() as f64))
        });

    let count_up = ToolHandler::new("count_up")?
        .with_description("Count to n, streaming progress along the way")
        .with_param(Parameter::integer("n").with_default(json!(5)))
        .with_function(|args, ctx| async move {
            let n = args["n"].as_i64().unwrap_or(5).max(0);
            for i in 1..=n {
                // Best effort: progress only flows on bidirectional scopes.
                let _ = ctx.send_progress("count_up", i as f64, Some(n as f64)).await;
            }
            Ok(json!(n))
        });

    let motd = ResourceHandler::new("config://motd", "motd", || async {
        Ok(json!("All systems operational"))
    })
    .with_description("Message of the day")
    .with_mime_type("text/plain");

    let squares = ResourceTemplateHandler::new(
        "calc://squares/{n}",
        "squares",
        |bindings| async move {
            let n: i64 = bindings
                .get("n")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            Ok(json!(format!("{}", n * n)))
        },
    )?
    .with_description("The square of n")
    .with_mime_type("text/plain");

    let explain = PromptHandler::new("explain", |args| async move {
        let topic = args
            .get("topic")
            .and_then(|v| v.as_str())
            .unwrap_or("arithmetic");
        Ok(json!(format!(
            "Explain {} to a beginner, with one worked example.",
            topic
        )))
    })
    .with_description("Ask for a beginner-level explanation")
    .with_param(Parameter::string("topic").with_default(json!("arithmetic")));

    let server = McpServer::builder()
        .name("calculator-server")
        .version(env!("CARGO_PKG_VERSION"))
        .instructions("A demo calculator. Call `add` to get started.")
        .tool(add)
        .tool(average)
        .tool(count_up)
        .resource(motd)
        .resource_template(squares)
        .prompt(explain)
        .build()?;

    tessera_http_mcp_server::run(&server, ServerConfig::default()).await?;
    Ok(())
}
