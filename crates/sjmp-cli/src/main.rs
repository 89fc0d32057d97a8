//! SJMP terminal client.
//!
//! Fetches schemas, reads and writes properties and invokes actions on a
//! running SJMP server.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use sjmp_core::{Schema, SjmpClient};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sjmp")]
#[command(about = "Command-line client for SJMP servers")]
struct Args {
    /// Server URL
    #[arg(long, default_value = "http://127.0.0.1:40234/")]
    url: String,

    /// HTTP Basic username
    #[arg(long, requires = "password")]
    user: Option<String>,

    /// HTTP Basic password
    #[arg(long, requires = "user")]
    password: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server schema
    Schema {
        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },
    /// Read property values
    Get {
        object: Option<String>,
        property: Option<String>,
    },
    /// Write a property value (JSON literal; bare words are sent as strings)
    Set {
        object: String,
        property: String,
        value: String,
    },
    /// Invoke an action with name=value arguments
    Exec {
        object: String,
        action: String,
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let mut client = SjmpClient::new(&args.url)?;
    if let (Some(user), Some(password)) = (args.user, args.password) {
        client = client.with_credentials(user, password);
    }
    debug!("Using server {}", client.url());

    match args.command {
        Command::Schema { json } => {
            let schema = client.schema().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&schema)?);
            } else {
                print_schema(&schema);
            }
        }
        Command::Get { object, property } => {
            let objects = client
                .get_properties(object.as_deref(), property.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&Value::Object(objects))?);
        }
        Command::Set {
            object,
            property,
            value,
        } => {
            client
                .set_property(&object, &property, parse_value(&value))
                .await?;
            println!("ok");
        }
        Command::Exec {
            object,
            action,
            args,
        } => {
            let parameters = parse_arguments(&args)?;
            let value = client.execute(&object, &action, parameters).await?;
            println!("{}", value);
        }
    }

    Ok(())
}

/// Parse a JSON literal, falling back to a plain string.
fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn parse_arguments(args: &[String]) -> Result<Map<String, Value>> {
    let mut parameters = Map::new();
    for arg in args {
        let (name, value) = arg
            .split_once('=')
            .with_context(|| format!("argument '{}' is not of the form name=value", arg))?;
        if name.is_empty() {
            bail!("argument '{}' has an empty name", arg);
        }
        parameters.insert(name.to_string(), parse_value(value));
    }
    Ok(parameters)
}

fn print_schema(schema: &Schema) {
    println!("{} ({}) port {}", schema.name, schema.description, schema.port);
    println!("schema version {}", schema.schema_version);
    for object in &schema.objects {
        println!();
        println!("[{}] {} ({})", object.name, object.description, object.group);
        for property in &object.properties {
            let mut flags = Vec::new();
            if property.readonly {
                flags.push("readonly".to_string());
            }
            if property.show_graph {
                flags.push("graph".to_string());
            }
            if let Some(limits) = &property.limits {
                flags.push(format!("limits {}", serde_json::to_string(limits).unwrap_or_default()));
            }
            println!(
                "  {}: {} {} {}",
                property.name,
                property.wire_type,
                property.description,
                if flags.is_empty() {
                    String::new()
                } else {
                    format!("[{}]", flags.join(", "))
                }
            );
        }
        for action in &object.actions {
            let params: Vec<_> = action
                .parameters
                .iter()
                .map(|p| format!("{}: {}", p.name, p.wire_type))
                .collect();
            println!(
                "  {}({}) -> {}{}  {}",
                action.name,
                params.join(", "),
                action.result,
                if action.require_confirm { " [confirm]" } else { "" },
                action.description
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
        assert_eq!(parse_value("bare words"), json!("bare words"));
    }

    #[test]
    fn test_parse_arguments() {
        let args = vec!["param=hello".to_string(), "n=3".to_string()];
        let parameters = parse_arguments(&args).unwrap();
        assert_eq!(Value::Object(parameters), json!({"param": "hello", "n": 3}));

        assert!(parse_arguments(&["nope".to_string()]).is_err());
        assert!(parse_arguments(&["=1".to_string()]).is_err());
    }
}
