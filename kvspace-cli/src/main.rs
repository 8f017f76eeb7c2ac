use clap::{Parser, Subcommand};
use kvspace_core::{KvError, Lookup, Ttl, Value};
use kvspace_redis::RedisEngine;
use thiserror::Error;

mod demo;

use demo::run_demo;

#[derive(Parser, Debug)]
#[command(name = "kvspace", version = "0.2.0")]
#[command(about = "kvspace CLI - namespaced key-value access over Redis")]
#[command(after_help = "Connection settings come from REDIS_HOST, REDIS_PORT, REDIS_PASSWORD, \
REDIS_DB, REDIS_MAX_CONNECTIONS, REDIS_CONNECTION_TIMEOUT and REDIS_COMMAND_TIMEOUT.")]
struct Cli {
    /// Namespace prefix applied to every key (empty for none)
    #[arg(long, global = true, default_value = "")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that Redis is reachable
    Ping,
    /// Write a value
    Set {
        key: String,
        value: String,
        /// Expire after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
        /// Parse VALUE as JSON before storing it
        #[arg(long)]
        json: bool,
    },
    /// Read a value
    Get {
        key: String,
        /// Print the stored text without JSON parsing
        #[arg(long)]
        raw: bool,
    },
    /// Delete one or more keys
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Check whether a key exists
    Exists { key: String },
    /// Show remaining time to live in seconds
    Ttl { key: String },
    /// Set a time to live on an existing key
    Expire { key: String, seconds: u64 },
    /// List keys in the namespace matching a glob pattern
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },
    /// Walk through create, read, batch and TTL operations
    Demo,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] KvError),

    #[error("Invalid JSON value: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),
}

fn main() {
    // Initialize JSON logging once.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = run(cli);

    kvspace_redis::shutdown();

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Ping => ping(),
        command => execute(&kvspace_redis::engine(&cli.prefix)?, command),
    }
}

fn ping() -> Result<(), CliError> {
    if kvspace_redis::verify_connectivity() {
        println!("PONG");
        Ok(())
    } else {
        Err(CliError::Rejected("Redis is not reachable".to_string()))
    }
}

fn execute(engine: &RedisEngine, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Ping => return ping(),
        Commands::Set {
            key,
            value,
            ttl,
            json,
        } => {
            let value = if json {
                Value::from(serde_json::from_str::<serde_json::Value>(&value)?)
            } else {
                Value::Text(value)
            };
            expect_success(engine.create(&key, value, ttl), "write")?;
            println!("OK");
        }
        Commands::Get { key, raw } => match engine.fetch(&key, !raw) {
            Lookup::Found(value) => println!("{}", render(&value)),
            Lookup::NotFound => println!("(nil)"),
            Lookup::Failed(e) => return Err(e.into()),
        },
        Commands::Del { keys } => {
            println!("{}", delete_keys(engine, &keys));
        }
        Commands::Exists { key } => {
            println!("{}", engine.exists(&key));
        }
        Commands::Ttl { key } => match engine.fetch_ttl(&key) {
            Lookup::Found(Ttl::Expires(seconds)) => println!("{}", seconds),
            Lookup::Found(Ttl::Persistent) => println!("-1 (no expiry)"),
            Lookup::NotFound => println!("-2 (no such key)"),
            Lookup::Failed(e) => return Err(e.into()),
        },
        Commands::Expire { key, seconds } => {
            expect_success(engine.set_expire(&key, seconds), "expire")?;
            println!("OK");
        }
        Commands::Keys { pattern } => {
            let mut keys = engine.get_all_keys(&pattern);
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
        Commands::Demo => run_demo(engine),
    }

    Ok(())
}

fn delete_keys(engine: &RedisEngine, keys: &[String]) -> usize {
    match keys {
        [single] => usize::from(engine.delete(single)),
        many => engine.batch_delete(many),
    }
}

fn expect_success(ok: bool, action: &str) -> Result<(), CliError> {
    if ok {
        Ok(())
    } else {
        Err(CliError::Rejected(format!(
            "{} was not applied (see log for details)",
            action
        )))
    }
}

/// Human-readable form of a stored value
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Record(record) => {
            serde_json::to_string_pretty(record).unwrap_or_else(|_| record.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_values() {
        assert_eq!(render(&Value::from("plain")), "plain");
        assert_eq!(render(&Value::Integer(42)), "42");
        assert_eq!(render(&Value::Float(2.5)), "2.5");
        assert_eq!(render(&Value::Record(json!({"a": 1}))), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_cli_parses_set_with_options() {
        let cli = Cli::parse_from([
            "kvspace", "--prefix", "users", "set", "k", "{}", "--ttl", "30", "--json",
        ]);
        assert_eq!(cli.prefix, "users");
        match cli.command {
            Commands::Set { key, ttl, json, .. } => {
                assert_eq!(key, "k");
                assert_eq!(ttl, Some(30));
                assert!(json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_keys_defaults_to_wildcard() {
        let cli = Cli::parse_from(["kvspace", "keys"]);
        assert!(matches!(cli.command, Commands::Keys { ref pattern } if pattern == "*"));
        assert_eq!(cli.prefix, "");
    }

    #[test]
    fn test_cli_del_requires_a_key() {
        assert!(Cli::try_parse_from(["kvspace", "del"]).is_err());
    }
}
