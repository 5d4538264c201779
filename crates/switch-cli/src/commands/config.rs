use std::path::Path;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde_json::{Value, json};
use switch_gateway::config::{Config, Endpoint};

use crate::error::CliResult;
use crate::output::{OutputFormat, truncate_string};

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Parser)]
pub enum ConfigSubcommand {
    #[clap(about = "Show the effective gateway configuration")]
    Show,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            ConfigSubcommand::Show => Self::show(config_path, format),
        }
    }

    fn show(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let config = Config::load(config_path)?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&config_json(&config))?);
            }
            OutputFormat::Table => print_tables(&config, config_path),
        }
        Ok(())
    }
}

fn key_is_set(env_name: &str) -> bool {
    std::env::var(env_name)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

/// Secrets never appear here: keys and the database URL are reported as set or not
fn config_json(config: &Config) -> Value {
    let endpoints: Vec<Value> = Endpoint::ALL
        .iter()
        .map(|endpoint| {
            let settings = config.endpoints.resolve(*endpoint);
            json!({
                "name": endpoint.name(),
                "route": endpoint.route(),
                "provider": settings.provider.as_str(),
                "model": settings.model,
                "max_tokens": settings.max_tokens,
                "temperature": settings.temperature,
                "require_data": settings.require_data,
            })
        })
        .collect();

    json!({
        "server": {
            "listen_addr": config.server.listen_addr,
            "debug": config.server.debug,
            "request_timeout_secs": config.server.request_timeout_secs,
            "max_body_bytes": config.server.max_body_bytes,
        },
        "upstream": {
            "timeout_secs": config.upstream.timeout_secs,
        },
        "data_source": {
            "base_url": config.data_source.base_url,
            "default_namespace": config.data_source.default_namespace,
        },
        "openai": {
            "api_url": config.openai.api_url,
            "api_key_env": config.openai.api_key_env,
            "api_key_set": key_is_set(&config.openai.api_key_env),
        },
        "anthropic": {
            "api_url": config.anthropic.api_url,
            "api_key_env": config.anthropic.api_key_env,
            "api_key_set": key_is_set(&config.anthropic.api_key_env),
            "version": config.anthropic.version,
        },
        "endpoints": endpoints,
        "database": {
            "configured": config.database.connection_url().is_some(),
            "url_env": config.database.url_env,
            "max_connections": config.database.max_connections,
        },
    })
}

fn settings_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Setting", "Value"]);
    table
}

fn key_status(env_name: &str) -> String {
    if key_is_set(env_name) {
        format!("{env_name} (set)")
    } else {
        format!("{env_name} (not set)")
    }
}

fn print_tables(config: &Config, config_path: Option<&Path>) {
    match config_path {
        Some(path) => println!("Configuration from: {}", path.display()),
        None => println!("Configuration: (default search paths)"),
    }
    println!("==============================\n");

    println!("[Server]");
    let mut server_table = settings_table();
    server_table.add_row(["listen_addr", &config.server.listen_addr]);
    server_table.add_row(["debug", &config.server.debug.to_string()]);
    server_table.add_row([
        "request_timeout_secs",
        &config.server.request_timeout_secs.to_string(),
    ]);
    server_table.add_row(["max_body_bytes", &config.server.max_body_bytes.to_string()]);
    server_table.add_row([
        "upstream timeout_secs",
        &config.upstream.timeout_secs.to_string(),
    ]);
    println!("{server_table}\n");

    println!("[Data source]");
    let mut source_table = settings_table();
    source_table.add_row(["base_url", &config.data_source.base_url]);
    source_table.add_row([
        "default_namespace",
        if config.data_source.default_namespace.is_empty() {
            "(not set)"
        } else {
            &config.data_source.default_namespace
        },
    ]);
    println!("{source_table}\n");

    println!("[Providers]");
    let mut provider_table = settings_table();
    provider_table.add_row(["openai.api_url", &config.openai.api_url]);
    provider_table.add_row(["openai.api_key", &key_status(&config.openai.api_key_env)]);
    provider_table.add_row(["anthropic.api_url", &config.anthropic.api_url]);
    provider_table.add_row([
        "anthropic.api_key",
        &key_status(&config.anthropic.api_key_env),
    ]);
    provider_table.add_row(["anthropic.version", &config.anthropic.version]);
    println!("{provider_table}\n");

    println!("[Endpoints]");
    let mut endpoint_table = Table::new();
    endpoint_table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header([
            "Endpoint",
            "Route",
            "Provider",
            "Model",
            "Max tokens",
            "Temperature",
            "Data",
            "System prompt",
        ]);
    for endpoint in Endpoint::ALL {
        let settings = config.endpoints.resolve(endpoint);
        endpoint_table.add_row([
            endpoint.name().to_string(),
            endpoint.route().to_string(),
            settings.provider.as_str().to_string(),
            settings.model.clone(),
            settings.max_tokens.to_string(),
            settings.temperature.to_string(),
            if settings.require_data {
                "required".to_string()
            } else {
                "optional".to_string()
            },
            truncate_string(settings.system_prompt.lines().next().unwrap_or(""), 40),
        ]);
    }
    println!("{endpoint_table}\n");

    println!("[Database]");
    let mut database_table = settings_table();
    database_table.add_row([
        "url",
        if config.database.connection_url().is_some() {
            "(set)"
        } else {
            "(not set)"
        },
    ]);
    database_table.add_row(["url_env", &config.database.url_env]);
    database_table.add_row([
        "max_connections",
        &config.database.max_connections.to_string(),
    ]);
    println!("{database_table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_json_hides_secrets() {
        let mut config = Config::default();
        config.database.url = Some("postgres://user:secret@db/switch".to_string());

        let json = config_json(&config);
        let rendered = json.to_string();
        assert!(!rendered.contains("secret"));
        assert_eq!(json["database"]["configured"], true);
        assert_eq!(json["openai"]["api_key_env"], "OPENAI_API_KEY");
    }

    #[test]
    fn test_config_json_lists_endpoints() {
        let json = config_json(&Config::default());
        let endpoints = json["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[2]["name"], "chat");
        assert_eq!(endpoints[2]["provider"], "anthropic");
        assert_eq!(endpoints[1]["require_data"], true);
    }
}
