use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::{Map, Value, json};
use switch_gateway::config::Endpoint;

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct AskCommand {
    #[clap(help = "Question to ask")]
    pub question: String,

    #[clap(
        long,
        default_value = "http://127.0.0.1:3000",
        help = "Base URL of a running gateway"
    )]
    pub url: String,

    #[clap(
        long,
        short,
        default_value = "completion",
        help = "Endpoint to call (completion, assistant, chat)"
    )]
    pub endpoint: String,

    #[clap(long, short, help = "Recipe reference, bare id or tenant/id")]
    pub recipe: Option<String>,

    #[clap(
        long,
        help = "JSON file with the recipe record to send inline",
        conflicts_with = "recipe"
    )]
    pub recipe_file: Option<PathBuf>,
}

impl AskCommand {
    pub async fn execute(&self, format: OutputFormat) -> CliResult<()> {
        let endpoint = Endpoint::parse(&self.endpoint).ok_or_else(|| {
            CliError(format!(
                "Unknown endpoint '{}'. Use completion, assistant or chat",
                self.endpoint
            ))
        })?;

        let inline = match &self.recipe_file {
            Some(path) => Some(read_recipe_file(path)?),
            None => None,
        };
        let body = request_body(&self.question, self.recipe.as_deref(), inline);

        let client = reqwest::Client::new();
        let (status, response) = send(&client, &self.url, endpoint, &body).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            OutputFormat::Table => {
                if let Some(answer) = response.get("answer").and_then(Value::as_str) {
                    println!("{answer}");
                }
            }
        }

        if response.get("success").and_then(Value::as_bool) == Some(true) {
            Ok(())
        } else {
            Err(CliError(describe_failure(status, &response)))
        }
    }
}

fn read_recipe_file(path: &Path) -> CliResult<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read recipe file {}: {e}", path.display()))?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError(format!(
            "Recipe file {} must contain a JSON object",
            path.display()
        ))),
    }
}

fn request_body(question: &str, recipe: Option<&str>, inline: Option<Map<String, Value>>) -> Value {
    let mut body = json!({ "question": question });
    if let Some(recipe) = recipe {
        body["dataRef"] = Value::String(recipe.to_string());
    }
    if let Some(inline) = inline {
        body["inlineData"] = Value::Object(inline);
    }
    body
}

fn endpoint_url(base: &str, endpoint: Endpoint) -> String {
    format!("{}{}", base.trim_end_matches('/'), endpoint.route())
}

/// POST the body and return the status with the decoded JSON response
async fn send(
    client: &reqwest::Client,
    base: &str,
    endpoint: Endpoint,
    body: &Value,
) -> CliResult<(u16, Value)> {
    let url = endpoint_url(base, endpoint);
    let response = client
        .post(&url)
        .json(body)
        .send()
        .await
        .map_err(|e| format!("Failed to reach gateway at {url}: {e}"))?;

    let status = response.status().as_u16();
    let text = response.text().await?;
    let json = serde_json::from_str(&text)
        .map_err(|_| format!("Gateway returned {status} with a non-JSON body"))?;
    Ok((status, json))
}

fn describe_failure(status: u16, response: &Value) -> String {
    let error = response
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");

    let extra = ["details", "reason", "upstreamUrl", "detail"]
        .iter()
        .filter_map(|key| response.get(*key).and_then(Value::as_str))
        .collect::<Vec<_>>();

    if extra.is_empty() {
        format!("Gateway returned {status}: {error}")
    } else {
        format!("Gateway returned {status}: {error} ({})", extra.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_request_body_with_reference() {
        let body = request_body("Quanta acqua?", Some("abc/123"), None);
        assert_eq!(body, json!({"question": "Quanta acqua?", "dataRef": "abc/123"}));
    }

    #[test]
    fn test_read_recipe_file_inline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"recipeName": "Ribollita"}}"#).unwrap();

        let inline = read_recipe_file(file.path()).unwrap();
        let body = request_body("Q", None, Some(inline));
        assert_eq!(body["inlineData"]["recipeName"], "Ribollita");
        assert!(body.get("dataRef").is_none());
    }

    #[test]
    fn test_read_recipe_file_rejects_non_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(read_recipe_file(file.path()).is_err());
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("http://localhost:3000/", Endpoint::Assistant),
            "http://localhost:3000/api/assistant"
        );
        assert_eq!(
            endpoint_url("http://localhost:3000", Endpoint::Completion),
            "http://localhost:3000/completion"
        );
    }

    #[test]
    fn test_describe_failure_includes_details() {
        let response = json!({
            "error": "Impossibile recuperare la ricetta",
            "details": "Status 404: Not Found",
            "upstreamUrl": "https://records/abc"
        });
        assert_eq!(
            describe_failure(502, &response),
            "Gateway returned 502: Impossibile recuperare la ricetta (Status 404: Not Found, https://records/abc)"
        );
    }

    #[tokio::test]
    async fn test_send_posts_to_endpoint_route() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({"question": "Ciao"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "answer": "Ciao! 👋"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let (status, response) = send(
            &reqwest::Client::new(),
            &mock_server.uri(),
            Endpoint::Chat,
            &request_body("Ciao", None, None),
        )
        .await
        .unwrap();

        assert_eq!(status, 200);
        assert_eq!(response["answer"], "Ciao! 👋");
    }

    #[tokio::test]
    async fn test_send_non_json_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(413).set_body_string("length limit exceeded"))
            .mount(&mock_server)
            .await;

        let err = send(
            &reqwest::Client::new(),
            &mock_server.uri(),
            Endpoint::Completion,
            &request_body("Q", None, None),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("413"));
    }
}
