//! `hermes` CLI: command-line client for the Hermes document portal.
//!
//! Talks to the portal exclusively through its HTTP API. Also hosts the
//! backend supervisor and the control server that starts and stops it.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod control;
mod supervisor;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::supervisor::{ChildCommand, Supervisor};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ── CLI structure ────────────────────────────────────────────────────

/// Hermes: departmental document portal.
#[derive(Parser)]
#[command(
    name = "hermes",
    version,
    about = "Hermes CLI: upload, list and delete portal documents, and supervise the backend",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         HERMES_ADDR           Portal address (default: http://127.0.0.1:3000)\n  \
         HERMES_CONTROL_ADDR   Control server address (default: http://127.0.0.1:4000)\n\n\
         {DIM}Examples:{RESET}\n  \
         hermes upload report.pdf --access-level departamento --department Finanzas\n  \
         hermes list --department Finanzas\n  \
         hermes delete report.pdf\n  \
         hermes control-server\n  \
         hermes control start"
    ),
)]
struct Cli {
    /// Portal server address.
    #[arg(long, env = "HERMES_ADDR", default_value = "http://127.0.0.1:3000")]
    addr: String,

    /// Control server address.
    #[arg(long, env = "HERMES_CONTROL_ADDR", default_value = "http://127.0.0.1:4000")]
    control_addr: String,

    /// Print raw JSON responses.
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more documents with shared metadata.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Access level: publico, departamento or privado.
        #[arg(long)]
        access_level: Option<String>,
        /// Owning department.
        #[arg(long)]
        department: Option<String>,
        /// Content fingerprint to record.
        #[arg(long)]
        content_hash: Option<String>,
    },
    /// List the documents visible to a department.
    List {
        /// Requester department (sent as X-Hermes-Department).
        #[arg(long)]
        department: Option<String>,
        /// Requester roles, comma separated (sent as X-Hermes-Roles).
        #[arg(long)]
        roles: Option<String>,
    },
    /// Delete a document and its metadata.
    Delete {
        /// Stored filename.
        filename: String,
    },
    /// Check that the portal server is up.
    Health,
    /// Show the portal feature flags.
    Config,
    /// Run the control server that starts and stops the backend.
    #[command(name = "control-server")]
    ControlServer {
        /// Address to listen on.
        #[arg(long, default_value_t = SocketAddr::from(control::DEFAULT_CONTROL_ADDR))]
        bind: SocketAddr,
        /// Backend command line (default: the hermes-server binary).
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Drive a running control server.
    Control {
        #[command(subcommand)]
        action: ControlCommands,
    },
}

#[derive(Subcommand)]
enum ControlCommands {
    /// Start the backend.
    Start,
    /// Stop the backend.
    Stop,
    /// Show backend status.
    Status,
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<24}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn print_json(value: &Value) {
    if value.is_null() {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to format JSON: {e}"),
    }
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("-")
}

fn print_upload_report(resp: &Value) {
    header("⇪", "Upload");
    kv_line("Status", text(resp, "status"));
    println!();
    for file in resp["files"].as_array().into_iter().flatten() {
        let name = text(file, "filename");
        match text(file, "status") {
            "success" => success(name),
            "duplicate" => warning(&format!("{name}: already stored")),
            _ => println!(
                "{RED}{BOLD}✗{RESET} {name} ({} error): {}",
                text(file, "kind"),
                text(file, "reason")
            ),
        }
    }
}

fn print_document_list(resp: &Value) {
    let documents = resp.as_array().map(Vec::as_slice).unwrap_or_default();
    header("▤", &format!("Documents ({})", documents.len()));
    if documents.is_empty() {
        println!("  {DIM}no documents visible{RESET}");
        return;
    }
    for doc in documents {
        let size = doc["file_size"].as_u64().unwrap_or(0);
        let degraded = if doc["degraded"].as_bool().unwrap_or(false) {
            format!(" {YELLOW}(metadata unreadable){RESET}")
        } else {
            String::new()
        };
        println!(
            "  {WHITE}{:<40}{RESET} {DIM}{:<13} {:<18} {:>10} B  {}{RESET}{degraded}",
            text(doc, "filename"),
            text(doc, "access_level"),
            text(doc, "owner_department"),
            size,
            text(doc, "upload_date"),
        );
    }
}

fn print_config(resp: &Value) {
    header("⚙", "Portal configuration");
    if let Some(flags) = resp.as_object() {
        for (key, value) in flags {
            let shown = match value {
                Value::String(s) if s.is_empty() => "(empty)".to_owned(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            kv_line(key, &shown);
        }
    }
}

fn print_control_status(resp: &Value) {
    header("◉", "Backend status");
    kv_line(
        "Control server",
        if resp["control_server_active"].as_bool().unwrap_or(false) { "active" } else { "inactive" },
    );
    kv_line("State", text(resp, "state"));
    let pid = resp["pid"].as_u64().map_or_else(|| "-".to_owned(), |p| p.to_string());
    kv_line("PID", &pid);
}

// ── HTTP client ──────────────────────────────────────────────────────

struct Client {
    http: reqwest::Client,
    addr: String,
    control_addr: String,
}

impl Client {
    fn new(addr: String, control_addr: String) -> Self {
        let http = reqwest::Client::new();
        Self {
            http,
            addr,
            control_addr,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.addr.trim_end_matches('/'))
    }

    fn control_url(&self, path: &str) -> String {
        format!("{}{path}", self.control_addr.trim_end_matches('/'))
    }

    /// `/api/documents/{filename}` with the filename percent-encoded.
    fn document_url(&self, filename: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url("/api/documents"))
            .with_context(|| format!("invalid server address '{}'", self.addr))?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("server address cannot be a base URL"))?
            .push(filename);
        Ok(url)
    }

    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Value> {
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let resp = request.send().await.context("request failed")?;
        handle_response(resp).await
    }

    async fn post_no_body(&self, url: &str) -> Result<Value> {
        let resp = self.http.post(url).send().await.context("request failed")?;
        handle_response(resp).await
    }

    /// Post an upload batch. A `422` still carries the per-file report, so
    /// it is returned like a success.
    async fn post_upload(&self, url: &str, form: Form) -> Result<Value> {
        let resp = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("request failed")?;
        if resp.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let body = resp.text().await.context("failed to read response body")?;
            return serde_json::from_str(&body).context("failed to parse upload report");
        }
        handle_response(resp).await
    }

    async fn delete(&self, url: Url) -> Result<Value> {
        let resp = self.http.delete(url).send().await.context("request failed")?;
        handle_response(resp).await
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    let body = resp.text().await.context("failed to read response body")?;
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).context("failed to parse response JSON")
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let client = Client::new(cli.addr, cli.control_addr);

    match run(client, cli.command, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(client: Client, cmd: Commands, json: bool) -> Result<()> {
    match cmd {
        Commands::Upload {
            files,
            access_level,
            department,
            content_hash,
        } => {
            let metadata = serde_json::json!({
                "access_level": access_level,
                "owner_department": department,
                "content_hash": content_hash,
            });
            let resp = cmd_upload(&client, &files, &metadata).await?;
            render(json, &resp, print_upload_report);
            if resp["status"] == "error" {
                bail!("no file was uploaded");
            }
            Ok(())
        }
        Commands::List { department, roles } => {
            let mut headers = Vec::new();
            if let Some(department) = department.as_deref() {
                headers.push(("x-hermes-department", department));
            }
            if let Some(roles) = roles.as_deref() {
                headers.push(("x-hermes-roles", roles));
            }
            let resp = client.get(&client.url("/api/documents"), &headers).await?;
            render(json, &resp, print_document_list);
            Ok(())
        }
        Commands::Delete { filename } => {
            client.delete(client.document_url(&filename)?).await?;
            success(&format!("deleted {filename}"));
            Ok(())
        }
        Commands::Health => {
            let resp = client.get(&client.url("/health"), &[]).await?;
            render(json, &resp, |_| success(&format!("portal at {} is up", client.addr)));
            Ok(())
        }
        Commands::Config => {
            let resp = client.get(&client.url("/api/config"), &[]).await?;
            render(json, &resp, print_config);
            Ok(())
        }
        Commands::ControlServer { bind, command } => cmd_control_server(bind, command).await,
        Commands::Control { action } => cmd_control(&client, action, json).await,
    }
}

fn render(json: bool, resp: &Value, pretty: impl FnOnce(&Value)) {
    if json {
        print_json(resp);
    } else {
        pretty(resp);
    }
}

// ── Document commands ────────────────────────────────────────────────

async fn cmd_upload(client: &Client, files: &[PathBuf], metadata: &Value) -> Result<Value> {
    let mut form = Form::new().text("metadata", metadata.to_string());
    for path in files {
        form = form.part("files", file_part(path).await?);
    }
    client.post_upload(&client.url("/upload"), form).await
}

async fn file_part(path: &Path) -> Result<Part> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("'{}' has no usable file name", path.display()))?
        .to_owned();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Part::bytes(bytes)
        .file_name(filename)
        .mime_str(mime.essence_str())
        .context("invalid content type")
}

// ── Supervisor commands ──────────────────────────────────────────────

async fn cmd_control_server(bind: SocketAddr, command: Vec<String>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    let child = match command.split_first() {
        Some((program, args)) => ChildCommand::new(program.clone(), args.to_vec()),
        None => ChildCommand::default_server(),
    };

    control::run_control_server(bind, Supervisor::new(child)).await
}

async fn cmd_control(client: &Client, action: ControlCommands, json: bool) -> Result<()> {
    match action {
        ControlCommands::Start => {
            let resp = client.post_no_body(&client.control_url("/start")).await?;
            render(json, &resp, |r| success(text(r, "message")));
        }
        ControlCommands::Stop => {
            let resp = client.post_no_body(&client.control_url("/stop")).await?;
            render(json, &resp, |r| success(text(r, "message")));
        }
        ControlCommands::Status => {
            let resp = client.get(&client.control_url("/status"), &[]).await?;
            render(json, &resp, print_control_status);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn document_url_percent_encodes_filename() {
        let client = Client::new("http://127.0.0.1:3000/".to_owned(), String::new());
        let url = client.document_url("Informe Q3/final.pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:3000/api/documents/Informe%20Q3%2Ffinal.pdf"
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn rejected_upload_still_returns_the_report() {
        use axum::Json;
        use axum::http::StatusCode;
        use axum::routing::post;

        let report = serde_json::json!({
            "status": "error",
            "files": [{
                "filename": "big.pdf",
                "status": "error",
                "kind": "validation",
                "reason": "'big.pdf' is 5 bytes, the limit is 4 bytes"
            }]
        });
        let served = report.clone();
        let app = axum::Router::new().route(
            "/upload",
            post(move || {
                let served = served.clone();
                async move { (StatusCode::UNPROCESSABLE_ENTITY, Json(served)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = Client::new(format!("http://{addr}"), String::new());
        let resp = client
            .post_upload(&client.url("/upload"), Form::new())
            .await
            .unwrap();

        assert_eq!(resp, report);
    }

    #[tokio::test]
    async fn file_part_rejects_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.pdf");
        assert!(file_part(&missing).await.is_err());
    }
}
