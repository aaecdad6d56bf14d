mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use render::{CatalogInfo, GridTable, Summary};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "diary_cli", version)]
struct Args {
    /// Core base URL, e.g. http://127.0.0.1:17700
    #[arg(long, default_value = "http://127.0.0.1:17700")]
    core_url: String,

    /// Display language (ru | he). Defaults to the core's language.
    #[arg(long, global = true)]
    lang: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new episode.
    Add {
        /// YYYY-MM-DD or DD.MM.YYYY (default: today).
        #[arg(long)]
        date: Option<String>,
        /// HH:MM (default: now).
        #[arg(long)]
        time: Option<String>,
        /// Pain intensity, 1-10.
        #[arg(long, short = 'i', default_value_t = 5)]
        intensity: i64,
        #[arg(long, short = 'l')]
        location: String,
        /// Repeat for several symptoms.
        #[arg(long = "symptom", short = 's')]
        symptoms: Vec<String>,
        /// Repeat for several triggers.
        #[arg(long = "trigger", short = 't')]
        triggers: Vec<String>,
        #[arg(long, short = 'm', default_value = "")]
        medication: String,
        #[arg(long, short = 'n', default_value = "")]
        notes: String,
    },
    /// Counts, average and charts.
    Stats,
    /// Print every episode with its row number.
    List,
    /// Delete rows by number (as printed by `list`).
    Delete {
        #[arg(required = true)]
        rows: Vec<usize>,
    },
    /// Change fields of one row; fields left out keep their value.
    Edit {
        row: usize,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        intensity: Option<u8>,
        #[arg(long)]
        location: Option<String>,
        /// Comma separated.
        #[arg(long)]
        symptoms: Option<String>,
        /// Comma separated.
        #[arg(long)]
        triggers: Option<String>,
        #[arg(long)]
        medication: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show the choices offered for location, symptoms and triggers.
    Options,
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SaveResult {
    rows: usize,
    message: String,
}

#[derive(Deserialize)]
struct EditResult {
    rows: usize,
    deleted: usize,
    message: String,
}

#[derive(Serialize)]
struct RowEdit {
    row: usize,
    cells: Vec<String>,
}

struct Core {
    client: Client,
    base: String,
    lang: Option<String>,
}

impl Core {
    fn url(&self, path: &str) -> String {
        match &self.lang {
            Some(l) => format!("{}{path}?lang={l}", self.base),
            None => format!("{}{path}", self.base),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = self.url(path);
        debug!("GET {url}");
        let res = self.client.get(&url).send().await?;
        unwrap_envelope(res).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Value,
    ) -> anyhow::Result<T> {
        let url = self.url(path);
        debug!("{method} {url}");
        let res = self.client.request(method, &url).json(body).send().await?;
        unwrap_envelope(res).await
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(res: reqwest::Response) -> anyhow::Result<T> {
    let status = res.status();
    let body: Envelope<T> = res
        .json()
        .await
        .with_context(|| format!("unexpected response (http_{})", status.as_u16()))?;
    if !body.ok {
        anyhow::bail!(body.error.unwrap_or_else(|| format!("http_{}", status.as_u16())));
    }
    body.data.ok_or_else(|| anyhow::anyhow!("missing_data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diary_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let core = Core {
        client: Client::new(),
        base: args.core_url.trim_end_matches('/').to_string(),
        lang: args.lang,
    };

    match args.command {
        Command::Add {
            date,
            time,
            intensity,
            location,
            symptoms,
            triggers,
            medication,
            notes,
        } => {
            let body = json!({
                "date": date,
                "time": time,
                "intensity": intensity,
                "location": location,
                "symptoms": symptoms,
                "triggers": triggers,
                "medication": medication,
                "notes": notes
            });
            let saved: SaveResult = core.send(reqwest::Method::POST, "/episodes", &body).await?;
            info!("store now holds {} rows", saved.rows);
            println!("{}", saved.message);
        }
        Command::Stats => {
            let catalog: CatalogInfo = core.get("/catalog").await?;
            let summary: Summary = core.get("/stats").await?;
            print!("{}", render::stats(&catalog, &summary));
        }
        Command::List => {
            let catalog: CatalogInfo = core.get("/catalog").await?;
            let table: GridTable = core.get("/episodes").await?;
            print!("{}", render::grid(&catalog, &table));
        }
        Command::Delete { rows } => {
            let table: GridTable = core.get("/episodes").await?;
            let body = json!({ "base_rows": table.rows.len(), "deleted": rows });
            let res: EditResult = core
                .send(reqwest::Method::POST, "/episodes/edit", &body)
                .await?;
            println!("{} (-{}, {} rows)", res.message, res.deleted, res.rows);
        }
        Command::Edit {
            row,
            date,
            time,
            intensity,
            location,
            symptoms,
            triggers,
            medication,
            notes,
        } => {
            let table: GridTable = core.get("/episodes").await?;
            let current = table
                .rows
                .iter()
                .find(|r| r.row == row)
                .ok_or_else(|| anyhow::anyhow!("row {row} does not exist"))?;
            let mut cells = current.cells.clone();
            let overrides = [
                date,
                time,
                intensity.map(|v| v.to_string()),
                location,
                symptoms,
                triggers,
                medication,
                notes,
            ];
            for (cell, value) in cells.iter_mut().zip(overrides) {
                if let Some(v) = value {
                    *cell = v;
                }
            }
            let body = json!({
                "base_rows": table.rows.len(),
                "updated": [RowEdit { row, cells }]
            });
            let res: EditResult = core
                .send(reqwest::Method::POST, "/episodes/edit", &body)
                .await?;
            println!("{} ({} rows)", res.message, res.rows);
        }
        Command::Options => {
            let catalog: CatalogInfo = core.get("/catalog").await?;
            print!("{}", render::options(&catalog));
        }
    }
    Ok(())
}
