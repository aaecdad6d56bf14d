mod catalog;
mod form;
mod grid;
mod stats;
mod store;

use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use catalog::{Direction, FormOptions, Lang, UiStrings};
use chrono::Local;
use clap::Parser;
use form::EpisodeInput;
use grid::{ChangeSet, TableUpload};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use store::EpisodeStore;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 17700;

#[derive(Parser, Debug)]
#[command(name = "diary_core", version)]
struct Args {
    /// Listen address.
    ///
    /// Accepts:
    /// - ip:port (recommended), e.g. 127.0.0.1:17700
    /// - ip (implies port 17700), e.g. 127.0.0.1
    /// - localhost or localhost:port
    #[arg(long, default_value = "127.0.0.1:17700")]
    listen: String,

    /// Episode table (CSV). Created on first save.
    #[arg(long, default_value = "./migraine_data.csv")]
    data: PathBuf,

    /// Display language used when a request does not name one (ru | he).
    #[arg(long, default_value = "ru")]
    lang: Lang,
}

#[derive(Clone)]
struct AppState {
    // Every operation reads or rewrites the whole file; the lock keeps them one at a time.
    store: Arc<Mutex<EpisodeStore>>,
    default_lang: Lang,
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
}

#[derive(Deserialize, Default)]
struct LangQuery {
    #[serde(default)]
    lang: Option<String>,
}

#[derive(Serialize)]
struct CatalogInfo {
    lang: Lang,
    dir: Direction,
    columns: [&'static str; 8],
    ui: &'static UiStrings,
    options: FormOptions,
    intensity_min: i64,
    intensity_max: i64,
    intensity_default: i64,
}

#[derive(Serialize)]
struct SaveResult {
    rows: usize,
    message: &'static str,
}

#[derive(Serialize)]
struct EditResult {
    rows: usize,
    added: usize,
    updated: usize,
    deleted: usize,
    message: &'static str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diary_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    if let Some(parent) = args.data.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let store = EpisodeStore::new(&args.data);
    let addr = parse_listen(&args.listen)?;
    info!("Diary listening on http://{addr}");
    info!("Data: {} (default lang {})", store.path().display(), args.lang);

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        default_lang: args.lang,
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/catalog", get(get_catalog))
        .route(
            "/episodes",
            get(get_episodes)
                .post(post_episode)
                .put(put_episodes)
                .options(options_ok),
        )
        .route("/episodes/edit", post(post_episodes_edit).options(options_ok))
        .route("/stats", get(get_stats))
        .route("/export/csv", get(get_export_csv))
        .with_state(state)
        .layer(cors)
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        let ip = if host == "localhost" {
            Some(IpAddr::from([127, 0, 0, 1]))
        } else {
            // IPv6 without brackets (best effort): ::1:17700
            host.parse::<IpAddr>().ok()
        };
        if let Some(ip) = ip {
            let port: u16 = port_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
                    input,
                    DEFAULT_PORT
                )
            })?;
            return Ok(SocketAddr::new(ip, port));
        }
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

fn err(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrResponse { ok: false, error })).into_response()
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(OkResponse {
        ok: true,
        data: Some(data),
    })
    .into_response()
}

fn resolve_lang(q: &LangQuery, default: Lang) -> Result<Lang, Response> {
    match q.lang.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => s
            .parse::<Lang>()
            .map_err(|_| err(StatusCode::BAD_REQUEST, "invalid_lang")),
        None => Ok(default),
    }
}

fn parse_body<T: DeserializeOwned>(payload: Value) -> Result<T, Response> {
    serde_json::from_value(payload).map_err(|_| err(StatusCode::BAD_REQUEST, "invalid_json"))
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(OkResponse {
        ok: true,
        data: Some(HealthInfo {
            service: "diary_core",
            version: env!("CARGO_PKG_VERSION"),
        }),
    })
}

async fn get_catalog(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Response {
    let lang = match resolve_lang(&q, state.default_lang) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    ok(CatalogInfo {
        lang,
        dir: lang.direction(),
        columns: catalog::columns(lang),
        ui: catalog::ui(lang),
        options: catalog::options(lang),
        intensity_min: form::INTENSITY_MIN,
        intensity_max: form::INTENSITY_MAX,
        intensity_default: form::DEFAULT_INTENSITY,
    })
}

async fn post_episode(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
    Json(payload): Json<Value>,
) -> Response {
    let lang = match resolve_lang(&q, state.default_lang) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let input: EpisodeInput = match parse_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let episode = match input.into_episode(Local::now().naive_local()) {
        Ok(e) => e,
        Err(e) => return err(StatusCode::BAD_REQUEST, e.code()),
    };

    let store = state.store.lock().await;
    match store.append(episode) {
        Ok(rows) => {
            info!("episode saved ({rows} rows)");
            ok(SaveResult {
                rows,
                message: catalog::ui(lang).success,
            })
        }
        Err(e) => {
            error!("append failed: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "store_error")
        }
    }
}

async fn get_episodes(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Response {
    let lang = match resolve_lang(&q, state.default_lang) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let episodes = { state.store.lock().await.load() };
    ok(grid::grid_view(&episodes, lang))
}

async fn put_episodes(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
    Json(payload): Json<Value>,
) -> Response {
    let lang = match resolve_lang(&q, state.default_lang) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let upload: TableUpload = match parse_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let episodes = match grid::restore_canonical(&upload) {
        Ok(v) => v,
        Err(e) => return err(StatusCode::BAD_REQUEST, e.code()),
    };

    let store = state.store.lock().await;
    if let Err(e) = store.save(&episodes) {
        error!("overwrite failed: {e}");
        return err(StatusCode::INTERNAL_SERVER_ERROR, "store_error");
    }
    info!("table overwritten ({} rows)", episodes.len());
    ok(SaveResult {
        rows: episodes.len(),
        message: catalog::ui(lang).success,
    })
}

async fn post_episodes_edit(
    State(state): State<AppState>,
    Query(q): Query<LangQuery>,
    Json(payload): Json<Value>,
) -> Response {
    let lang = match resolve_lang(&q, state.default_lang) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let changes: ChangeSet = match parse_body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = state.store.lock().await;
    let current = match store.try_load(Local::now().time()) {
        Ok(v) => v,
        Err(e) => {
            error!("edit refused, table not readable: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "store_error");
        }
    };
    let before = current.len();
    if changes.is_empty() {
        return ok(EditResult {
            rows: before,
            added: 0,
            updated: 0,
            deleted: 0,
            message: catalog::ui(lang).success,
        });
    }

    let edited = match grid::apply(current, &changes) {
        Ok(v) => v,
        Err(e @ grid::EditError::Stale { .. }) => {
            info!("rejected edit: {e}");
            return err(StatusCode::CONFLICT, e.code());
        }
        Err(e) => return err(StatusCode::BAD_REQUEST, e.code()),
    };
    if let Err(e) = store.save(&edited) {
        error!("edit save failed: {e}");
        return err(StatusCode::INTERNAL_SERVER_ERROR, "store_error");
    }

    let deleted = before + changes.added.len() - edited.len();
    info!(
        "grid edit applied: +{} ~{} -{deleted} ({} rows)",
        changes.added.len(),
        changes.updated.len(),
        edited.len()
    );
    ok(EditResult {
        rows: edited.len(),
        added: changes.added.len(),
        updated: changes.updated.len(),
        deleted,
        message: catalog::ui(lang).success,
    })
}

async fn get_stats(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Response {
    let lang = match resolve_lang(&q, state.default_lang) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let episodes = { state.store.lock().await.load() };
    ok(stats::summarize(&episodes, lang))
}

async fn get_export_csv(State(state): State<AppState>) -> Response {
    let store = state.store.lock().await;
    match store.export() {
        Ok(csv) => (
            StatusCode::OK,
            [("content-type", "text/csv; charset=utf-8")],
            csv,
        )
            .into_response(),
        Err(e) => {
            error!("export failed: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "store_error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn state_in(dir: &TempDir) -> AppState {
        AppState {
            store: Arc::new(Mutex::new(EpisodeStore::new(
                dir.path().join("migraine_data.csv"),
            ))),
            default_lang: Lang::Russian,
        }
    }

    fn lang(code: &str) -> Query<LangQuery> {
        Query(LangQuery {
            lang: Some(code.to_string()),
        })
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn parse_listen_accepts_common_forms() {
        assert_eq!(
            parse_listen("127.0.0.1:9000").unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_listen("0.0.0.0").unwrap().port(), DEFAULT_PORT);
        assert_eq!(parse_listen("localhost:8080").unwrap().port(), 8080);
        assert!(parse_listen("localhost:http").is_err());
        assert!(parse_listen("example.com").is_err());
    }

    #[tokio::test]
    async fn hebrew_entry_round_trips_through_the_grid() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        let resp = post_episode(
            State(state.clone()),
            lang("he"),
            Json(json!({
                "date": "2024-04-02",
                "time": "13:20",
                "intensity": 7,
                "location": "רקות",
                "symptoms": ["בחילה"],
                "triggers": ["לחץ/סטרס", "רעב"],
                "medication": "אקמול",
                "notes": ""
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["rows"], 1);
        assert_eq!(body["data"]["message"], "נשמר בהצלחה!");

        let raw = std::fs::read_to_string(dir.path().join("migraine_data.csv")).unwrap();
        assert!(raw.contains("Виски"));
        assert!(raw.contains("\"Стресс, Голод\""));

        let body = body_json(get_episodes(State(state), lang("he")).await).await;
        let cells = &body["data"]["rows"][0]["cells"];
        assert_eq!(body["data"]["dir"], "rtl");
        assert_eq!(cells[3], "רקות");
        assert_eq!(cells[4], "בחילה");
        assert_eq!(cells[5], "לחץ/סטרס, רעב");
        assert_eq!(cells[6], "אקמול");
    }

    #[tokio::test]
    async fn invalid_form_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);

        let resp = post_episode(
            State(state.clone()),
            Query(LangQuery::default()),
            Json(json!({"intensity": 12, "location": "Лоб"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "invalid_intensity");

        let resp = post_episode(
            State(state.clone()),
            Query(LangQuery::default()),
            Json(json!({"intensity": "high"})),
        )
        .await;
        assert_eq!(body_json(resp).await["error"], "invalid_json");

        let resp = get_stats(State(state), lang("fr")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!dir.path().join("migraine_data.csv").exists());
    }

    #[tokio::test]
    async fn stats_reflect_saved_episodes() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        for (day, intensity, triggers) in [
            ("2024-01-01", 3, json!(["Стресс", "Голод"])),
            ("2024-01-03", 7, json!(["Голод"])),
            ("2024-01-02", 5, json!([])),
        ] {
            let resp = post_episode(
                State(state.clone()),
                Query(LangQuery::default()),
                Json(json!({
                    "date": day,
                    "intensity": intensity,
                    "location": "Лоб",
                    "triggers": triggers
                })),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let body = body_json(get_stats(State(state), Query(LangQuery::default())).await).await;
        let data = &body["data"];
        assert_eq!(data["total"], 3);
        assert_eq!(data["avg_display"], "5.0");
        assert_eq!(data["last_date"], "2024-01-03");
        assert_eq!(data["triggers"][0]["label"], "Голод");
        assert_eq!(data["triggers"][0]["count"], 2);
        assert_eq!(data["locations"][0]["count"], 3);
    }

    #[tokio::test]
    async fn edits_apply_and_stale_grids_conflict() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        let upload = json!({
            "columns": [
                "תאריך", "שעה", "עוצמה (1-10)", "מיקום",
                "תסמינים", "טריגרים", "תרופות", "הערות"
            ],
            "rows": [
                ["2024-01-01", "08:00:00", "4", "מצח", "", "", "", ""],
                ["2024-01-02", "09:00:00", "6", "צוואר", "", "", "", ""]
            ]
        });
        let resp = put_episodes(State(state.clone()), lang("he"), Json(upload)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let stale = json!({"base_rows": 5, "deleted": [0]});
        let resp = post_episodes_edit(State(state.clone()), lang("ru"), Json(stale)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["error"], "stale_table");

        let change = json!({
            "base_rows": 2,
            "deleted": [0],
            "added": [["2024-01-05", "22:10", "9", "Глаза", "Аура", "", "", "ночь"]]
        });
        let resp = post_episodes_edit(State(state.clone()), lang("ru"), Json(change)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["rows"], 2);
        assert_eq!(body["data"]["deleted"], 1);

        let body = body_json(get_episodes(State(state), lang("ru")).await).await;
        let rows = body["data"]["rows"].as_array().unwrap();
        assert_eq!(rows[0]["cells"][3], "Шея");
        assert_eq!(rows[1]["cells"][4], "Аура");
        assert_eq!(rows[1]["cells"][7], "ночь");
    }

    #[tokio::test]
    async fn export_returns_canonical_csv() {
        let dir = TempDir::new().unwrap();
        let resp = get_export_csv(State(state_in(&dir))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("Дата,Время,Интенсивность (1-10)"));
    }

    #[tokio::test]
    async fn writes_leave_an_unreadable_table_untouched() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        let path = dir.path().join("migraine_data.csv");
        let original = format!(
            "{}\n2024-01-05,10:00:00,4,Лоб,,,,\n2024-01-06,11:00:00,много,Шея,,,,\n",
            catalog::CANONICAL_COLUMNS.join(",")
        );
        std::fs::write(&path, &original).unwrap();

        let resp = post_episode(
            State(state.clone()),
            Query(LangQuery::default()),
            Json(json!({"intensity": 5, "location": "Лоб"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["error"], "store_error");

        let change = json!({"base_rows": 2, "deleted": [0]});
        let resp = post_episodes_edit(State(state.clone()), lang("ru"), Json(change)).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

        // The view still lists both rows, the bad cell blank.
        let body = body_json(get_episodes(State(state), lang("ru")).await).await;
        let rows = body["data"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["cells"][2], "");
        assert_eq!(rows[1]["cells"][3], "Шея");
    }
}
