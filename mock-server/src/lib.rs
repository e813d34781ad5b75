use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const API_PREFIX: &str = "/exp/v1/public";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subsidy {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub target_area_search: Option<String>,
    #[serde(default)]
    pub created_date: String,
    #[serde(default)]
    pub acceptance_start_datetime: String,
    #[serde(default)]
    pub acceptance_end_datetime: String,
    /// Currently accepting applications.
    #[serde(default)]
    pub open: bool,
    /// Fields only present on the detail endpoint, attachments included.
    #[serde(default)]
    pub detail: Map<String, Value>,
}

impl Subsidy {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            target_area_search: None,
            created_date: String::new(),
            acceptance_start_datetime: String::new(),
            acceptance_end_datetime: String::new(),
            open: true,
            detail: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.detail.insert(key.to_string(), value);
        self
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "target_area_search": self.target_area_search,
            "created_date": self.created_date,
            "acceptance_start_datetime": self.acceptance_start_datetime,
            "acceptance_end_datetime": self.acceptance_end_datetime,
        })
    }

    fn full(&self) -> Value {
        let mut record = match self.summary() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        record.extend(self.detail.clone());
        Value::Object(record)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub subsidies: Vec<Subsidy>,
    /// IDs whose detail lookup answers 500.
    pub failing: HashSet<String>,
}

impl Catalog {
    pub fn new(subsidies: Vec<Subsidy>) -> Self {
        Self {
            subsidies,
            failing: HashSet::new(),
        }
    }

    /// A handful of records with base64 attachments, served by the binary.
    pub fn sample() -> Self {
        let attachment = json!([{ "name": "募集要項.pdf", "data": "JVBERi0xLjQKJcTl8uXr" }]);
        let mut toyama = Subsidy::new("a0W5h00000RcFx6EAF", "富山県 中小企業設備投資補助金")
            .with_detail("subsidy_max_limit", json!(5_000_000))
            .with_detail("application_guidelines", attachment.clone())
            .with_detail("outline_of_grant", json!([]))
            .with_detail("application_form", attachment.clone());
        toyama.target_area_search = Some("富山県".to_string());
        toyama.created_date = "2024-04-01T00:00:00.000Z".to_string();

        let mut national = Subsidy::new("a0WJ200000CDRBGMA5", "IT導入補助金2025")
            .with_detail("subsidy_max_limit", json!(4_500_000))
            .with_detail("application_guidelines", attachment);
        national.target_area_search = Some("全国".to_string());
        national.created_date = "2025-01-15T00:00:00.000Z".to_string();

        let mut closed = Subsidy::new("a0W2000000OLDCLOSED", "事業再構築補助金（終了）");
        closed.target_area_search = Some("全国".to_string());
        closed.created_date = "2021-03-26T00:00:00.000Z".to_string();
        closed.open = false;

        Self::new(vec![toyama, national, closed])
    }
}

pub type Db = Arc<RwLock<Catalog>>;

#[derive(Deserialize)]
pub struct ListParams {
    pub keyword: String,
    pub sort: String,
    pub order: String,
    pub acceptance: String,
    pub target_area_search: Option<String>,
}

pub fn app() -> Router {
    router(Arc::new(RwLock::new(Catalog::default())))
}

pub fn router(db: Db) -> Router {
    Router::new()
        .route(&format!("{API_PREFIX}/subsidies"), get(list_subsidies))
        .route(&format!("{API_PREFIX}/subsidies/id/{{id}}"), get(get_subsidy))
        .route("/admin/subsidies", post(add_subsidy))
        .with_state(db)
}

pub async fn run(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, router(db)).await
}

fn bad_request(message: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "message": message })))
}

async fn list_subsidies(
    State(db): State<Db>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if params.keyword.chars().count() < 2 {
        return Err(bad_request("keyword must be at least 2 characters".to_string()));
    }
    let only_open = match params.acceptance.as_str() {
        "1" => true,
        "0" => false,
        other => return Err(bad_request(format!("invalid acceptance {other}"))),
    };
    let descending = match params.order.as_str() {
        "DESC" => true,
        "ASC" => false,
        other => return Err(bad_request(format!("invalid order {other}"))),
    };
    let sort_key: fn(&Subsidy) -> &str = match params.sort.as_str() {
        "created_date" => by_created,
        "acceptance_start_datetime" => by_acceptance_start,
        "acceptance_end_datetime" => by_acceptance_end,
        other => return Err(bad_request(format!("invalid sort {other}"))),
    };

    let catalog = db.read().await;
    let mut rows: Vec<&Subsidy> = catalog
        .subsidies
        .iter()
        .filter(|s| s.title.contains(&params.keyword))
        .filter(|s| !only_open || s.open)
        .filter(|s| match &params.target_area_search {
            Some(area) => s.target_area_search.as_deref().is_some_and(|a| a.contains(area.as_str())),
            None => true,
        })
        .collect();
    rows.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));
    if descending {
        rows.reverse();
    }

    let result: Vec<Value> = rows.iter().map(|s| s.summary()).collect();
    Ok(Json(json!({
        "metadata": { "type": "application/json", "resultset": { "count": result.len() } },
        "result": result,
    })))
}

fn by_created(s: &Subsidy) -> &str {
    &s.created_date
}

fn by_acceptance_start(s: &Subsidy) -> &str {
    &s.acceptance_start_datetime
}

fn by_acceptance_end(s: &Subsidy) -> &str {
    &s.acceptance_end_datetime
}

async fn get_subsidy(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let catalog = db.read().await;
    if catalog.failing.contains(&id) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let result: Vec<Value> = catalog
        .subsidies
        .iter()
        .find(|s| s.id == id)
        .map(Subsidy::full)
        .into_iter()
        .collect();
    Ok(Json(json!({
        "metadata": { "type": "application/json", "resultset": { "count": result.len() } },
        "result": result,
    })))
}

async fn add_subsidy(
    State(db): State<Db>,
    Json(input): Json<Subsidy>,
) -> Result<StatusCode, StatusCode> {
    let mut catalog = db.write().await;
    if catalog.subsidies.iter().any(|s| s.id == input.id) {
        return Err(StatusCode::CONFLICT);
    }
    catalog.subsidies.push(input);
    Ok(StatusCode::CREATED)
}
