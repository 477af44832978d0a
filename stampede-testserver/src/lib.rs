use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_PRODUCTS: &str = "/products";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_BROKEN: &str = "/broken";

pub const CATEGORIES: [&str; 4] = [
    "electronics",
    "jewelery",
    "men's clothing",
    "women's clothing",
];

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    rejected_total: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_rejected_total(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Requests answered with `400 Bad Request`.
    pub fn rejected_total(&self) -> u64 {
        self.rejected_total.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
struct Product {
    id: u32,
    title: &'static str,
    price: f64,
    category: &'static str,
}

const PRODUCTS: [Product; 6] = [
    Product {
        id: 1,
        title: "Backpack",
        price: 109.95,
        category: "men's clothing",
    },
    Product {
        id: 2,
        title: "Slim Fit T-Shirt",
        price: 22.3,
        category: "men's clothing",
    },
    Product {
        id: 5,
        title: "Gold Chain Bracelet",
        price: 695.0,
        category: "jewelery",
    },
    Product {
        id: 9,
        title: "Portable External Hard Drive",
        price: 64.0,
        category: "electronics",
    },
    Product {
        id: 14,
        title: "Curved Gaming Monitor",
        price: 999.99,
        category: "electronics",
    },
    Product {
        id: 18,
        title: "Short Sleeve Boat Neck",
        price: 9.85,
        category: "women's clothing",
    },
];

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(stats: &TestServerStats, msg: impl Into<String>) -> Response {
    stats.inc_rejected_total();
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody { error: msg.into() }),
    )
        .into_response()
}

fn positive_int(query: &HashMap<String, String>, key: &str) -> Result<Option<u32>, String> {
    match query.get(key) {
        None => Ok(None),
        Some(raw) => match raw.parse::<u32>() {
            Ok(v) if v > 0 => Ok(Some(v)),
            _ => Err(format!("`{key}` must be a positive integer")),
        },
    }
}

async fn handle_products(
    State(stats): State<TestServerStats>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    stats.inc_requests_total();

    let descending = match query.get("sort").map(String::as_str) {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(_) => return bad_request(&stats, "`sort` must be `asc` or `desc`"),
    };

    let category = match query.get("category") {
        None => None,
        Some(c) if CATEGORIES.contains(&c.as_str()) => Some(c.clone()),
        Some(_) => return bad_request(&stats, "unknown `category`"),
    };

    let limit = match positive_int(&query, "limit") {
        Ok(v) => v,
        Err(msg) => return bad_request(&stats, msg),
    };
    let page = match positive_int(&query, "page") {
        Ok(v) => v.unwrap_or(1),
        Err(msg) => return bad_request(&stats, msg),
    };

    let mut items: Vec<Product> = PRODUCTS
        .iter()
        .filter(|p| category.as_deref().is_none_or(|c| p.category == c))
        .cloned()
        .collect();
    if descending {
        items.reverse();
    }

    if let Some(limit) = limit {
        let skip = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);
        items = items.into_iter().skip(skip).take(limit as usize).collect();
    }

    (StatusCode::OK, Json(items)).into_response()
}

async fn handle_slow(
    State(stats): State<TestServerStats>,
    Query(query): Query<HashMap<String, String>>,
) -> &'static str {
    stats.inc_requests_total();
    let ms = query
        .get("ms")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(50);
    sleep(Duration::from_millis(ms)).await;
    "slow"
}

async fn handle_broken(State(stats): State<TestServerStats>) -> StatusCode {
    stats.inc_requests_total();
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Routes emulating the product-listing API: unsupported verbs on `/products` answer
/// `405`, unknown paths answer `404`.
pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_PRODUCTS, get(handle_products))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_BROKEN, get(handle_broken))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();

        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
