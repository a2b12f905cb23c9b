use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use mysensors_core::{Handler, MetricsHub, Network};
use std::sync::Arc;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
pub struct AppState {
    pub network: Arc<Network>,
    pub metrics: Arc<MetricsHub>,
    pub handler: Arc<Handler>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.network.status_string()))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.observe_network(&state.network);
    state.metrics.observe_handler(state.handler.stats());
    (
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        state.metrics.encode_text(),
    )
}

fn render_index(status: &str) -> String {
    format!(
        "<html>\n<head><title>MySensors Prometheus Exporter</title></head>\n<body>\n\
         <h1>MySensors Prometheus Exporter</h1>\n\
         <p><a href=\"/metrics\">Metrics</a></p>\n\
         <pre>{}</pre>\n</body>\n</html>\n",
        html_escape(status)
    )
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
