//! HTML listing of every stored metric

use axum::{extract::State, response::Html};

use crate::{
    api::{error::ApiResult, state::ApiState},
    metrics::NamedMetric,
};

/// GET /
pub async fn list_metrics(State(state): State<ApiState>) -> ApiResult<Html<String>> {
    let mut metrics = state.storage.list().await?;
    metrics.sort_by(|a, b| (a.kind(), &a.name).cmp(&(b.kind(), &b.name)));

    Ok(Html(render(&metrics)))
}

fn render(metrics: &[NamedMetric]) -> String {
    let mut page = String::from("<!DOCTYPE html>\n<html>\n<head><title>Metrics</title></head>\n<body>\n<ul>\n");

    for metric in metrics {
        page.push_str(&format!(
            "<li>{} ({}): {}</li>\n",
            escape(&metric.name),
            metric.kind(),
            metric.value
        ));
    }

    page.push_str("</ul>\n</body>\n</html>\n");
    page
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
