//! AI narrative endpoints
//!
//! `POST /api/narrative` returns the whole narrative, `POST /api/narrative/stream`
//! relays it as server-sent events:
//! - `fragment`: `{"text": "..."}`, in arrival order
//! - `done`: sent once after the last fragment
//! - `error`: sent instead of `done` when the service fails mid-stream

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use cpt_common::time::DateRange;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ApiResult;
use crate::services::completion::FragmentStream;
use crate::services::narrative::{build_summary, compose_prompt, SummarySource, NO_ACTIVITY_MESSAGE};
use crate::AppState;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Narrative request body
///
/// `summary` wins over `rows`; with neither, the latest stored report in the
/// `from` / `to` range is summarised.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NarrativeRequest {
    pub summary: Option<String>,
    pub rows: Option<Vec<Value>>,
    #[serde(alias = "fromDate")]
    pub from: Option<String>,
    #[serde(alias = "toDate")]
    pub to: Option<String>,
}

impl NarrativeRequest {
    fn into_source(self) -> cpt_common::Result<SummarySource> {
        if let Some(summary) = self.summary.filter(|s| !s.trim().is_empty()) {
            return Ok(SummarySource::Text(summary));
        }
        if let Some(rows) = self.rows.filter(|r| !r.is_empty()) {
            return Ok(SummarySource::Rows(rows));
        }
        let range = DateRange::from_params(self.from.as_deref(), self.to.as_deref())?;
        Ok(SummarySource::Stored(range))
    }
}

#[derive(Debug, Serialize)]
pub struct NarrativeResponse {
    pub result: String,
}

/// POST /api/narrative
pub async fn narrative(
    State(state): State<AppState>,
    Json(request): Json<NarrativeRequest>,
) -> ApiResult<Json<NarrativeResponse>> {
    let summary = build_summary(&state.db, request.into_source()?).await?;
    if summary.is_empty() {
        debug!("Nothing to analyse, skipping completion request");
        return Ok(Json(NarrativeResponse {
            result: NO_ACTIVITY_MESSAGE.to_string(),
        }));
    }

    let prompt = compose_prompt(&summary, &state.language);
    let result = state.completion.complete(&prompt).await?;
    info!(chars = result.chars().count(), "Narrative generated");

    Ok(Json(NarrativeResponse { result }))
}

/// POST /api/narrative/stream
///
/// Failures before the first fragment (bad request, unreachable service) are
/// ordinary JSON errors; later failures arrive as an `error` event.
pub async fn narrative_stream(
    State(state): State<AppState>,
    Json(request): Json<NarrativeRequest>,
) -> ApiResult<Sse<EventStream>> {
    let summary = build_summary(&state.db, request.into_source()?).await?;

    let fragments: FragmentStream = if summary.is_empty() {
        debug!("Nothing to analyse, streaming placeholder");
        stream::once(async { Ok::<_, cpt_common::Error>(NO_ACTIVITY_MESSAGE.to_string()) }).boxed()
    } else {
        let prompt = compose_prompt(&summary, &state.language);
        state.completion.stream(&prompt).await?
    };

    Ok(Sse::new(relay_events(fragments))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("heartbeat")))
}

/// Map completion fragments to SSE events, ending with `done` or `error`
pub fn relay_events(mut fragments: FragmentStream) -> EventStream {
    let events = async_stream::stream! {
        let mut count = 0usize;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(text) => {
                    count += 1;
                    yield Ok::<_, Infallible>(fragment_event(&text));
                }
                Err(e) => {
                    warn!(error = %e, fragments = count, "Narrative stream failed");
                    yield Ok(Event::default()
                        .event("error")
                        .data(json!({ "message": "Narrative service unavailable" }).to_string()));
                    return;
                }
            }
        }
        info!(fragments = count, "Narrative stream complete");
        yield Ok(Event::default().event("done").data("{}"));
    };

    Box::pin(events)
}

fn fragment_event(text: &str) -> Event {
    Event::default()
        .event("fragment")
        .data(json!({ "text": text }).to_string())
}
