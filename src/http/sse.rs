//! Server-Sent Events adapter (spec.md §4.5 "Serving", §6 "HTTP surface"):
//! writes each subscription result as `event: next\ndata: <json>\n\n`,
//! flushed immediately, and terminates with `event: complete\n\n` when the
//! underlying stream ends.

use std::convert::Infallible;

use async_graphql::Response;
use futures::{Stream, StreamExt};
use warp::sse::Event;

#[derive(Debug)]
enum Frame {
    Next(Response),
    Complete,
}

fn to_event(frame: Frame) -> Result<Event, Infallible> {
    match frame {
        Frame::Next(response) => {
            let body = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_owned());
            Ok(Event::default().event("next").data(body))
        }
        Frame::Complete => Ok(Event::default().event("complete").data("")),
    }
}

/// Adapt a GraphQL subscription result stream into the `warp::sse::Event`
/// stream the reply is built from, appending the terminating `complete`
/// frame once the source stream ends (spec.md §4.4 "Termination").
fn event_stream(results: impl Stream<Item = Response> + Send + 'static) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let frames = results.map(Frame::Next);
    let complete = futures::stream::once(async { Frame::Complete });
    frames.chain(complete).map(to_event)
}

/// Build the SSE reply for a subscription (spec.md §6: "SSE stream of
/// `event: next\ndata: <json>\n\n` frames terminated by `event:
/// complete\n\n`").
pub fn reply(results: impl Stream<Item = Response> + Send + 'static) -> impl warp::Reply {
    warp::sse::reply(event_stream(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;
    use futures::stream;

    #[tokio::test]
    async fn appends_complete_frame_after_source_ends() {
        let source = stream::iter(vec![Response::new(Value::Null)]);
        let events: Vec<_> = event_stream(source).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events.last().unwrap().is_ok());
    }
}
