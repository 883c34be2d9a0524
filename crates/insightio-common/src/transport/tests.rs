//! Tests for the transport layer as a whole
//!
//! These push protocol messages through the codec and the HTTP helpers the
//! same way the server and the CLI do.

#[cfg(test)]
mod tests {
    use crate::protocol::{Ack, Code, Event, Metric, MetricName, Status};
    use crate::transport::{HttpTransport, LineDecoder, NdjsonCodec};
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    #[test]
    fn test_event_stream_survives_arbitrary_chunking() {
        let events: Vec<Event> = (0..50)
            .map(|i| Event::new(format!("type_{}", i % 5)).with_value(i as f64))
            .collect();
        let body = NdjsonCodec::encode_all(&events).unwrap();

        for chunk_size in [1, 7, 64, body.len()] {
            let mut decoder = LineDecoder::new();
            let mut decoded = Vec::new();
            for chunk in body.chunks(chunk_size) {
                decoder.push(chunk);
                while let Some(line) = decoder.next_line() {
                    decoded.push(NdjsonCodec::decode::<Event>(&line).unwrap());
                }
            }
            assert!(decoder.finish().is_none());
            assert_eq!(decoded, events, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_metric_lines_keep_order() {
        let metrics: Vec<Metric> = MetricName::SUBSCRIPTION
            .into_iter()
            .map(|name| Metric::now(name, 1.0))
            .collect();

        let mut decoder = LineDecoder::new();
        for metric in &metrics {
            decoder.push(&NdjsonCodec::encode(metric).unwrap());
        }

        let names: Vec<String> = std::iter::from_fn(|| decoder.next_line())
            .map(|line| NdjsonCodec::decode::<Metric>(&line).unwrap().name)
            .collect();
        assert_eq!(names, vec!["events_per_window", "total_throughput", "total_error_rate"]);
    }

    #[test]
    fn test_bad_line_in_stream_is_reported() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"type\":\"ok\"}\n{oops}\n");

        let first = decoder.next_line().unwrap();
        assert!(NdjsonCodec::decode::<Event>(&first).is_ok());

        let second = decoder.next_line().unwrap();
        let status: Status = NdjsonCodec::decode::<Event>(&second).unwrap_err().into();
        assert_eq!(status.code, Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_status_survives_http_round_trip() {
        let original = Status::unauthenticated("API key is invalid");
        let response = original.clone().into_response();
        let code = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        assert_eq!(HttpTransport::decode_status(code, &body), original);
    }

    #[tokio::test]
    async fn test_ack_response_body() {
        let response = HttpTransport::json(http::StatusCode::OK, &Ack::rejected("Event or event type is missing"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let ack: Ack = serde_json::from_slice(&body).unwrap();
        assert!(!ack.ok);
        assert_eq!(ack.message, "Event or event type is missing");
    }
}
