use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use chatly_logging::{AuditRecorder, HeaderEntry, HttpExchangeRecord};

use super::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Error marker written when the caller abandons an exchange mid-flight
pub const CANCELLED_MARKER: &str = "cancelled before the response was fully read";

/// Decorator that records every exchange through an [`AuditRecorder`].
///
/// Exactly one record is written per `send`, whether the inner transport
/// succeeds, fails, or the future is dropped before completing.
pub struct AuditingTransport {
    inner: Arc<dyn HttpTransport>,
    recorder: AuditRecorder,
}

impl AuditingTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, recorder: AuditRecorder) -> Self {
        Self { inner, recorder }
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }
}

fn header_entries(headers: &[(String, String)]) -> Vec<HeaderEntry> {
    headers
        .iter()
        .map(|(name, value)| HeaderEntry::new(name.as_str(), value.as_str()))
        .collect()
}

/// Request half of a record; writes a cancelled record if dropped unfinished
struct PendingExchange {
    recorder: AuditRecorder,
    record: Option<HttpExchangeRecord>,
    started: Instant,
}

impl PendingExchange {
    fn start(recorder: &AuditRecorder, request: &HttpRequest) -> Self {
        let record = HttpExchangeRecord::for_request(
            request.method.as_str(),
            request.url.as_str(),
            header_entries(&request.headers),
            &request.body,
        );
        Self {
            recorder: recorder.clone(),
            record: Some(record),
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn finish(mut self, result: &Result<HttpResponse, TransportError>) -> Option<HttpExchangeRecord> {
        let elapsed = self.elapsed_ms();
        let record = self.record.take()?.with_duration_ms(elapsed);
        Some(match result {
            Ok(response) => record.with_response(
                response.status,
                header_entries(&response.headers),
                &response.body,
            ),
            Err(e) => record.with_error(e.to_string()),
        })
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            let record = record
                .with_duration_ms(self.elapsed_ms())
                .with_error(CANCELLED_MARKER);
            self.recorder.record_blocking(record);
        }
    }
}

#[async_trait]
impl HttpTransport for AuditingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let pending = PendingExchange::start(&self.recorder, &request);

        let result = self.inner.send(request).await;

        if let Some(record) = pending.finish(&result) {
            self.recorder.record(record).await;
        }
        result
    }
}
