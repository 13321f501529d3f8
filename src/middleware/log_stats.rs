use super::ResponseProcessor;
use crate::response::Response;
use log::info;

/// Logs `Crawled: (status) <METHOD url>` for every response.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStats;

impl ResponseProcessor for LogStats {
    fn name(&self) -> &str {
        "LogStats"
    }

    fn process_response(&self, response: &mut Response) {
        info!(
            "Crawled: ({}) <{} {}>",
            response.status.as_u16(),
            response.request().method,
            response.request().url
        );
    }
}
