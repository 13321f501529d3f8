use super::ResponseProcessor;
use crate::response::Response;
use scraper::Html;

/// Parses HTML responses into `Response::document`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseDocument;

impl ResponseProcessor for ParseDocument {
    fn name(&self) -> &str {
        "ParseDocument"
    }

    fn process_response(&self, response: &mut Response) {
        if response.document.is_none() && response.is_html() {
            response.document = Some(Html::parse_document(&response.text()));
        }
    }
}
