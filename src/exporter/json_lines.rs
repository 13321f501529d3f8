use super::Exporter;
use crate::error::SpiderError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// Writes one JSON document per line.
#[derive(Debug, Clone)]
pub struct JsonLinesExporter {
    path: PathBuf,
}

impl JsonLinesExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Exporter for JsonLinesExporter {
    fn name(&self) -> &str {
        "JsonLinesExporter"
    }

    async fn export(&self, mut items: UnboundedReceiver<Value>) -> Result<(), SpiderError> {
        let mut writer = BufWriter::new(File::create(&self.path).await?);
        let mut written = 0usize;
        while let Some(item) = items.recv().await {
            let mut line = serde_json::to_vec(&item)?;
            line.push(b'\n');
            writer.write_all(&line).await?;
            written += 1;
        }
        writer.flush().await?;
        info!("Wrote {} items to {}", written, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn writes_one_line_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.jl");
        let exporter = JsonLinesExporter::new(&path);

        let (tx, rx) = unbounded_channel();
        tx.send(json!({"title": "first"})).unwrap();
        tx.send(json!({"title": "second", "tags": ["a"]})).unwrap();
        drop(tx);

        exporter.export(rx).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["tags"][0], "a");
    }
}
