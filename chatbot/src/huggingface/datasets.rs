use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream, stream::BoxStream};
use reqwest::{Response, StatusCode};

use crate::{
    DatasetError, DatasetProvider, Record, RecordStream,
    huggingface::{Client, Endpoints, HuggingFaceError, read_json},
};

/// Rows per request; the datasets server refuses larger pages.
const PAGE_LEN: usize = 100;
const TRAIN_SPLIT: &str = "train";

/// Streams dataset records either from the Hugging Face datasets server (for
/// hub names like `microsoft/DialogStudio`) or from a plain url serving a json
/// array or json lines. Json lines and hub rows are read lazily.
pub struct HuggingFaceDatasets {
    client: Client,
    endpoints: Endpoints,
}

impl HuggingFaceDatasets {
    pub fn new(endpoints: Endpoints, token: Option<String>) -> Self {
        Self {
            client: Client::new(token),
            endpoints,
        }
    }

    async fn stream_url(&self, url: &str, limit: usize) -> Result<RecordStream, DatasetError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| backend(url, err.into()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DatasetError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.map_err(|err| backend(url, err.into()))?;
            return Err(backend(url, HuggingFaceError::Api { status, body }));
        }

        let mut body = UrlBody::new(url, resp);
        if body.is_json_array().await? {
            // an array only parses as a whole
            let bytes = body.read_to_end().await?;
            let mut records: Vec<Record> = serde_json::from_slice(&bytes)?;
            records.truncate(limit);
            return Ok(stream::iter(records.into_iter().map(Ok)).boxed());
        }

        let records = stream::try_unfold(body, |mut body| async move {
            let record = body.next_record().await?;
            Ok::<_, DatasetError>(record.map(|record| (record, body)))
        })
        .take(limit);

        Ok(records.boxed())
    }

    async fn stream_hub(&self, dataset: &str, limit: usize) -> Result<RecordStream, DatasetError> {
        let resp = self
            .client
            .get(&format!("{}/splits", self.endpoints.datasets))
            .query(&[("dataset", dataset)])
            .send()
            .await
            .map_err(|err| backend(dataset, err.into()))?;
        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED) {
            return Err(DatasetError::NotFound(dataset.to_string()));
        }

        let splits: json_model::SplitsResponse =
            read_json(resp).await.map_err(|err| backend(dataset, err))?;
        let config = splits
            .splits
            .into_iter()
            .find(|split| split.split == TRAIN_SPLIT)
            .map(|split| split.config)
            .ok_or_else(|| DatasetError::NoTrainSplit(dataset.to_string()))?;

        let pages = RowPages {
            client: self.client.clone(),
            url: format!("{}/rows", self.endpoints.datasets),
            dataset: dataset.to_string(),
            config,
            offset: 0,
            limit,
        };

        // pages are only requested while the consumer keeps polling
        let records = stream::try_unfold(pages, |mut pages| async move {
            let rows = pages.next_page().await?;
            let rows = rows.map(|rows| rows.into_iter().map(Ok::<Record, DatasetError>));
            Ok::<_, DatasetError>(rows.map(|rows| (stream::iter(rows), pages)))
        })
        .try_flatten()
        .take(limit);

        Ok(records.boxed())
    }
}

#[async_trait]
impl DatasetProvider for HuggingFaceDatasets {
    async fn stream(&self, dataset_id: &str, limit: usize) -> Result<RecordStream, DatasetError> {
        if dataset_id.starts_with("http://") || dataset_id.starts_with("https://") {
            self.stream_url(dataset_id, limit).await
        } else {
            self.stream_hub(dataset_id, limit).await
        }
    }
}

struct RowPages {
    client: Client,
    url: String,
    dataset: String,
    config: String,
    offset: usize,
    limit: usize,
}

impl RowPages {
    /// Fetches the next page, or `None` once `limit` rows were handed out or
    /// the split is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<Record>>, DatasetError> {
        if self.offset >= self.limit {
            return Ok(None);
        }
        let length = PAGE_LEN.min(self.limit - self.offset);

        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("dataset", self.dataset.as_str()),
                ("config", self.config.as_str()),
                ("split", TRAIN_SPLIT),
            ])
            .query(&[("offset", self.offset), ("length", length)])
            .send()
            .await
            .map_err(|err| backend(&self.dataset, err.into()))?;
        let page: json_model::RowsResponse = read_json(resp)
            .await
            .map_err(|err| backend(&self.dataset, err))?;

        if page.rows.is_empty() {
            return Ok(None);
        }
        self.offset += page.rows.len();
        Ok(Some(page.rows.into_iter().map(|row| row.row).collect()))
    }
}

fn backend(dataset: &str, err: HuggingFaceError) -> DatasetError {
    DatasetError::Backend {
        dataset: dataset.to_string(),
        source: Box::new(err),
    }
}

/// Body of a url dataset, pulled chunk by chunk so json lines are parsed
/// only as far as the consumer reads.
struct UrlBody {
    url: String,
    chunks: BoxStream<'static, reqwest::Result<Bytes>>,
    buf: Vec<u8>,
    eof: bool,
}

impl UrlBody {
    fn new(url: &str, resp: Response) -> Self {
        Self::from_chunks(url, resp.bytes_stream().boxed())
    }

    fn from_chunks(url: &str, chunks: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            url: url.to_string(),
            chunks,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Appends the next chunk to the buffer. Returns `false` once the body is
    /// exhausted.
    async fn fill(&mut self) -> Result<bool, DatasetError> {
        if self.eof {
            return Ok(false);
        }
        match self.chunks.next().await {
            Some(chunk) => {
                let chunk = chunk.map_err(|err| backend(&self.url, err.into()))?;
                self.buf.extend_from_slice(&chunk);
                Ok(true)
            }
            None => {
                self.eof = true;
                Ok(false)
            }
        }
    }

    async fn is_json_array(&mut self) -> Result<bool, DatasetError> {
        loop {
            if let Some(first) = self.buf.iter().find(|b| !b.is_ascii_whitespace()) {
                return Ok(*first == b'[');
            }
            if !self.fill().await? {
                return Ok(false);
            }
        }
    }

    async fn read_to_end(mut self) -> Result<Vec<u8>, DatasetError> {
        while self.fill().await? {}
        Ok(self.buf)
    }

    /// Next line including its newline; the last line may have none.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, DatasetError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buf[scanned..].iter().position(|b| *b == b'\n') {
                return Ok(Some(self.buf.drain(..=scanned + pos).collect()));
            }
            scanned = self.buf.len();
            if !self.fill().await? {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.buf)));
            }
        }
    }

    async fn next_record(&mut self) -> Result<Option<Record>, DatasetError> {
        while let Some(line) = self.next_line().await? {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(serde_json::from_slice(&line)?));
        }
        Ok(None)
    }
}

mod json_model {
    use serde::Deserialize;

    use crate::Record;

    #[derive(Deserialize)]
    pub struct SplitsResponse {
        pub splits: Vec<Split>,
    }

    #[derive(Deserialize)]
    pub struct Split {
        pub config: String,
        pub split: String,
    }

    #[derive(Deserialize)]
    pub struct RowsResponse {
        pub rows: Vec<Row>,
    }

    #[derive(Deserialize)]
    pub struct Row {
        pub row: Record,
    }
}
