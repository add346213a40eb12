//! Pull-based batch producers feeding the export pipeline.

use crate::domain::ProductRecord;

/// A paginated source of product records.
///
/// The orchestrator calls `next_page` with an offset that grows by
/// `page_size` per call (not by the count actually returned). A producer
/// returns fewer than `page_size` records only on its final non-empty page
/// and an empty page once exhausted; calling past exhaustion keeps
/// returning empty pages. Producers are not required to be restartable from
/// offset 0 mid-stream.
pub trait BatchProducer: Send {
    fn next_page(&mut self, offset: usize, page_size: usize) -> Vec<ProductRecord>;
}

/// Producer backed by a pre-existing bounded collection.
pub struct ListProducer {
    records: Vec<ProductRecord>,
}

impl ListProducer {
    pub fn new(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }
}

impl BatchProducer for ListProducer {
    fn next_page(&mut self, offset: usize, page_size: usize) -> Vec<ProductRecord> {
        if offset >= self.records.len() {
            return Vec::new();
        }
        let end = offset.saturating_add(page_size).min(self.records.len());
        self.records[offset..end].to_vec()
    }
}

/// Producer generating `count` records from a template, varying only the
/// primary key ("0".."count-1"). Drives the performance probe.
pub struct SyntheticProducer {
    template: ProductRecord,
    count: usize,
}

impl SyntheticProducer {
    pub fn new(template: ProductRecord, count: usize) -> Self {
        Self { template, count }
    }
}

impl BatchProducer for SyntheticProducer {
    fn next_page(&mut self, offset: usize, page_size: usize) -> Vec<ProductRecord> {
        if offset >= self.count {
            return Vec::new();
        }
        let end = offset.saturating_add(page_size).min(self.count);
        (offset..end)
            .map(|i| ProductRecord {
                long_article_id: i.to_string(),
                ..self.template.clone()
            })
            .collect()
    }
}
