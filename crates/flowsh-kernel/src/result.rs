//! The envelope returned by dispatch.

use flowsh_types::Value;

use crate::item::Item;
use crate::seq::Seq;

/// What an evaluation produced.
///
/// `result` is still lazy: nothing upstream has run until the caller pulls.
/// `must_print` is false once a print stage (`-p`) has been seen, telling
/// the caller the pipeline handled its own output.
#[derive(Debug)]
pub struct PipelineResult {
    pub must_print: bool,
    pub result: Seq,
}

impl PipelineResult {
    /// Drain the whole stream.
    pub async fn collect(self) -> Vec<Item> {
        self.result.to_vec().await
    }

    /// Drain the whole stream, reporting error items as their
    /// `{ message, cause }` objects.
    pub async fn values(self) -> Vec<Value> {
        self.collect().await.iter().map(Item::to_value).collect()
    }
}
