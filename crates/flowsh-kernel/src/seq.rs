//! Lazy item sequences.
//!
//! A [`Seq`] wraps a boxed stream of items. Every stage wraps the previous
//! sequence in a new one, so nothing upstream runs until the consumer pulls.
//! Per-item work is sequential and output order always equals input order.
//!
//! The combinators here own the error-propagation rule: error items pass
//! through `map`, `filter`, `flat_map` and `take_until` untouched, and a
//! failing callback turns the current value into an error item whose
//! `previous` is the item that failed.

use std::fmt;
use std::future::Future;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use futures::Stream;

use flowsh_types::Value;

use crate::item::{Item, ItemError};

/// An ordered, lazily produced, single-use stream of items.
pub struct Seq {
    stream: BoxStream<'static, Item>,
}

impl Seq {
    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Item> + Send + 'static,
    {
        Self { stream: stream.boxed() }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        Self::from_stream(stream::iter(items))
    }

    /// One fresh `Value` item per element, in order.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::from_stream(stream::iter(values).map(Item::value))
    }

    /// A sequence whose items come from a future that is not polled until
    /// the first pull.
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Future<Output = Vec<Item>> + Send + 'static,
    {
        Self::from_stream(stream::once(producer).flat_map(stream::iter))
    }

    /// Transform every item, errors included.
    pub fn map_items<F, Fut>(self, mut f: F) -> Seq
    where
        F: FnMut(Item, usize) -> Fut + Send + 'static,
        Fut: Future<Output = Item> + Send + 'static,
    {
        Self::from_stream(self.stream.enumerate().then(move |(index, item)| f(item, index)))
    }

    /// Transform value payloads. Errors pass through.
    pub fn map<F, Fut>(self, mut f: F) -> Seq
    where
        F: FnMut(Value, usize) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, ItemError>> + Send + 'static,
    {
        self.map_items(move |item, index| {
            let pending = item.as_value().cloned().map(|payload| f(payload, index));
            async move {
                match pending {
                    None => item,
                    Some(work) => match work.await {
                        Ok(value) => Item::derived(value, &item),
                        Err(err) => Item::failed(err, Some(&item)),
                    },
                }
            }
        })
    }

    /// Keep values whose predicate holds. Errors are always kept.
    pub fn filter<F, Fut>(self, mut pred: F) -> Seq
    where
        F: FnMut(Value, usize) -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, ItemError>> + Send + 'static,
    {
        let stream = self
            .stream
            .enumerate()
            .then(move |(index, item)| {
                let pending = item.as_value().cloned().map(|payload| pred(payload, index));
                async move {
                    match pending {
                        None => Some(item),
                        Some(work) => match work.await {
                            Ok(true) => Some(item),
                            Ok(false) => None,
                            Err(err) => Some(Item::failed(err, Some(&item))),
                        },
                    }
                }
            })
            .filter_map(future::ready);
        Self::from_stream(stream)
    }

    /// Expand each value into zero or more values derived from it.
    pub fn flat_map<F, Fut>(self, mut f: F) -> Seq
    where
        F: FnMut(Value, usize) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<Value>, ItemError>> + Send + 'static,
    {
        let stream = self
            .stream
            .enumerate()
            .then(move |(index, item)| {
                let pending = item.as_value().cloned().map(|payload| f(payload, index));
                async move {
                    let expanded: Vec<Item> = match pending {
                        None => vec![item],
                        Some(work) => match work.await {
                            Ok(values) => values
                                .into_iter()
                                .map(|value| Item::derived(value, &item))
                                .collect(),
                            Err(err) => vec![Item::failed(err, Some(&item))],
                        },
                    };
                    stream::iter(expanded)
                }
            })
            .flatten();
        Self::from_stream(stream)
    }

    /// Strict left fold. The first error item, or the first failing step,
    /// becomes the result and nothing further is pulled.
    pub async fn reduce<F, Fut>(self, seed: Value, mut f: F) -> Item
    where
        F: FnMut(Value, Value, usize) -> Fut + Send,
        Fut: Future<Output = Result<Value, ItemError>> + Send,
    {
        let mut upstream = self.stream.enumerate();
        let mut acc = seed;
        while let Some((index, item)) = upstream.next().await {
            let Some(payload) = item.as_value().cloned() else {
                return item;
            };
            acc = match f(acc, payload, index).await {
                Ok(next) => next,
                Err(err) => return Item::failed(err, Some(&item)),
            };
        }
        Item::value(acc)
    }

    /// Yield items strictly before the first value whose predicate holds.
    ///
    /// Once it stops the upstream is dropped and never pulled again. A
    /// failing predicate yields one error item and then stops.
    pub fn take_until<F, Fut>(self, pred: F) -> Seq
    where
        F: FnMut(Value, usize) -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, ItemError>> + Send + 'static,
    {
        let stream = stream::unfold(Some((self.stream.enumerate(), pred)), |state| async move {
            let Some((mut upstream, mut pred)) = state else {
                return None;
            };
            let Some((index, item)) = upstream.next().await else {
                return None;
            };
            let Some(payload) = item.as_value().cloned() else {
                return Some((item, Some((upstream, pred))));
            };
            match pred(payload, index).await {
                Ok(false) => Some((item, Some((upstream, pred)))),
                Ok(true) => None,
                Err(err) => Some((Item::failed(err, Some(&item)), None)),
            }
        });
        Self::from_stream(stream)
    }

    /// Pull the next item.
    pub async fn next(&mut self) -> Option<Item> {
        self.stream.next().await
    }

    /// Pull the first item and drop the rest unpulled.
    pub async fn first(mut self) -> Option<Item> {
        self.next().await
    }

    /// Force full materialization, in order.
    pub async fn to_vec(self) -> Vec<Item> {
        self.stream.collect().await
    }

    pub fn into_stream(self) -> BoxStream<'static, Item> {
        self.stream
    }
}

impl Default for Seq {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seq { .. }")
    }
}
