use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
    /// 1-based row or line of the input the payload was read from.
    pub position: u64,
}

impl<T> Envelope<T> {
    pub fn new(payload: T, position: u64) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
            position,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error at position {position}: {reason}")]
    Transform { position: u64, reason: String },
    #[error("sink error: {0}")]
    Sink(String),
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

/// Consumes the stream and hands back what it gathered.
#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    type Output: Send;

    async fn run<S>(&self, input: S) -> Result<Self::Output, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>, // same-type transforms chain
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<K::Output, PipelineError> {
        let mut stream = self.source.stream().await;

        for t in self.transforms {
            stream = Box::pin(stream.then(move |item| {
                let t = t.clone();
                async move {
                    match item {
                        Ok(env) => t.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        self.sink.run(stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Numbers(Vec<i64>);

    #[async_trait::async_trait]
    impl Source<i64> for Numbers {
        async fn stream(&self) -> EnvelopeStream<i64> {
            let items: Vec<_> = self
                .0
                .iter()
                .enumerate()
                .map(|(i, n)| Ok(Envelope::new(*n, i as u64 + 1)))
                .collect();
            Box::pin(futures::stream::iter(items))
        }
    }

    struct RejectNegative;

    #[async_trait::async_trait]
    impl Transform<i64, i64> for RejectNegative {
        async fn apply(&self, input: Envelope<i64>) -> Result<Envelope<i64>, PipelineError> {
            if input.payload < 0 {
                return Err(PipelineError::Transform {
                    position: input.position,
                    reason: "negative".to_string(),
                });
            }
            Ok(input)
        }
    }

    struct Collect;

    #[async_trait::async_trait]
    impl Sink<i64> for Collect {
        type Output = (Vec<i64>, Vec<u64>);

        async fn run<S>(&self, mut input: S) -> Result<Self::Output, PipelineError>
        where
            S: Stream<Item = Result<Envelope<i64>, PipelineError>> + Send + Unpin + 'static,
        {
            let mut ok = Vec::new();
            let mut rejected = Vec::new();
            while let Some(item) = input.next().await {
                match item {
                    Ok(env) => ok.push(env.payload),
                    Err(PipelineError::Transform { position, .. }) => rejected.push(position),
                    Err(e) => return Err(e),
                }
            }
            Ok((ok, rejected))
        }
    }

    #[tokio::test]
    async fn transforms_reject_without_stopping_the_stream() {
        let pipeline: Pipeline<_, i64, _> = Pipeline {
            source: Numbers(vec![3, -1, 4, -1, 5]),
            transforms: vec![Arc::new(RejectNegative)],
            sink: Collect,
        };
        let (ok, rejected) = pipeline.run().await.unwrap();
        assert_eq!(ok, vec![3, 4, 5]);
        assert_eq!(rejected, vec![2, 4]);
    }
}
