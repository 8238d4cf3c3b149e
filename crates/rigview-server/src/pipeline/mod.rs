//! Conversion of the watched source into reloads.
//!
//! Every source change begins a new [`Generation`]. A cycle runs the export
//! stage, then both conversions concurrently; each conversion hands its
//! result to the [`ReloadBarrier`], and whichever one completes the pair
//! validates and publishes it. Failures abort the cycle and leave the last
//! published reload in place.
//!
//! A new change cancels the cycle before it. Its tools are killed, so they
//! cannot overwrite the output files the new cycle reads.

use std::{
    fmt::{self, Display, Formatter},
    path::PathBuf,
    sync::Arc,
};

use log::{debug, error, info, trace};
use rigview_asset::scene::SceneState;
use rigview_protocol::message::ReloadMessage;
use tokio::{
    sync::{mpsc, Mutex},
    task::{AbortHandle, JoinSet},
};

use crate::server::Server;

use barrier::{Completion, Generation, Half, ReadyPair, ReloadBarrier};
use chain::ExportChain;
use error::PipelineError;

pub mod barrier;
pub mod chain;
pub mod error;
pub mod watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    Startup,
    Modified(PathBuf),
}

impl Display for SourceChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SourceChange::Startup => write!(f, "startup"),
            SourceChange::Modified(path) => write!(f, "{} changed", path.display()),
        }
    }
}

pub struct AssetPipeline<C: ExportChain> {
    chain: C,
    barrier: ReloadBarrier,
    server: Arc<Server>,
    /// Last published generation; publishes never go backwards.
    published: Mutex<Generation>,
}

impl<C: ExportChain> AssetPipeline<C> {
    pub fn new(chain: C, server: Arc<Server>) -> Self {
        Self {
            chain,
            barrier: ReloadBarrier::new(),
            server,
            published: Mutex::new(Generation::default()),
        }
    }

    /// Starts one cycle per received change until the sender side closes.
    pub async fn run(self: Arc<Self>, mut changes: mpsc::UnboundedReceiver<SourceChange>) {
        let mut running: Option<AbortHandle> = None;
        while let Some(change) = changes.recv().await {
            if let Some(previous) = running.take() {
                previous.abort();
            }
            let generation = self.barrier.begin().await;
            info!("Starting cycle {} ({})", generation, change);
            running = Some(tokio::spawn(self.clone().run_cycle(generation)).abort_handle());
        }
        info!("No more source changes, pipeline stopped");
    }

    async fn run_cycle(self: Arc<Self>, generation: Generation) {
        if let Err(err) = self.chain.export(generation).await {
            self.fail(generation, err).await;
            return;
        }
        if !self.barrier.is_current(generation).await {
            debug!("Cycle {} superseded after export", generation);
            return;
        }

        // Dropping the set aborts both stages along with the cycle.
        let mut stages = JoinSet::new();
        let pipeline = self.clone();
        stages.spawn(async move {
            let result = pipeline.chain.convert_geometry(generation).await;
            pipeline
                .finish(generation, result.map(Half::Geometry))
                .await;
        });
        let pipeline = self.clone();
        stages.spawn(async move {
            let result = pipeline.chain.convert_animation(generation).await;
            pipeline
                .finish(generation, result.map(Half::Animation))
                .await;
        });

        while let Some(joined) = stages.join_next().await {
            if let Err(err) = joined {
                error!("Cycle {} conversion crashed: {}", generation, err);
                self.barrier.abort(generation).await;
            }
        }
    }

    async fn finish(&self, generation: Generation, result: Result<Half, PipelineError>) {
        let half = match result {
            Ok(half) => half,
            Err(err) => {
                self.fail(generation, err).await;
                return;
            }
        };
        match self.barrier.complete(generation, half).await {
            Completion::Ready(pair) => self.publish(pair).await,
            Completion::Waiting => trace!("Cycle {} waiting for its other half", generation),
            Completion::Stale => debug!("Discarding stale completion of cycle {}", generation),
            Completion::Settled => debug!("Cycle {} already settled", generation),
        }
    }

    async fn publish(&self, pair: ReadyPair) {
        if let Err(err) = SceneState::from_payloads(&pair.geometry, &pair.animation) {
            error!(
                "Cycle {} aborted: {}",
                pair.generation,
                PipelineError::from(err)
            );
            return;
        }

        let mut published = self.published.lock().await;
        if !self.barrier.is_current(pair.generation).await {
            debug!("Cycle {} superseded before publishing", pair.generation);
            return;
        }
        if pair.generation < *published {
            debug!(
                "Cycle {} finished after cycle {} was published",
                pair.generation, *published
            );
            return;
        }
        let delivered = self
            .server
            .publish(ReloadMessage {
                model_data: pair.geometry,
                action_data: pair.animation,
            })
            .await;
        *published = pair.generation;
        info!(
            "Cycle {} published to {} clients",
            pair.generation, delivered
        );
    }

    async fn fail(&self, generation: Generation, err: PipelineError) {
        if self.barrier.abort(generation).await {
            error!("Cycle {} aborted: {}", generation, err);
        } else {
            debug!("Ignoring failure of finished cycle {}: {}", generation, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::{future::BoxFuture, FutureExt};
    use rigview_asset::skin::JOINT_COUNT;
    use serde_json::json;

    use crate::server::Server;

    use super::{
        barrier::{Completion, Generation, Half},
        chain::ExportChain,
        error::PipelineError,
        AssetPipeline,
    };

    const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];

    struct Idle;

    impl ExportChain for Idle {
        fn export(&self, _generation: Generation) -> BoxFuture<'_, Result<(), PipelineError>> {
            async { Ok(()) }.boxed()
        }

        fn convert_geometry(
            &self,
            _generation: Generation,
        ) -> BoxFuture<'_, Result<String, PipelineError>> {
            futures::future::pending().boxed()
        }

        fn convert_animation(
            &self,
            _generation: Generation,
        ) -> BoxFuture<'_, Result<String, PipelineError>> {
            futures::future::pending().boxed()
        }
    }

    fn geometry() -> Half {
        Half::Geometry(
            json!({
                "vertexPositions": [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                "vertexNormals": [0.0, 0.0, 1.0],
                "vertexUVs": [0.0, 0.0],
                "vertexPositionIndices": [0, 1, 2],
                "vertexNormalIndices": [0, 0, 0],
                "vertexUVIndices": [0, 0, 0],
                "vertexJointWeights": [{ "0": 1.0 }, { "0": 1.0 }, { "0": 1.0 }]
            })
            .to_string(),
        )
    }

    fn animation() -> Half {
        let pose = vec![IDENTITY; JOINT_COUNT];
        Half::Animation(
            json!({
                "inverseBindPoses": pose,
                "actions": { "Walk_polish": { "0": pose } }
            })
            .to_string(),
        )
    }

    #[tokio::test]
    async fn pair_superseded_after_joining_is_dropped() {
        let server = Arc::new(Server::new());
        let pipeline = AssetPipeline::new(Idle, server.clone());

        let first = pipeline.barrier.begin().await;
        pipeline.barrier.complete(first, geometry()).await;
        let Completion::Ready(pair) = pipeline.barrier.complete(first, animation()).await else {
            panic!("pair not joined");
        };

        pipeline.barrier.begin().await;
        pipeline.publish(pair).await;
        assert!(server.latest().await.is_none());
    }

    #[tokio::test]
    async fn current_pair_is_published() {
        let server = Arc::new(Server::new());
        let pipeline = AssetPipeline::new(Idle, server.clone());

        let generation = pipeline.barrier.begin().await;
        pipeline.barrier.complete(generation, geometry()).await;
        let Completion::Ready(pair) = pipeline.barrier.complete(generation, animation()).await
        else {
            panic!("pair not joined");
        };

        pipeline.publish(pair).await;
        let latest = server.latest().await.unwrap();
        assert!(latest.action_data.contains("Walk_polish"));
    }
}
