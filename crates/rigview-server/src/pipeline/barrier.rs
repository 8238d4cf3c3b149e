use std::{
    fmt::{self, Display, Formatter},
    mem,
};

use tokio::sync::Mutex;

/// Identifies one conversion cycle. Later cycles have larger generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One converted half of a reload, as JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Half {
    Geometry(String),
    Animation(String),
}

#[derive(Debug)]
enum Slot {
    Pending,
    GeometryOnly(String),
    AnimationOnly(String),
    Published,
    Aborted,
}

/// Both halves of one generation, handed out exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyPair {
    pub generation: Generation,
    pub geometry: String,
    pub animation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A newer cycle has started since.
    Stale,
    /// Stored; the other half is still running.
    Waiting,
    /// This completion finished the pair; the caller publishes it.
    Ready(ReadyPair),
    /// The cycle was aborted or already settled.
    Settled,
}

#[derive(Debug, Default)]
struct BarrierState {
    generation: Generation,
    slot: Option<Slot>,
}

/// Joins the geometry and animation halves of the current cycle.
///
/// Storing a half and checking for its partner happen under one lock, so
/// exactly one completion per generation observes [`Completion::Ready`], in
/// either order and from any thread.
#[derive(Debug, Default)]
pub struct ReloadBarrier {
    state: Mutex<BarrierState>,
}

impl ReloadBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new cycle. Everything still running for older generations
    /// becomes stale.
    pub async fn begin(&self) -> Generation {
        let mut state = self.state.lock().await;
        state.generation = state.generation.next();
        state.slot = Some(Slot::Pending);
        state.generation
    }

    pub async fn is_current(&self, generation: Generation) -> bool {
        self.state.lock().await.generation == generation
    }

    pub async fn complete(&self, generation: Generation, half: Half) -> Completion {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Completion::Stale;
        }
        let Some(slot) = state.slot.take() else {
            return Completion::Stale;
        };

        let (slot, completion) = match (slot, half) {
            (Slot::Pending, Half::Geometry(geometry)) => {
                (Slot::GeometryOnly(geometry), Completion::Waiting)
            }
            (Slot::Pending, Half::Animation(animation)) => {
                (Slot::AnimationOnly(animation), Completion::Waiting)
            }
            (Slot::GeometryOnly(geometry), Half::Animation(animation))
            | (Slot::AnimationOnly(animation), Half::Geometry(geometry)) => (
                Slot::Published,
                Completion::Ready(ReadyPair {
                    generation,
                    geometry,
                    animation,
                }),
            ),
            // Same half twice, or the cycle is over.
            (slot, _) => (slot, Completion::Settled),
        };
        state.slot = Some(slot);
        completion
    }

    /// Marks the cycle failed so that its other half is dropped. Returns
    /// whether this call did the aborting.
    pub async fn abort(&self, generation: Generation) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return false;
        }
        match state.slot {
            Some(Slot::Pending | Slot::GeometryOnly(_) | Slot::AnimationOnly(_)) => {
                state.slot = Some(Slot::Aborted);
                true
            }
            _ => false,
        }
    }
}
