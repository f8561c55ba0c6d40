use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::{TbError, TbResult};
use crate::signal::SimObject;
use crate::sim_if::{with_sim, EdgeKind, TrigShared};

#[derive(Clone, Debug)]
enum TrigKind {
    Edge(Vec<usize>, EdgeKind),
    Timer(u64),
    TimerIn(f64, String),
}

/// A simulation event a task can suspend on.
///
/// Resolves to `Ok(())` once the simulator fires it. Errors (no simulation
/// running, unrepresentable time, bad handle) surface at the await point.
#[derive(Debug)]
pub struct Trigger {
    kind: TrigKind,
    fired: Option<Arc<AtomicBool>>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }

    pub fn timer(time: u64, unit: &str) -> Self {
        Trigger::new(TrigKind::TimerIn(time as f64, unit.to_string()))
    }

    pub fn timer_f64(time: f64, unit: &str) -> Self {
        Trigger::new(TrigKind::TimerIn(time, unit.to_string()))
    }

    pub fn timer_ns(ns: u64) -> Self {
        Trigger::timer(ns, "ns")
    }

    pub fn timer_ps(ps: u64) -> Self {
        Trigger::timer(ps, "ps")
    }

    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }

    /// Resumes in the next ready phase without advancing time.
    pub fn next_delta() -> Self {
        Trigger::timer_steps(0)
    }

    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(vec![signal.handle()], EdgeKind::Any))
    }

    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(vec![signal.handle()], EdgeKind::Rising))
    }

    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(vec![signal.handle()], EdgeKind::Falling))
    }

    /// Any value change on any of `signals`.
    pub fn any_edge(signals: &[SimObject]) -> Self {
        Trigger::new(TrigKind::Edge(
            signals.iter().map(|s| s.handle()).collect(),
            EdgeKind::Any,
        ))
    }

    fn register(&self, shared: &TrigShared) -> TbResult<()> {
        with_sim(|sim| match &self.kind {
            TrigKind::Timer(steps) => {
                sim.register_timer(*steps, shared.clone());
                Ok(())
            }
            TrigKind::TimerIn(time, unit) => {
                let steps = sim.get_sim_steps(*time, unit)?;
                sim.register_timer(steps, shared.clone());
                Ok(())
            }
            TrigKind::Edge(handles, _) => {
                for &h in handles {
                    sim.register_edge(h, shared.clone())?;
                }
                Ok(())
            }
        })?
    }
}

impl Future for Trigger {
    type Output = TbResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A trigger is registered on its first poll; after that it is only
        // ready once the simulator has fired the shared flag.
        if let Some(fired) = &self.fired {
            return if fired.load(Ordering::Acquire) {
                Poll::Ready(Ok(()))
            } else {
                Poll::Pending
            };
        }

        let edge_kind = match &self.kind {
            TrigKind::Edge(handles, _) if handles.is_empty() => {
                return Poll::Ready(Err(TbError::NotFound("empty sensitivity list".to_string())))
            }
            TrigKind::Edge(_, kind) => *kind,
            _ => EdgeKind::Any,
        };
        let fired = Arc::new(AtomicBool::new(false));
        let shared = TrigShared::new(cx.waker().clone(), edge_kind, fired.clone());
        if let Err(e) = self.register(&shared) {
            // drop any partial edge registrations
            fired.store(true, Ordering::Release);
            return Poll::Ready(Err(e));
        }
        self.fired = Some(fired);
        Poll::Pending
    }
}
