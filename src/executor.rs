use futures::future::{BoxFuture, FutureExt};
use futures::task::{waker_ref, ArcWake, Context, Poll};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{TbError, TbResult};

thread_local! {
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
}

pub(crate) fn schedule_task(task: Arc<Task>) {
    READY_QUEUE.with(|q| {
        // Queue::add never fails for an unbounded queue
        let _ = q.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

pub(crate) fn clear_ready_queue() {
    READY_QUEUE.with(|q| *q.borrow_mut() = Queue::new());
}

/// Runs every ready task until all of them are suspended.
#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
fn process_task(task: Arc<Task>) {
    if *lock(&task.state) == TaskState::Cancelled {
        // do not execute if state is cancelled, will be dropped once all references disappear
        return;
    }

    let mut fut_slot = lock(&task.future);
    // a task woken twice before it ran is queued twice; the second entry finds no future
    let Some(mut fut) = fut_slot.take() else {
        return;
    };
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&*waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => *fut_slot = Some(fut),
        Poll::Ready(result) => {
            drop(fut_slot);
            *lock(&task.state) = TaskState::Done;
            if let Some(tx) = lock(&task.join_tx).take() {
                let _ = tx.send(result);
            }
        }
    }
}

#[derive(PartialEq, Debug)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

/// A coroutine scheduled on the simulation's ready queue.
pub struct Task {
    future: Mutex<Option<BoxFuture<'static, TbResult<()>>>>,
    state: Mutex<TaskState>,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<TbResult<()>>>>,
}

impl Task {
    /// Starts `future` concurrently with the caller. It first runs at the
    /// caller's next suspension point.
    pub fn fork(future: impl Future<Output = TbResult<()>> + Send + 'static) -> JoinHandle {
        Task::spawn(future, "forked")
    }

    pub fn spawn(
        future: impl Future<Output = TbResult<()>> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name);
        schedule_task(task);
        join_handle
    }

    fn new(fut: BoxFuture<'static, TbResult<()>>, name: &str) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
        });
        let join_handle = JoinHandle {
            awaited_task: Some(task.clone()),
            join_rx: rx,
        };
        (task, join_handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        // set state to Cancelled, executor drops the Task without running it again
        *lock(&self.state) = TaskState::Cancelled;
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<TbResult<()>>,
}

impl JoinHandle {
    pub fn cancel(mut self) {
        if let Some(task) = self.awaited_task.take() {
            task.cancel();
        }
    }

    /// Result of the task if it already finished.
    pub fn try_result(&mut self) -> Option<TbResult<()>> {
        match self.join_rx.try_recv() {
            Ok(result) => result,
            Err(_) => Some(Err(self.cancelled())),
        }
    }

    fn cancelled(&self) -> TbError {
        let name = self
            .awaited_task
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |t| t.name.clone());
        TbError::Cancelled(name)
    }
}

impl Future for JoinHandle {
    type Output = TbResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(self.cancelled())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forked_tasks_run_in_fifo_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let order = order.clone();
            handles.push(Task::fork(async move {
                order.lock().unwrap().push(i);
                Ok(())
            }));
        }
        run_once();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        for mut h in handles {
            assert!(matches!(h.try_result(), Some(Ok(()))));
        }
    }

    #[test]
    fn cancelled_task_never_runs() {
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        let handle = Task::fork(async move {
            *flag.lock().unwrap() = true;
            Ok(())
        });
        handle.cancel();
        run_once();
        assert!(!*ran.lock().unwrap());
    }
}
