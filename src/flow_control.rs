use crate::{status::StatusError, utils::lock};
use futures::channel::oneshot;
use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::Mutex,
    task::{Context, Poll},
};

/// Asynchronous byte-credit counter used for per-stream backpressure.
///
/// The peer grants credit with `Ready` frames; every outbound payload must
/// first `spend` its length. Spenders are served strictly in the order they
/// started waiting and never receive partial credit, so a large send at the
/// head of the queue holds back smaller ones queued behind it.
///
/// Credit is only ever deducted in the same critical section that hands it
/// to a spender, so no two spenders can be granted overlapping credit.
pub struct FlowControlWindow {
    state: Mutex<WindowState>,
}

struct WindowState {
    credit: u64,
    waiters: VecDeque<Waiter>,
    poisoned: Option<StatusError>,
}

struct Waiter {
    amount: u32,
    grant: oneshot::Sender<Result<(), StatusError>>,
}

impl WindowState {
    /// Hands credit to waiters in arrival order until the head no longer fits.
    fn release_waiters(&mut self) {
        while let Some(front) = self.waiters.front() {
            if front.grant.is_canceled() {
                self.waiters.pop_front();
                continue;
            }

            if u64::from(front.amount) > self.credit {
                break;
            }

            if let Some(waiter) = self.waiters.pop_front() {
                if waiter.grant.send(Ok(())).is_ok() {
                    self.credit -= u64::from(waiter.amount);
                }
            }
        }
    }
}

impl FlowControlWindow {
    pub fn new(initial_credit: u32) -> Self {
        Self {
            state: Mutex::new(WindowState {
                credit: u64::from(initial_credit),
                waiters: VecDeque::new(),
                poisoned: None,
            }),
        }
    }

    /// Adds credit and wakes every waiter that now fits, in arrival order.
    ///
    /// Fails with the poison error once the window has been poisoned.
    pub fn grant(&self, amount: u32) -> Result<(), StatusError> {
        let mut state = lock(&self.state);

        if let Some(err) = &state.poisoned {
            return Err(err.clone());
        }

        state.credit = state.credit.saturating_add(u64::from(amount));
        state.release_waiters();

        Ok(())
    }

    /// Waits until `amount` bytes of credit are available and deducts them.
    ///
    /// Completes immediately when nobody is queued ahead and credit already
    /// suffices. Dropping the returned future gives back any credit it was
    /// granted but never observed.
    pub fn spend(&self, amount: u32) -> Spend<'_> {
        let mut state = lock(&self.state);

        let outcome = if let Some(err) = &state.poisoned {
            SpendOutcome::Immediate(Err(err.clone()))
        } else if state.waiters.is_empty() && u64::from(amount) <= state.credit {
            state.credit -= u64::from(amount);
            SpendOutcome::Immediate(Ok(()))
        } else {
            let (grant, granted) = oneshot::channel();
            state.waiters.push_back(Waiter { amount, grant });
            SpendOutcome::Waiting(granted)
        };

        Spend {
            window: self,
            amount,
            outcome,
        }
    }

    /// Fails every suspended spender with `error` and makes all later
    /// `spend`/`grant` calls fail the same way. Only the first error sticks.
    pub fn poison(&self, error: StatusError) {
        let waiters = {
            let mut state = lock(&self.state);
            if state.poisoned.is_some() {
                return;
            }
            state.poisoned = Some(error.clone());
            std::mem::take(&mut state.waiters)
        };

        for waiter in waiters {
            let _ = waiter.grant.send(Err(error.clone()));
        }
    }

    pub fn is_poisoned(&self) -> bool {
        lock(&self.state).poisoned.is_some()
    }

    /// Credit currently available to the next spender.
    pub fn credit(&self) -> u64 {
        lock(&self.state).credit
    }

    /// Number of spenders currently suspended.
    pub fn waiting(&self) -> usize {
        lock(&self.state)
            .waiters
            .iter()
            .filter(|w| !w.grant.is_canceled())
            .count()
    }

    fn abandon(&self, refund: u32) {
        let mut state = lock(&self.state);
        if state.poisoned.is_some() {
            return;
        }
        state.credit = state.credit.saturating_add(u64::from(refund));
        state.release_waiters();
    }
}

/// Future returned by [`FlowControlWindow::spend`].
#[must_use = "credit is only deducted once the spend is awaited"]
pub struct Spend<'a> {
    window: &'a FlowControlWindow,
    amount: u32,
    outcome: SpendOutcome,
}

enum SpendOutcome {
    Immediate(Result<(), StatusError>),
    Waiting(oneshot::Receiver<Result<(), StatusError>>),
    Complete,
}

impl Future for Spend<'_> {
    type Output = Result<(), StatusError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.outcome, SpendOutcome::Complete) {
            SpendOutcome::Immediate(result) => Poll::Ready(result),
            SpendOutcome::Waiting(mut granted) => match Pin::new(&mut granted).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                // The window itself went away
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(StatusError::aborted())),
                Poll::Pending => {
                    this.outcome = SpendOutcome::Waiting(granted);
                    Poll::Pending
                }
            },
            SpendOutcome::Complete => Poll::Ready(Err(StatusError::internal(
                "flow-control spend polled after completion",
            ))),
        }
    }
}

impl Drop for Spend<'_> {
    fn drop(&mut self) {
        let refund = match &mut self.outcome {
            SpendOutcome::Waiting(granted) => {
                granted.close();
                match granted.try_recv() {
                    Ok(Some(Ok(()))) => self.amount,
                    _ => 0,
                }
            }
            // Deducted eagerly but never observed by the caller
            SpendOutcome::Immediate(Ok(())) => self.amount,
            _ => return,
        };

        // Also lets waiters queued behind this one proceed if they now fit
        self.window.abandon(refund);
    }
}
