#![forbid(unsafe_code)]

//! The counter store and its view.

use std::time::Duration;

use rstore::prelude::*;

use crate::tasks::LocalTasks;

/// Counter state. Every applied transition bumps `version`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub value: i64,
    pub version: u64,
}

/// Store-bound counter actions.
#[derive(Clone)]
pub struct CounterActions {
    pub increment: Action<i64, (), String>,
    pub reset: Action<(), (), String>,
}

impl ActionGroup for CounterActions {
    fn track_with(&self, tracker: &Tracker) -> Self {
        Self {
            increment: tracker.track(&self.increment),
            reset: tracker.track(&self.reset),
        }
    }
}

/// A counter store with its bound actions.
#[derive(Clone)]
pub struct CounterStore {
    pub store: Store<Counter>,
    pub actions: CounterActions,
}

/// Build the counter store. Each action sleeps for `delay` before producing
/// its state. Invocations are spawned on the current `LocalSet`.
pub fn counter_store(config: StoreConfig, delay: Duration) -> CounterStore {
    let store = Store::with_config(create_repository(Counter::default()), LocalTasks, config);

    let increment = store.define("increment", move |current: Counter, by: i64| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, String>(Counter {
            value: current.value + by,
            version: current.version + 1,
        })
    });
    let reset = store.define("reset", move |current: Counter, ()| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, String>(Counter {
            value: 0,
            version: current.version + 1,
        })
    });

    CounterStore {
        store,
        actions: CounterActions { increment, reset },
    }
}

/// What one render pass of the counter view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub value: i64,
    pub incrementing: bool,
    pub resetting: bool,
}

/// Render the counter view into `component`, returning the frame and the
/// tracked actions the view exposes.
pub fn render(component: &Component, counter: &CounterStore) -> (Frame, CounterActions) {
    let (frame, actions) = component.render(|cx| {
        let value = use_selector(cx, counter.store.repository(), |c: &Counter| c.value);
        let (busy, actions) = use_dispatcher(cx, &counter.actions);
        let frame = Frame {
            value,
            incrementing: busy.is_busy("increment"),
            resetting: busy.is_busy("reset"),
        };
        (frame, actions)
    });
    tracing::info!(
        value = frame.value,
        incrementing = frame.incrementing,
        resetting = frame.resetting,
        renders = component.render_count(),
        "counter view"
    );
    (frame, actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    const DELAY: Duration = Duration::from_millis(2000);

    #[tokio::test(start_paused = true)]
    async fn increment_after_delay() {
        LocalSet::new()
            .run_until(async {
                let counter = counter_store(StoreConfig::default(), DELAY);
                counter.actions.increment.call(1).await.unwrap();
                assert_eq!(
                    counter.store.state(),
                    Counter {
                        value: 1,
                        version: 1
                    }
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn race_applies_both_results() {
        LocalSet::new()
            .run_until(async {
                let counter = counter_store(StoreConfig::default(), DELAY);
                let (a, b) = tokio::join!(
                    counter.actions.increment.call(1),
                    counter.actions.reset.call(())
                );
                assert_eq!((a, b), (Ok(()), Ok(())));
                assert_eq!(counter.store.commits(), 2);
                let state = counter.store.state();
                assert_eq!(state.version, 1);
                assert!(state.value == 0 || state.value == 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_still_commits() {
        LocalSet::new()
            .run_until(async {
                let counter = counter_store(StoreConfig::default(), DELAY);
                drop(counter.actions.increment.call(3));
                tokio::time::sleep(DELAY * 2).await;
                assert_eq!(counter.store.state().value, 3);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn view_tracks_busy_flags() {
        LocalSet::new()
            .run_until(async {
                let counter = counter_store(StoreConfig::default(), DELAY);
                let component = Component::new();

                let (frame, actions) = render(&component, &counter);
                assert_eq!(
                    frame,
                    Frame {
                        value: 0,
                        incrementing: false,
                        resetting: false
                    }
                );

                let pending = actions.increment.call(5);
                assert!(component.needs_render());
                let (frame, _) = render(&component, &counter);
                assert!(frame.incrementing);
                assert!(!frame.resetting);

                pending.await.unwrap();
                let (frame, _) = render(&component, &counter);
                assert_eq!(frame.value, 5);
                assert!(!frame.incrementing);
            })
            .await;
    }
}
