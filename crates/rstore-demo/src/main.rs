#![forbid(unsafe_code)]

//! Headless counter demo.
//!
//! This is the composition root: it reads configuration, builds the one
//! counter store, and hands it to the view explicitly.

mod cli;
mod counter;
mod tasks;

use std::process;
use std::rc::Rc;
use std::time::Duration;

use rstore::prelude::*;
use tokio::sync::Notify;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

use crate::cli::Opts;
use crate::counter::{CounterStore, counter_store, render};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let opts = Opts::parse();
    init_tracing();

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    let config = match opts.sequencing {
        Some(mode) => config.with_sequencing(mode),
        None => config,
    };
    tracing::info!(
        store = %config.label,
        sequencing = %config.sequencing,
        delay_ms = opts.delay_ms,
        "starting counter demo"
    );

    LocalSet::new()
        .run_until(async move {
            let counter = counter_store(config, Duration::from_millis(opts.delay_ms));
            run(counter).await;
        })
        .await;
}

async fn run(counter: CounterStore) {
    let component = Component::new();
    let dirty = Rc::new(Notify::new());
    let notify = Rc::clone(&dirty);
    component.on_invalidate(move || notify.notify_one());
    let (_, actions) = render(&component, &counter);

    // Renders are deferred to this task; invalidation only wakes it.
    let renderer = {
        let component = component.clone();
        let counter = counter.clone();
        tokio::task::spawn_local(async move {
            while component.is_mounted() {
                dirty.notified().await;
                if component.needs_render() {
                    render(&component, &counter);
                }
            }
        })
    };

    tracing::info!("increment(1)");
    if let Err(err) = actions.increment.call(1).await {
        tracing::warn!(%err, "increment failed");
    }
    tokio::task::yield_now().await;

    tracing::info!("increment(1) racing reset()");
    let increment = actions.increment.call(1);
    tokio::task::yield_now().await;
    let reset = actions.reset.call(());
    for handle in [increment, reset] {
        let name = handle.name().clone();
        if let Err(err) = handle.await {
            tracing::warn!(action = %name, %err, "action failed");
        }
    }
    tokio::task::yield_now().await;

    let state = counter.store.state();
    tracing::info!(
        value = state.value,
        version = state.version,
        commits = counter.store.commits(),
        stale_discards = counter.store.stale_discards(),
        "final state"
    );

    component.unmount();
    renderer.abort();
}
