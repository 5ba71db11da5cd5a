#![forbid(unsafe_code)]

//! Spawning invoked actions onto the demo's tokio `LocalSet`.

use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};

/// Spawns onto the `LocalSet` the caller is running inside.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTasks;

impl LocalSpawn for LocalTasks {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SpawnError::shutdown());
        }
        tokio::task::spawn_local(future);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn spawns_on_the_local_set() {
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        LocalSet::new()
            .run_until(async move {
                LocalTasks.spawn_local(async move { r.set(true) }).unwrap();
                tokio::task::yield_now().await;
            })
            .await;
        assert!(ran.get());
    }

    #[test]
    fn refuses_without_a_runtime() {
        assert!(LocalTasks.spawn_local(async {}).is_err());
    }
}
