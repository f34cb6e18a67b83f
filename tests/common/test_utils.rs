use std::{cell::RefCell, collections::HashMap};

use car_scene::loader::ModelLoader;

/// Stands in for the GPU loader. Each path yields to the executor a
/// configurable number of times before it resolves, which fixes the order
/// in which concurrent loads complete.
pub(crate) struct FakeLoader {
    behaviour: HashMap<&'static str, (usize, Result<&'static str, &'static str>)>,
    completed: RefCell<Vec<&'static str>>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self {
            behaviour: HashMap::new(),
            completed: RefCell::new(Vec::new()),
        }
    }

    pub fn succeed(mut self, path: &'static str, model: &'static str, yields: usize) -> Self {
        self.behaviour.insert(path, (yields, Ok(model)));
        self
    }

    pub fn fail(mut self, path: &'static str, message: &'static str, yields: usize) -> Self {
        self.behaviour.insert(path, (yields, Err(message)));
        self
    }

    /// Models in the order their loads finished.
    pub fn completed(&self) -> Vec<&'static str> {
        self.completed.borrow().clone()
    }
}

impl ModelLoader for FakeLoader {
    type Model = &'static str;

    async fn load(&self, path: &str) -> anyhow::Result<Self::Model> {
        let Some((yields, outcome)) = self.behaviour.get(path).cloned() else {
            anyhow::bail!("No such file: {path}");
        };
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
        let outcome = outcome.map_err(|message| anyhow::anyhow!(message));
        if let Ok(model) = &outcome {
            self.completed.borrow_mut().push(model);
        }
        outcome
    }
}
