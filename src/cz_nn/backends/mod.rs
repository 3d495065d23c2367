// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dynamic dispatch across NN backends: a registry keyed by name, with a
//! priority used to pick a default when the caller does not ask for one
//! by name. Backends register themselves at process init via
//! `lazy_static!`, matching the config module's habit of process-wide
//! globals -- there is deliberately no singleton mutable state beyond
//! this read-only table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cz_utils::Error;

use crate::loader::Weights;
use crate::network::Network;

pub mod reference;

pub type Factory = fn(Arc<Weights>) -> Box<dyn Network>;

struct Registration {
    priority: i32,
    factory: Factory
}

pub struct Registry {
    backends: Mutex<HashMap<&'static str, Registration>>
}

impl Registry {
    fn new() -> Self {
        let registry = Self { backends: Mutex::new(HashMap::new()) };

        registry.register("reference", 0, |weights| {
            Box::new(reference::ReferenceNetwork::new(weights, default_input_size()))
        });

        registry
    }

    pub fn register(&self, name: &'static str, priority: i32, factory: Factory) {
        self.backends.lock().expect("backend registry lock was poisoned")
            .insert(name, Registration { priority, factory });
    }

    pub fn by_name(&self, name: &str, weights: Arc<Weights>) -> Result<Box<dyn Network>, Error> {
        let backends = self.backends.lock().expect("backend registry lock was poisoned");
        let registration = backends.get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown backend '{}'", name)))?;

        Ok((registration.factory)(weights))
    }

    pub fn default_backend(&self, weights: Arc<Weights>) -> Result<Box<dyn Network>, Error> {
        let backends = self.backends.lock().expect("backend registry lock was poisoned");
        let (_, registration) = backends.iter()
            .max_by_key(|(_, registration)| registration.priority)
            .ok_or_else(|| Error::Configuration("no NN backend is registered".to_string()))?;

        Ok((registration.factory)(weights))
    }
}

fn default_input_size() -> usize {
    cz_position::features::SEARCH_PLANES * cz_position::features::PLANE_SIZE
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_backend_is_registered_by_default() {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });

        assert!(REGISTRY.by_name("reference", weights).is_ok());
    }

    #[test]
    fn unknown_backend_is_a_configuration_error() {
        let weights = Arc::new(Weights { format_version: 1, num_residual_blocks: 0, tensors: vec![] });

        assert!(REGISTRY.by_name("does-not-exist", weights).is_err());
    }
}
