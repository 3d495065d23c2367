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

//! Fronts one or more `Network` backends with a shared FIFO queue so that
//! many search worker threads can submit small batches and have them
//! amortized into fewer, larger calls into the backend. Each
//! `ComputeBlocking` call from a caller enqueues its accumulated inputs
//! and blocks on a reply channel; a pool of backend worker threads drains
//! the queue, packs whatever is waiting into a batch of at most
//! `max_batch_size` samples (an individual caller's batch that is already
//! larger than that is passed through unsplit), runs the backend once,
//! and wakes every contributor.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self, Receiver, Sender};

use crate::network::{Network, NetworkComputation};

struct Job {
    samples: Vec<Vec<f32>>,
    reply: Sender<(Arc<dyn NetworkComputation>, usize)>
}

pub struct Multiplexer {
    tx: Sender<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    max_batch: usize,
    input_size: usize
}

impl Multiplexer {
    /// Fronts `backends`, each served by `threads_per_backend` worker
    /// threads pulling from one shared queue.
    pub fn new(backends: Vec<Arc<dyn Network>>, threads_per_backend: usize) -> Self {
        assert!(!backends.is_empty(), "multiplexer needs at least one backend");

        let (tx, rx) = crossbeam_channel::unbounded();
        let max_batch = backends.iter().map(|b| b.max_batch_size()).min().unwrap();
        let input_size = backends[0].input_size();
        let mut handles = Vec::with_capacity(backends.len() * threads_per_backend);

        for backend in backends {
            for _ in 0..threads_per_backend {
                let rx = rx.clone();
                let backend = backend.clone();
                let max_batch = max_batch;

                handles.push(thread::Builder::new()
                    .name("nn-backend-worker".into())
                    .spawn(move || backend_worker(rx, backend, max_batch))
                    .expect("failed to spawn NN backend worker thread"));
            }
        }

        Self { tx, handles: Mutex::new(handles), max_batch, input_size }
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        // dropping `self.tx`'s clones happens via normal field drop, which
        // closes the channel once every `ForwardingComputation` clone is
        // also gone; here we just wait for the workers to notice.
        for handle in self.handles.lock().expect("multiplexer handle lock was poisoned").drain(..) {
            let _ = handle.join();
        }
    }
}

fn backend_worker(rx: Receiver<Job>, backend: Arc<dyn Network>, max_batch: usize) {
    while let Ok(first) = rx.recv() {
        let mut total = first.samples.len();
        let mut jobs = vec![first];

        while total < max_batch {
            match rx.try_recv() {
                Ok(job) => {
                    total += job.samples.len();
                    jobs.push(job);
                },
                Err(_) => break
            }
        }

        let mut computation = backend.new_computation();
        let mut offsets = Vec::with_capacity(jobs.len());
        let mut offset = 0;

        for job in &jobs {
            offsets.push(offset);

            for sample in &job.samples {
                computation.add_input(sample);
            }

            offset += job.samples.len();
        }

        computation.compute_blocking();

        let shared: Arc<dyn NetworkComputation> = Arc::from(computation);

        for (job, offset) in jobs.into_iter().zip(offsets) {
            let _ = job.reply.send((shared.clone(), offset));
        }
    }
}

impl Network for Multiplexer {
    fn new_computation(&self) -> Box<dyn NetworkComputation> {
        Box::new(ForwardingComputation {
            tx: self.tx.clone(),
            samples: Vec::new(),
            count: 0,
            result: None
        })
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn input_size(&self) -> usize {
        self.input_size
    }
}

struct ForwardingComputation {
    tx: Sender<Job>,
    samples: Vec<Vec<f32>>,
    count: usize,
    result: Option<(Arc<dyn NetworkComputation>, usize)>
}

impl NetworkComputation for ForwardingComputation {
    fn add_input(&mut self, planes: &[f32]) {
        assert!(self.result.is_none(), "add_input called after compute_blocking");
        self.samples.push(planes.to_vec());
        self.count += 1;
    }

    fn compute_blocking(&mut self) {
        if self.result.is_some() {
            return;
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let samples = std::mem::take(&mut self.samples);
        let len = samples.len();

        self.tx.send(Job { samples, reply: reply_tx })
            .expect("NN multiplexer backend workers have all shut down");

        let (computation, offset) = reply_rx.recv()
            .expect("NN backend worker dropped the reply channel without answering");

        debug_assert!(offset + len <= computation.len());
        self.result = Some((computation, offset));
    }

    fn get_q(&self, i: usize) -> f32 {
        let (computation, offset) = self.result.as_ref().expect("compute_blocking has not been called yet");

        computation.get_q(offset + i)
    }

    fn get_p(&self, i: usize, move_id: usize) -> f32 {
        let (computation, offset) = self.result.as_ref().expect("compute_blocking has not been called yet");

        computation.get_p(offset + i, move_id)
    }

    fn len(&self) -> usize {
        self.count
    }
}
