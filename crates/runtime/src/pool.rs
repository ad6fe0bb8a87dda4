/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Bounded fan-out for per-node and per-group work.

use futures::StreamExt;
use futures::stream;

/// Runs tasks with at most `size` in flight and collects every result.
///
/// Tasks never share mutable state: each returns its own result and the
/// caller joins them once all have finished.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// `multiplier × cpu_count` workers.
    pub fn per_cpu(multiplier: usize) -> Self {
        Self::new(multiplier.max(1) * num_cpus::get())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub async fn run<I, F, Fut, T>(&self, items: I, task: F) -> Vec<T>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        stream::iter(items)
            .map(task)
            .buffer_unordered(self.size)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let results = pool
            .run(0..6, |i| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .await;
        let mut sorted = results;
        sorted.sort();
        assert_eq!(sorted, vec![0, 2, 4, 6, 8, 10]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_per_cpu_size() {
        assert_eq!(WorkerPool::per_cpu(3).size(), 3 * num_cpus::get());
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
