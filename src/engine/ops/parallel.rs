// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic fan-out of kernel work over scoped threads.
//!
//! The output buffer is split into fixed-size chunks and each chunk is written
//! by exactly one thread, so the accumulation order of every element is the
//! same whatever the thread count.

/// Below this many multiply-adds a kernel runs on the calling thread.
const MIN_PARALLEL_WORK: usize = 64 * 1024;

/// Call `f(chunk_index, chunk)` for every `chunk`-sized piece of `out`.
///
/// `work` is the estimated multiply-add count of the whole call; small calls
/// stay on the caller's thread. All spawned threads are joined before return.
pub(crate) fn for_each_chunk<F>(out: &mut [f32], chunk: usize, threads: usize, work: usize, f: F)
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    if chunk == 0 || out.is_empty() {
        return;
    }
    let chunks = out.len().div_ceil(chunk);
    if threads <= 1 || chunks < 2 || work < MIN_PARALLEL_WORK {
        for (i, piece) in out.chunks_mut(chunk).enumerate() {
            f(i, piece);
        }
        return;
    }

    let per_worker = chunks.div_ceil(threads.min(chunks));
    let f = &f;
    std::thread::scope(|scope| {
        for (worker, group) in out.chunks_mut(per_worker * chunk).enumerate() {
            scope.spawn(move || {
                let base = worker * per_worker;
                for (j, piece) in group.chunks_mut(chunk).enumerate() {
                    f(base + j, piece);
                }
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(threads: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; 10_000];
        for_each_chunk(&mut out, 7, threads, usize::MAX, |i, piece| {
            for (j, v) in piece.iter_mut().enumerate() {
                *v = (i * 7 + j) as f32;
            }
        });
        out
    }

    #[test]
    fn test_every_element_written_once() {
        let out = fill(4);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v, i as f32);
        }
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        assert_eq!(fill(1), fill(3));
        assert_eq!(fill(1), fill(16));
    }

    #[test]
    fn test_empty_output_is_noop() {
        let mut out: Vec<f32> = Vec::new();
        for_each_chunk(&mut out, 4, 4, usize::MAX, |_, _| panic!("no chunks"));
    }
}
