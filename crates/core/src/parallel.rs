#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
const PARALLEL_THRESHOLD: usize = 1024;

pub fn for_each_indexed_mut<T, F>(slice: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        if slice.len() >= PARALLEL_THRESHOLD {
            slice
                .par_iter_mut()
                .enumerate()
                .for_each(|(idx, value)| f(idx, value));
            return;
        }
    }

    for (idx, value) in slice.iter_mut().enumerate() {
        f(idx, value);
    }
}

/// Maps every item, in parallel when there are enough of them or when each
/// item is expensive. Output order matches input order.
pub fn map<T, U, F>(items: &[T], heavy: bool, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        if heavy || items.len() >= PARALLEL_THRESHOLD {
            return items.par_iter().map(&f).collect();
        }
    }

    #[cfg(target_arch = "wasm32")]
    let _ = heavy;

    items.iter().map(f).collect()
}
