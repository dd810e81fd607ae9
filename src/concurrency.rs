//! Concurrency helper: bound how many communities are processed in parallel.

use rayon::prelude::*;

/// Map `f` over `items` with at most `limit` calls in flight, keeping input order.
/// The first error stops further chunks from starting.
pub fn map_limited<I, T, E, F>(items: &[I], limit: usize, f: F) -> Result<Vec<T>, E>
where
    I: Sync,
    T: Send,
    E: Send,
    F: Sync + Fn(&I) -> Result<T, E>,
{
    if limit <= 1 {
        return items.iter().map(&f).collect();
    }
    let mut out = Vec::with_capacity(items.len());
    for chunk in items.chunks(limit) {
        let part: Vec<T> = chunk.par_iter().map(&f).collect::<Result<_, E>>()?;
        out.extend(part);
    }
    Ok(out)
}
