mod common;

use batch::*;
use common::*;

/// Compute touches `x` first, then render; returns whether compute was
/// flushed for it
fn share(compute_writes: bool, render_writes: bool) -> (Fixture, BatchSet, Bo, bool) {
    let fx = Fixture::new();
    let mut set = fx.batch_set();
    let x = fx.bo("x", 4096);

    set.get_mut(BatchName::Compute).emit(&NOOPS).unwrap();
    set.use_bo(BatchName::Compute, &x, compute_writes).unwrap();
    set.use_bo(BatchName::Render, &x, render_writes).unwrap();

    let flushed = fx.kernel.submission_count() == 1;
    (fx, set, x, flushed)
}

#[test]
fn read_after_read_needs_no_sync() {
    let (fx, set, x, flushed) = share(false, false);

    assert!(!flushed);
    assert!(set.references(BatchName::Compute, &x));
    assert!(set.references(BatchName::Render, &x));
    let render = set.get(BatchName::Render);
    assert_eq!(render.exec_fences().len(), 1);
    assert_eq!(render.exec_fences()[0].flags(), FenceFlags::SIGNAL);
    assert!(fx.events().is_empty());
}

fn assert_synced(fx: &Fixture, set: &BatchSet, x: &Bo, flushed: bool, render_writes: bool) {
    assert!(flushed);
    let compute = set.get(BatchName::Compute);
    let render = set.get(BatchName::Render);

    assert_eq!(fx.kernel.last_submission().ctx_id, compute.hw_ctx_id());
    assert!(!compute.references(x));
    assert!(render.references(x));
    assert_eq!(render.find_entry(x).unwrap().is_write(), render_writes);

    let wait = compute.last_syncpt().unwrap();
    let waits: Vec<u32> = render
        .exec_fences()
        .iter()
        .filter(|f| f.flags() == FenceFlags::WAIT)
        .map(|f| f.handle)
        .collect();
    assert_eq!(waits, vec![wait.handle()]);
}

#[test]
fn read_after_write_syncs() {
    let (fx, set, x, flushed) = share(true, false);
    assert_synced(&fx, &set, &x, flushed, false);
}

#[test]
fn write_after_read_syncs() {
    let (fx, set, x, flushed) = share(false, true);
    assert_synced(&fx, &set, &x, flushed, true);
}

#[test]
fn write_after_write_syncs() {
    let (fx, set, x, flushed) = share(true, true);
    assert_synced(&fx, &set, &x, flushed, true);
}

#[test]
fn render_write_then_compute_read() {
    let fx = Fixture::new();
    let mut set = fx.batch_set();
    let x = fx.bo("x", 4096);

    set.use_bo(BatchName::Render, &x, true).unwrap();
    set.get_mut(BatchName::Render).emit(&NOOPS).unwrap();
    let render_ctx = set.get(BatchName::Render).hw_ctx_id();
    let render_done = set
        .get(BatchName::Render)
        .completion_syncpt()
        .unwrap()
        .handle();

    set.use_bo(BatchName::Compute, &x, false).unwrap();

    let render_submit = fx.kernel.last_submission();
    assert_eq!(fx.kernel.submission_count(), 1);
    assert_eq!(render_submit.ctx_id, render_ctx);
    assert_eq!(render_submit.signals(), vec![render_done]);
    assert!(render_submit.objects.iter().any(|o| o.handle == x.handle() && o.is_write()));

    set.get_mut(BatchName::Compute).emit(&NOOPS).unwrap();
    set.flush(BatchName::Compute).unwrap();

    let compute_submit = fx.kernel.last_submission();
    assert_eq!(fx.kernel.submission_count(), 2);
    assert_eq!(compute_submit.ctx_id, set.get(BatchName::Compute).hw_ctx_id());
    assert_eq!(compute_submit.waits(), vec![render_done]);
    assert_eq!(compute_submit.signals().len(), 1);
    assert!(compute_submit.objects.iter().any(|o| o.handle == x.handle() && !o.is_write()));
    assert!(fx.kernel.last_submission().flags & ExecFlags::FENCE_ARRAY.bits() != 0);
}

#[test]
fn empty_peer_is_not_waited_on() {
    let fx = Fixture::new();
    let mut set = fx.batch_set();
    let x = fx.bo("x", 4096);

    // compute tracks x as written but never recorded a command
    set.use_bo(BatchName::Compute, &x, true).unwrap();
    set.use_bo(BatchName::Render, &x, false).unwrap();

    assert_eq!(fx.kernel.submission_count(), 0);
    assert!(set.get(BatchName::Compute).last_syncpt().is_none());
    assert_eq!(set.get(BatchName::Render).exec_fences().len(), 1);
}

#[test]
fn already_tracked_buffer_skips_peers() {
    let fx = Fixture::new();
    let mut set = fx.batch_set();
    let x = fx.bo("x", 4096);

    set.use_bo(BatchName::Render, &x, false).unwrap();
    set.get_mut(BatchName::Compute).emit(&NOOPS).unwrap();
    set.use_bo(BatchName::Compute, &x, false).unwrap();

    // render already references x, upgrading it to a write does not look
    // at compute again
    set.use_bo(BatchName::Render, &x, true).unwrap();
    assert_eq!(fx.kernel.submission_count(), 0);
    assert!(set.get(BatchName::Render).find_entry(&x).unwrap().is_write());
}

#[test]
fn hazard_flush_of_peer_is_transparent() {
    let fx = Fixture::new();
    let mut set = fx.batch_set();
    let x = fx.bo("x", 4096);

    set.get_mut(BatchName::Compute).emit(&NOOPS).unwrap();
    set.use_bo(BatchName::Compute, &x, true).unwrap();
    assert_eq!(x.refcount(), 2);

    set.use_bo(BatchName::Render, &x, false).unwrap();

    let compute = set.get(BatchName::Compute);
    assert_eq!(compute.exec_count(), 1);
    assert_eq!(compute.bytes_used(), 0);
    assert_eq!(&compute.exec_bos()[0], compute.bo());
    // one reference from the test, one from render
    assert_eq!(x.refcount(), 2);
    assert!(!x.is_idle());
}
