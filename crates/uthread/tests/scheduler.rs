//! Scheduling and join semantics with preemption off
//!
//! Every test runs on its own harness thread and so gets its own runtime.

use std::cell::RefCell;
use std::rc::Rc;

use uthread::{create, exit, join, self_tid, stats, yield_now};
use uthread::{RuntimeConfig, SchedError, Tid};

fn start() {
    uthread::init(RuntimeConfig::new().enable_preempt(false)).unwrap();
}

type Log<T> = Rc<RefCell<Vec<T>>>;

fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

#[test]
fn test_hello_returns_value() {
    start();
    let tid = create(|| 3).unwrap();
    assert_eq!(tid, Tid::new(1));
    assert_eq!(join(tid), Ok(3));

    let s = stats().unwrap();
    assert_eq!(s.created, 1);
    assert_eq!(s.ready, 1);
    assert_eq!(s.zombie, 0);
}

#[test]
fn test_nested_create_and_yield() {
    start();
    let seen: Log<u32> = log();
    let checks: Log<(&'static str, Result<i32, SchedError>)> = log();

    let (seen1, checks1) = (seen.clone(), checks.clone());
    let t1 = create(move || {
        let (seen2, checks2) = (seen1.clone(), checks1.clone());
        create(move || {
            let seen3 = seen2.clone();
            let t3 = create(move || {
                yield_now();
                seen3.borrow_mut().push(self_tid().as_u32());
                7
            })
            .unwrap();

            let early = [
                ("join(0)", join(Tid::ROOT)),
                ("join(self)", join(self_tid())),
                ("join(100)", join(Tid::new(100))),
            ];
            checks2.borrow_mut().extend(early);
            seen2.borrow_mut().push(self_tid().as_u32());
            yield_now();
            assert_eq!(self_tid(), Tid::new(2));

            // Never hold a borrow across a switch
            let first = join(t3);
            let again = join(t3);
            checks2.borrow_mut().push(("join(t3)", first));
            checks2.borrow_mut().push(("join(t3) again", again));
            5
        })
        .unwrap();

        seen1.borrow_mut().push(self_tid().as_u32());
        yield_now();
        assert_eq!(self_tid(), Tid::new(1));
        yield_now();
        4
    })
    .unwrap();

    assert_eq!(join(t1), Ok(4));
    assert_eq!(join(Tid::new(2)), Ok(5));
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);

    let checks = checks.borrow();
    assert!(matches!(checks[0], ("join(0)", Err(SchedError::InvalidArgument(_)))));
    assert!(matches!(checks[1], ("join(self)", Err(SchedError::InvalidArgument(_)))));
    assert!(matches!(checks[2], ("join(100)", Err(SchedError::NotFound(_)))));
    assert_eq!(checks[3], ("join(t3)", Ok(7)));
    assert!(matches!(checks[4], ("join(t3) again", Err(SchedError::NotFound(_)))));
}

#[test]
fn test_round_robin_is_fifo() {
    start();
    let order: Log<u32> = log();

    let tids: Vec<Tid> = (0..3)
        .map(|_| {
            let order = order.clone();
            create(move || {
                let me = self_tid().as_u32();
                order.borrow_mut().push(me);
                yield_now();
                order.borrow_mut().push(me);
                me as i32 * 10
            })
            .unwrap()
        })
        .collect();

    let values: Vec<i32> = tids.iter().map(|&t| join(t).unwrap()).collect();
    assert_eq!(values, vec![10, 20, 30]);
    assert_eq!(*order.borrow(), vec![1, 2, 3, 1, 2, 3]);
}

#[test]
fn test_yield_alone_returns() {
    start();
    let before = stats().unwrap().switches;
    yield_now();
    yield_now();
    assert_eq!(stats().unwrap().switches, before);
    assert_eq!(self_tid(), Tid::ROOT);
}

#[test]
fn test_join_zombie_delivers_value() {
    start();
    let tid = create(|| 11).unwrap();

    // Let it run to completion before anyone joins
    yield_now();
    assert_eq!(stats().unwrap().zombie, 1);

    assert_eq!(join(tid), Ok(11));
    assert_eq!(stats().unwrap().zombie, 0);
    assert_eq!(join(tid), Err(SchedError::NotFound(tid)));
}

#[test]
fn test_second_joiner_rejected() {
    start();
    let results: Log<(char, Result<i32, SchedError>)> = log();

    let target = create(|| {
        yield_now();
        9
    })
    .unwrap();

    let r = results.clone();
    let a = create(move || {
        let res = join(target);
        r.borrow_mut().push(('a', res));
        1
    })
    .unwrap();

    let r = results.clone();
    let b = create(move || {
        let res = join(target);
        r.borrow_mut().push(('b', res));
        2
    })
    .unwrap();

    assert_eq!(join(a), Ok(1));
    assert_eq!(join(b), Ok(2));

    let results = results.borrow();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], ('b', Err(SchedError::AlreadyJoining(target))));
    assert_eq!(results[1], ('a', Ok(9)));
}

#[test]
fn test_join_invalid_targets() {
    start();
    assert!(matches!(join(Tid::ROOT), Err(SchedError::InvalidArgument(_))));
    assert!(matches!(join(Tid::new(42)), Err(SchedError::NotFound(_))));
}

#[test]
fn test_explicit_exit() {
    fn bail_out(code: i32) -> ! {
        exit(code)
    }

    start();
    let tid = create(|| bail_out(21)).unwrap();
    assert_eq!(join(tid), Ok(21));
}

#[test]
fn test_tids_are_max_plus_one() {
    start();
    let t1 = create(|| 0).unwrap();
    let t2 = create(|| 0).unwrap();
    let t3 = create(|| 0).unwrap();
    assert_eq!((t1, t2, t3), (Tid::new(1), Tid::new(2), Tid::new(3)));

    // Collecting the highest TID frees it for reuse
    join(t3).unwrap();
    assert_eq!(create(|| 0).unwrap(), Tid::new(3));

    for t in [t1, t2, Tid::new(3)] {
        join(t).unwrap();
    }
    assert_eq!(create(|| 0).unwrap(), Tid::new(1));
}

#[test]
fn test_init_twice() {
    start();
    assert_eq!(
        uthread::init(RuntimeConfig::new()),
        Err(SchedError::AlreadyInitialized)
    );
}

#[test]
fn test_invalid_config_rejected() {
    let config = RuntimeConfig::new().enable_preempt(false).stack_size(1024);
    assert!(matches!(uthread::init(config), Err(SchedError::InvalidArgument(_))));
    assert!(stats().is_none());
}
